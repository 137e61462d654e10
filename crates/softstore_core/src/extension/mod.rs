//! Lifecycle extension points.
//!
//! # Responsibility
//! - Provide the hook chain machinery applications use to observe and veto
//!   restore/destroy operations.

pub mod hooks;
