//! Lifecycle orchestration services.
//!
//! # Responsibility
//! - Combine marker policy, hook chains and store transactions into the
//!   public soft-delete/restore entry points.
//! - Keep callers decoupled from SQL and storage details.

pub mod cascade;
pub mod engine;
