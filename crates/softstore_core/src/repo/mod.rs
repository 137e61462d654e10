//! Persistence layer: visibility scopes and the record store.
//!
//! # Responsibility
//! - Define the store capability the lifecycle engine consumes.
//! - Isolate SQL assembly and execution from service orchestration.
//!
//! # Invariants
//! - Semantic errors (`NotFound`, configuration problems) are reported
//!   alongside transport errors, never masked by them.

pub mod record_store;
pub mod scope;
