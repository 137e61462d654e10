//! Soft-delete lifecycle core for SQLite-backed record stores.
//! This crate is the single source of truth for marker, scope and cascade
//! invariants.

pub mod db;
pub mod extension;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use extension::hooks::{
    CallbackChain, ChainFlow, HookOutcome, HookPhase, HookRegistry, PhaseContext,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::marker::{
    parse_marker_scheme, MarkerPolicy, MarkerScheme, MarkerSchemeError, MarkerValue,
};
pub use model::record::{RecordId, RecordRef, RecordRow};
pub use model::schema::{
    AssociationEdge, CascadeKind, ConfigError, RecordType, SoftDeleteConfig, TypeRegistry,
};
pub use repo::record_store::{RecordStore, SqliteRecordStore, StoreError, StoreResult};
pub use repo::scope::{ScopedQuery, Visibility};
pub use service::cascade::CascadeRestorer;
pub use service::engine::SoftDeleteEngine;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
