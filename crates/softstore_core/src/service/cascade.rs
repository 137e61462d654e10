//! Dependent-record cascade walk.
//!
//! # Responsibility
//! - Follow `CascadeDestroy` association edges of an owner and restore its
//!   soft-deleted dependents, or soft-delete its live dependents,
//!   recursively inside the caller's transaction.
//!
//! # Invariants
//! - Only soft-delete-capable dependent types are entered; the registry
//!   probe runs before every recursion step.
//! - Edges are visited in the owning type's declared order; dependents
//!   within one edge follow the store's iteration order. No further
//!   ordering is guaranteed.
//! - Cycles in the cascade graph are not detected; a cyclic graph recurses
//!   until the stack is exhausted.

use crate::extension::hooks::ChainFlow;
use crate::model::record::{RecordId, RecordRef};
use crate::model::schema::CascadeKind;
use crate::repo::record_store::{RecordStore, StoreResult};
use crate::repo::scope::{ScopedQuery, Visibility};
use crate::service::engine::SoftDeleteEngine;
use rusqlite::types::Value;

/// Recursive walk over an owner's cascade-destroy subtree.
pub struct CascadeRestorer<'a, S: RecordStore> {
    engine: &'a SoftDeleteEngine<S>,
}

impl<'a, S: RecordStore> CascadeRestorer<'a, S> {
    pub fn new(engine: &'a SoftDeleteEngine<S>) -> Self {
        Self { engine }
    }

    /// Restores every soft-deleted dependent reachable over cascade edges,
    /// assuming each was deleted because its owner was destroyed.
    ///
    /// `store` is expected to be the view of an open transaction; the walk
    /// itself never opens one.
    pub fn restore_dependents(
        &self,
        store: &dyn RecordStore,
        owner_type: &str,
        owner_id: RecordId,
    ) -> StoreResult<ChainFlow> {
        self.walk(
            store,
            owner_type,
            owner_id,
            Visibility::OnlyDeleted,
            &mut |dependent| self.engine.restore_in(store, dependent, true),
        )
    }

    /// Soft-deletes every live dependent reachable over cascade edges.
    ///
    /// `store` is expected to be the view of an open transaction; the walk
    /// itself never opens one.
    pub fn destroy_dependents(
        &self,
        store: &dyn RecordStore,
        owner_type: &str,
        owner_id: RecordId,
    ) -> StoreResult<ChainFlow> {
        self.walk(
            store,
            owner_type,
            owner_id,
            Visibility::Default,
            &mut |dependent| self.engine.destroy_in(store, dependent),
        )
    }

    fn walk(
        &self,
        store: &dyn RecordStore,
        owner_type: &str,
        owner_id: RecordId,
        visibility: Visibility,
        step: &mut dyn FnMut(&RecordRef) -> StoreResult<ChainFlow>,
    ) -> StoreResult<ChainFlow> {
        let owner = store.registry().require(owner_type)?;

        for edge in &owner.associations {
            if edge.cascade != CascadeKind::CascadeDestroy {
                continue;
            }
            // Capability probe; dependents that never opted into soft
            // deletion are left untouched.
            if !store.registry().is_soft_deletable(edge.dependent_type.as_str()) {
                continue;
            }

            let dependent_type = store.registry().require(edge.dependent_type.as_str())?;
            let query = ScopedQuery::for_type(dependent_type, visibility)?.and_where(
                &format!("{} = ?", edge.foreign_key),
                vec![Value::Text(owner_id.to_string())],
            );

            for row in store.select(&query)? {
                let dependent = RecordRef::persisted(edge.dependent_type.as_str(), row.id);
                if step(&dependent)? == ChainFlow::Halted {
                    return Ok(ChainFlow::Halted);
                }
            }
        }

        Ok(ChainFlow::Completed)
    }
}
