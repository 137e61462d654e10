//! Soft-delete lifecycle engine.
//!
//! # Responsibility
//! - Provide the lifecycle entry points: soft delete, destroy, restore,
//!   hard destroy, liveness check and bulk restore-by-identity.
//! - Orchestrate marker policy, hook chains and store transactions.
//!
//! # Invariants
//! - `restore` and `destroy` span one store transaction covering the marker
//!   write, the hook chain and the entire cascade subtree; a failure or
//!   halt anywhere rolls back every marker change of the call.
//! - Re-deleting and re-restoring are data-level no-ops that still run the
//!   full callback and transaction machinery.
//! - A hook halt is a normal negative outcome (`ChainFlow::Halted`), never
//!   an error.

use crate::extension::hooks::{ChainFlow, HookOutcome, HookPhase, HookRegistry, PhaseContext};
use crate::model::marker::{MarkerPolicy, MarkerValue};
use crate::model::record::{RecordId, RecordRef, RecordRow};
use crate::repo::record_store::{RecordStore, StoreError, StoreResult};
use crate::repo::scope::{ScopedQuery, Visibility};
use crate::service::cascade::CascadeRestorer;
use log::{error, info};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle engine over one record store.
///
/// Hooks are registered at setup through the `*_restore` / `*_destroy`
/// methods; afterwards the engine is used immutably.
pub struct SoftDeleteEngine<S: RecordStore> {
    store: S,
    hooks: HookRegistry,
}

impl<S: RecordStore> SoftDeleteEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            hooks: HookRegistry::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // Hook registration; once per record type at setup.

    pub fn before_restore(
        &mut self,
        type_name: &str,
        hook: impl Fn(&PhaseContext) -> HookOutcome + 'static,
    ) {
        self.hooks.before(type_name, HookPhase::Restore, hook);
    }

    pub fn around_restore(
        &mut self,
        type_name: &str,
        hook: impl Fn(&PhaseContext, &mut dyn FnMut(&PhaseContext) -> ChainFlow) -> ChainFlow
            + 'static,
    ) {
        self.hooks.around(type_name, HookPhase::Restore, hook);
    }

    pub fn after_restore(
        &mut self,
        type_name: &str,
        hook: impl Fn(&PhaseContext) -> HookOutcome + 'static,
    ) {
        self.hooks.after(type_name, HookPhase::Restore, hook);
    }

    pub fn before_destroy(
        &mut self,
        type_name: &str,
        hook: impl Fn(&PhaseContext) -> HookOutcome + 'static,
    ) {
        self.hooks.before(type_name, HookPhase::Destroy, hook);
    }

    pub fn around_destroy(
        &mut self,
        type_name: &str,
        hook: impl Fn(&PhaseContext, &mut dyn FnMut(&PhaseContext) -> ChainFlow) -> ChainFlow
            + 'static,
    ) {
        self.hooks.around(type_name, HookPhase::Destroy, hook);
    }

    pub fn after_destroy(
        &mut self,
        type_name: &str,
        hook: impl Fn(&PhaseContext) -> HookOutcome + 'static,
    ) {
        self.hooks.after(type_name, HookPhase::Destroy, hook);
    }

    // Query entry points.

    /// Lists rows of one type under the requested visibility.
    pub fn find_all(&self, type_name: &str, visibility: Visibility) -> StoreResult<Vec<RecordRow>> {
        let record_type = self.store.registry().require(type_name)?;
        let query = ScopedQuery::for_type(record_type, visibility)?;
        self.store.select(&query)
    }

    /// Looks up one row by identity under the requested visibility.
    pub fn find_by_id(
        &self,
        type_name: &str,
        id: RecordId,
        visibility: Visibility,
    ) -> StoreResult<Option<RecordRow>> {
        let record_type = self.store.registry().require(type_name)?;
        let query = ScopedQuery::for_type(record_type, visibility)?.by_id(id);
        Ok(self.store.select(&query)?.into_iter().next())
    }

    // Lifecycle entry points.

    /// Evaluates the marker policy predicate on the record's current
    /// marker value.
    pub fn is_deleted(&self, record: &RecordRef) -> StoreResult<bool> {
        let id = require_persisted(record)?;
        let config = self.store.registry().soft_delete_config(record.type_name())?;
        let policy = MarkerPolicy::new(config.scheme);

        match self.store.read_marker(record.type_name(), id)? {
            Some(value) => Ok(policy.is_deleted(&value)),
            None => Err(not_found(record.type_name(), id)),
        }
    }

    /// Writes the "deleted" marker value.
    ///
    /// The transactional variant reports the write atomically; the bare
    /// variant issues a single field update the caller may batch. Neither
    /// runs hooks nor cascades; `destroy` is the guarded entry point.
    pub fn soft_delete(&self, record: &RecordRef, use_transaction: bool) -> StoreResult<()> {
        let id = require_persisted(record)?;
        let config = self.store.registry().soft_delete_config(record.type_name())?;
        let deleted = MarkerPolicy::new(config.scheme).deleted_value(current_epoch_ms());

        let result = if use_transaction {
            self.store
                .run_in_transaction(&mut |tx_store| {
                    write_checked(tx_store, record.type_name(), id, &deleted)?;
                    Ok(ChainFlow::Completed)
                })
                .map(|_| ())
        } else {
            write_checked(&self.store, record.type_name(), id, &deleted)
        };

        match &result {
            Ok(()) => info!(
                "event=soft_delete module=engine status=ok type={} id={id} transactional={use_transaction}",
                record.type_name()
            ),
            Err(err) => error!(
                "event=soft_delete module=engine status=error type={} id={id} error={err}",
                record.type_name()
            ),
        }
        result
    }

    /// Transactional soft delete guarded by the destroy hook chain,
    /// cascading over `CascadeDestroy` edges to live dependents.
    pub fn destroy(&self, record: &RecordRef) -> StoreResult<ChainFlow> {
        let id = require_persisted(record)?;
        let result = self
            .store
            .run_in_transaction(&mut |tx_store| self.destroy_in(tx_store, record));
        log_lifecycle("destroy", record.type_name(), id, &result);
        result
    }

    /// Destroy variant that demands a state change: a hook halt fails with
    /// `RecordNotDestroyed` instead of reporting a negative outcome.
    pub fn destroy_strict(&self, record: &RecordRef) -> StoreResult<()> {
        let id = require_persisted(record)?;
        match self.destroy(record)? {
            ChainFlow::Completed => Ok(()),
            ChainFlow::Halted => Err(StoreError::RecordNotDestroyed {
                type_name: record.type_name().to_string(),
                id,
            }),
        }
    }

    /// Clears the marker back to its live value inside one transaction,
    /// running the restore hook chain around the write. With `cascade`,
    /// soft-deleted dependents are restored inside the same transaction.
    pub fn restore(&self, record: &RecordRef, cascade: bool) -> StoreResult<ChainFlow> {
        let id = require_persisted(record)?;
        let result = self
            .store
            .run_in_transaction(&mut |tx_store| self.restore_in(tx_store, record, cascade));
        log_lifecycle("restore", record.type_name(), id, &result);
        result
    }

    /// Resolves each identity within the only-deleted scope and restores
    /// it. Absent identities fail per item; remaining items are still
    /// processed.
    pub fn restore_by_ids(
        &self,
        type_name: &str,
        ids: &[RecordId],
        cascade: bool,
    ) -> Vec<(RecordId, StoreResult<ChainFlow>)> {
        let results: Vec<_> = ids
            .iter()
            .map(|id| (*id, self.restore_deleted_by_id(type_name, *id, cascade)))
            .collect();

        let restored = results
            .iter()
            .filter(|(_, result)| matches!(result, Ok(ChainFlow::Completed)))
            .count();
        info!(
            "event=restore_batch module=engine status=ok type={type_name} requested={} restored={restored}",
            ids.len()
        );
        results
    }

    /// Permanently removes the row, bypassing markers and hooks.
    /// Irreversible; not part of the soft-delete protocol.
    pub fn hard_destroy(&self, record: &RecordRef) -> StoreResult<()> {
        let id = require_persisted(record)?;
        let removed = self.store.delete_row(record.type_name(), id)?;
        if !removed {
            return Err(not_found(record.type_name(), id));
        }
        info!(
            "event=hard_destroy module=engine status=ok type={} id={id}",
            record.type_name()
        );
        Ok(())
    }

    // Transaction-scoped internals; `store` is the transaction's view.

    pub(crate) fn restore_in(
        &self,
        store: &dyn RecordStore,
        record: &RecordRef,
        cascade: bool,
    ) -> StoreResult<ChainFlow> {
        self.run_phase(
            store,
            HookPhase::Restore,
            PhaseContext::new(record.clone(), cascade),
        )
    }

    pub(crate) fn destroy_in(
        &self,
        store: &dyn RecordStore,
        record: &RecordRef,
    ) -> StoreResult<ChainFlow> {
        self.run_phase(
            store,
            HookPhase::Destroy,
            PhaseContext::new(record.clone(), true),
        )
    }

    fn run_phase(
        &self,
        store: &dyn RecordStore,
        phase: HookPhase,
        ctx: PhaseContext,
    ) -> StoreResult<ChainFlow> {
        // Core errors tunnel past the infallible hook signatures as a halt
        // and are re-raised after the chain returns.
        let mut core_error: Option<StoreError> = None;
        let mut core = |chain_ctx: &PhaseContext| {
            let result = match phase {
                HookPhase::Restore => self.restore_core(store, chain_ctx),
                HookPhase::Destroy => self.destroy_core(store, chain_ctx),
            };
            match result {
                Ok(flow) => flow,
                Err(err) => {
                    core_error = Some(err);
                    ChainFlow::Halted
                }
            }
        };

        let flow = self
            .hooks
            .run(ctx.record().type_name(), phase, &ctx, &mut core);
        match core_error {
            Some(err) => Err(err),
            None => Ok(flow),
        }
    }

    fn restore_core(&self, store: &dyn RecordStore, ctx: &PhaseContext) -> StoreResult<ChainFlow> {
        let record = ctx.record();
        let id = require_persisted(record)?;
        let config = store.registry().soft_delete_config(record.type_name())?;
        let live = MarkerPolicy::new(config.scheme).live_value();
        write_checked(store, record.type_name(), id, &live)?;

        if ctx.cascade() {
            return CascadeRestorer::new(self).restore_dependents(store, record.type_name(), id);
        }
        Ok(ChainFlow::Completed)
    }

    fn destroy_core(&self, store: &dyn RecordStore, ctx: &PhaseContext) -> StoreResult<ChainFlow> {
        let record = ctx.record();
        let id = require_persisted(record)?;
        let config = store.registry().soft_delete_config(record.type_name())?;
        let deleted = MarkerPolicy::new(config.scheme).deleted_value(current_epoch_ms());
        write_checked(store, record.type_name(), id, &deleted)?;

        CascadeRestorer::new(self).destroy_dependents(store, record.type_name(), id)
    }

    fn restore_deleted_by_id(
        &self,
        type_name: &str,
        id: RecordId,
        cascade: bool,
    ) -> StoreResult<ChainFlow> {
        if self
            .find_by_id(type_name, id, Visibility::OnlyDeleted)?
            .is_none()
        {
            return Err(not_found(type_name, id));
        }
        self.restore(&RecordRef::persisted(type_name, id), cascade)
    }
}

fn require_persisted(record: &RecordRef) -> StoreResult<RecordId> {
    record.id().ok_or_else(|| StoreError::NotPersisted {
        type_name: record.type_name().to_string(),
    })
}

fn not_found(type_name: &str, id: RecordId) -> StoreError {
    StoreError::NotFound {
        type_name: type_name.to_string(),
        id,
    }
}

fn write_checked(
    store: &dyn RecordStore,
    type_name: &str,
    id: RecordId,
    value: &MarkerValue,
) -> StoreResult<()> {
    if !store.write_marker(type_name, id, value)? {
        return Err(not_found(type_name, id));
    }
    Ok(())
}

fn log_lifecycle(event: &str, type_name: &str, id: RecordId, result: &StoreResult<ChainFlow>) {
    match result {
        Ok(ChainFlow::Completed) => {
            info!("event={event} module=engine status=ok type={type_name} id={id}");
        }
        Ok(ChainFlow::Halted) => {
            info!("event={event} module=engine status=halted type={type_name} id={id}");
        }
        Err(err) => {
            error!("event={event} module=engine status=error type={type_name} id={id} error={err}");
        }
    }
}

fn current_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
