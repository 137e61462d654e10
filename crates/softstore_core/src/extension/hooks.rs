//! Named-phase callback chains for lifecycle extension points.
//!
//! # Responsibility
//! - Hold before/around/after hooks registered per record type and phase.
//! - Run one chain around a core action with halt semantics.
//!
//! # Invariants
//! - Hooks run in registration order within their stage.
//! - A `Halt` from a `before` hook skips the core action, remaining layers
//!   and every `after` hook.
//! - `around` layers receive an explicit continuation; skipping it skips
//!   the core action.

use crate::model::record::RecordRef;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

/// Lifecycle phase a chain is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HookPhase {
    Restore,
    Destroy,
}

impl HookPhase {
    /// Stable string id used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restore => "restore",
            Self::Destroy => "destroy",
        }
    }
}

/// Result of one hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Abort the chain; the enclosing transaction rolls back.
    Halt,
}

/// Result of one full chain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFlow {
    Completed,
    /// A hook halted the chain, or a nested chain halted. Reported as a
    /// normal negative outcome, never as an error.
    Halted,
}

/// Ephemeral context passed through one chain invocation.
///
/// Created per lifecycle call and discarded after; carries the target
/// record and the cascade flag of the enclosing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseContext {
    record: RecordRef,
    cascade: bool,
}

impl PhaseContext {
    pub fn new(record: RecordRef, cascade: bool) -> Self {
        Self { record, cascade }
    }

    pub fn record(&self) -> &RecordRef {
        &self.record
    }

    pub fn cascade(&self) -> bool {
        self.cascade
    }
}

pub type BeforeHook = Box<dyn Fn(&PhaseContext) -> HookOutcome>;
pub type AfterHook = Box<dyn Fn(&PhaseContext) -> HookOutcome>;
/// Wrapping layer; the second argument proceeds to the next layer or the
/// core action.
pub type AroundHook =
    Box<dyn Fn(&PhaseContext, &mut dyn FnMut(&PhaseContext) -> ChainFlow) -> ChainFlow>;

/// Ordered hook pipeline for one record type and phase.
#[derive(Default)]
pub struct CallbackChain {
    before: Vec<BeforeHook>,
    around: Vec<AroundHook>,
    after: Vec<AfterHook>,
}

impl CallbackChain {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.around.is_empty() && self.after.is_empty()
    }

    /// Runs the chain around `core`.
    ///
    /// Stage order: `before` hooks, then `around` layers nested around the
    /// core action, then `after` hooks. The first `Halt` anywhere wins.
    pub fn run(
        &self,
        ctx: &PhaseContext,
        core: &mut dyn FnMut(&PhaseContext) -> ChainFlow,
    ) -> ChainFlow {
        for hook in &self.before {
            if hook(ctx) == HookOutcome::Halt {
                return ChainFlow::Halted;
            }
        }

        if self.run_around(0, ctx, core) == ChainFlow::Halted {
            return ChainFlow::Halted;
        }

        for hook in &self.after {
            if hook(ctx) == HookOutcome::Halt {
                return ChainFlow::Halted;
            }
        }

        ChainFlow::Completed
    }

    fn run_around(
        &self,
        depth: usize,
        ctx: &PhaseContext,
        core: &mut dyn FnMut(&PhaseContext) -> ChainFlow,
    ) -> ChainFlow {
        match self.around.get(depth) {
            None => core(ctx),
            Some(layer) => {
                let mut proceed =
                    |next_ctx: &PhaseContext| self.run_around(depth + 1, next_ctx, &mut *core);
                layer(ctx, &mut proceed)
            }
        }
    }
}

impl Debug for CallbackChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackChain")
            .field("before", &self.before.len())
            .field("around", &self.around.len())
            .field("after", &self.after.len())
            .finish()
    }
}

#[derive(Debug, Default)]
struct PhaseChains {
    restore: CallbackChain,
    destroy: CallbackChain,
}

impl PhaseChains {
    fn chain(&self, phase: HookPhase) -> &CallbackChain {
        match phase {
            HookPhase::Restore => &self.restore,
            HookPhase::Destroy => &self.destroy,
        }
    }

    fn chain_mut(&mut self, phase: HookPhase) -> &mut CallbackChain {
        match phase {
            HookPhase::Restore => &mut self.restore,
            HookPhase::Destroy => &mut self.destroy,
        }
    }
}

/// Hook registry keyed by record type name and phase.
///
/// Registration happens once per type at setup; invocation happens once per
/// lifecycle call. A type without registered hooks runs the bare core
/// action.
#[derive(Debug, Default)]
pub struct HookRegistry {
    chains: BTreeMap<String, PhaseChains>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(
        &mut self,
        type_name: &str,
        phase: HookPhase,
        hook: impl Fn(&PhaseContext) -> HookOutcome + 'static,
    ) {
        self.entry(type_name)
            .chain_mut(phase)
            .before
            .push(Box::new(hook));
    }

    pub fn around(
        &mut self,
        type_name: &str,
        phase: HookPhase,
        hook: impl Fn(&PhaseContext, &mut dyn FnMut(&PhaseContext) -> ChainFlow) -> ChainFlow
            + 'static,
    ) {
        self.entry(type_name)
            .chain_mut(phase)
            .around
            .push(Box::new(hook));
    }

    pub fn after(
        &mut self,
        type_name: &str,
        phase: HookPhase,
        hook: impl Fn(&PhaseContext) -> HookOutcome + 'static,
    ) {
        self.entry(type_name)
            .chain_mut(phase)
            .after
            .push(Box::new(hook));
    }

    /// Runs the chain registered for `(type_name, phase)` around `core`,
    /// or the bare core action when nothing is registered.
    pub fn run(
        &self,
        type_name: &str,
        phase: HookPhase,
        ctx: &PhaseContext,
        core: &mut dyn FnMut(&PhaseContext) -> ChainFlow,
    ) -> ChainFlow {
        match self.chains.get(type_name) {
            Some(chains) => chains.chain(phase).run(ctx, core),
            None => core(ctx),
        }
    }

    fn entry(&mut self, type_name: &str) -> &mut PhaseChains {
        self.chains.entry(type_name.to_string()).or_default()
    }
}
