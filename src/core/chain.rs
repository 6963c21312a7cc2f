//! # Invocation chain - sequential fold over resolved callbacks.
//!
//! ```text
//! run_phase(phase, snapshot, collection)
//!   ├─ phase skipped (observe_reads = false) ──► Ready(Ok(snapshot))
//!   ├─ shape check ──────────────────────────► Ready(Err(MalformedSnapshot))
//!   ├─ registry snapshot (Arc clone) + resolve
//!   └─ strategy.execute(fold):
//!        for cb in resolved:
//!          cancelled?        ──► Err(Cancelled { completed })
//!          Transforming: snapshot = cb.transform(snapshot).await?
//!          Notifying:    cb.notify(&snapshot).await?
//!          error / panic ──► Err(CallbackFailure { phase, callback, cause })
//! ```
//!
//! ## Rules
//! - Callbacks run strictly one at a time, in resolved order.
//! - The first failure aborts the chain; later callbacks never start; earlier
//!   effects are not rolled back.
//! - A transforming callback must hand back a snapshot of the same entity type.
//! - The registry is copy-on-write: `register`/`unregister` swap in a new
//!   `Arc<Registry>`; a running chain keeps the one it resolved from.
//! - Cancellation is checked before each callback starts; a started callback
//!   always runs to completion.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::callbacks::{CallContext, Callback};
use crate::core::phase::Phase;
use crate::core::registry::{Order, Registration, Registry};
use crate::core::strategy::{Completion, ExecutionStrategy};
use crate::entity::{EntityType, Snapshot};
use crate::error::{panic_message, CallbackError, ChainError, RegistryError};

/// Outcome of one chain run.
pub type ChainResult = Result<Snapshot, ChainError>;

/// Runs the callbacks registered for a phase against one snapshot.
pub struct InvocationChain {
    registry: RwLock<Arc<Registry>>,
    strategy: ExecutionStrategy,
    observe_reads: bool,
}

impl InvocationChain {
    pub fn new(registry: Registry, strategy: ExecutionStrategy, observe_reads: bool) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
            strategy,
            observe_reads,
        }
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<Registry> {
        let guard = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    #[inline]
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Returns true when chains for `phase` are run.
    #[inline]
    pub fn observes(&self, phase: Phase) -> bool {
        self.observe_reads || !phase.is_observational()
    }

    /// Registers a callback between operations (copy-on-write).
    pub fn register(
        &self,
        phase: Phase,
        bound: EntityType,
        order: Order,
        callback: Callback,
    ) -> Result<u64, RegistryError> {
        let mut guard = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Registry::clone(&guard);
        let seq = next.register(phase, bound, order, callback)?;
        *guard = Arc::new(next);
        Ok(seq)
    }

    /// Removes a binding between operations (copy-on-write).
    pub fn unregister(&self, phase: Phase, name: &str) -> bool {
        let mut guard = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Registry::clone(&guard);
        let removed = next.unregister(phase, name);
        if removed {
            *guard = Arc::new(next);
        }
        removed
    }

    /// Runs the chain for `phase` under the configured strategy.
    ///
    /// The registry snapshot is taken when this is called, not when the returned
    /// completion is first polled.
    pub fn run_phase(
        &self,
        phase: Phase,
        snapshot: Snapshot,
        collection: &str,
    ) -> Completion<'static, ChainResult> {
        self.run(phase, snapshot, collection, None)
    }

    /// Like [`run_phase`](Self::run_phase), stopping before the next callback once
    /// `cancel` fires.
    pub fn run_phase_cancellable(
        &self,
        phase: Phase,
        snapshot: Snapshot,
        collection: &str,
        cancel: CancellationToken,
    ) -> Completion<'static, ChainResult> {
        self.run(phase, snapshot, collection, Some(cancel))
    }

    fn run(
        &self,
        phase: Phase,
        snapshot: Snapshot,
        collection: &str,
        cancel: Option<CancellationToken>,
    ) -> Completion<'static, ChainResult> {
        if !self.observes(phase) {
            trace!(phase = %phase, "phase not observed; skipping chain");
            return Completion::ready(Ok(snapshot));
        }
        if let Err(e) = snapshot.check_shape(phase) {
            return Completion::ready(Err(e));
        }

        let registry = self.registry();
        let concrete = snapshot.entity_type();
        let resolved = registry.lookup(phase, concrete);
        if resolved.is_empty() {
            return Completion::ready(Ok(snapshot));
        }

        debug!(
            phase = %phase,
            collection,
            entity_type = %concrete,
            callbacks = resolved.len(),
            strategy = self.strategy.as_label(),
            "running chain"
        );
        let ctx = CallContext::new(
            phase,
            Arc::from(collection),
            concrete,
            Arc::clone(registry.types()),
        );
        self.strategy
            .execute(fold(resolved, snapshot, ctx, cancel).boxed())
    }
}

async fn fold(
    resolved: Vec<Arc<Registration>>,
    mut snapshot: Snapshot,
    ctx: CallContext,
    cancel: Option<CancellationToken>,
) -> ChainResult {
    let phase = ctx.phase();

    for (completed, reg) in resolved.iter().enumerate() {
        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            debug!(phase = %phase, completed, "chain cancelled");
            return Err(ChainError::Cancelled { phase, completed });
        }

        trace!(phase = %phase, callback = reg.name(), seq = reg.seq(), "invoking callback");
        snapshot = invoke(reg.callback(), snapshot, &ctx)
            .await
            .map_err(|cause| {
                debug!(phase = %phase, callback = reg.name(), error = %cause, "callback failed");
                ChainError::CallbackFailure {
                    phase,
                    callback: reg.name().to_string(),
                    cause,
                }
            })?;
    }

    debug!(phase = %phase, callbacks = resolved.len(), "chain completed");
    Ok(snapshot)
}

async fn invoke(
    callback: &Callback,
    snapshot: Snapshot,
    ctx: &CallContext,
) -> Result<Snapshot, CallbackError> {
    match callback {
        Callback::Transforming(t) => {
            let out = AssertUnwindSafe(t.transform(snapshot, ctx))
                .catch_unwind()
                .await
                .map_err(|p| CallbackError::Panicked {
                    info: panic_message(&*p),
                })??;
            if out.entity_type() != ctx.entity_type() {
                return Err(CallbackError::TypeMismatch {
                    expected: ctx.entity_type(),
                    actual: out.entity_type(),
                });
            }
            Ok(out)
        }
        Callback::Notifying(n) => {
            AssertUnwindSafe(n.notify(&snapshot, ctx))
                .catch_unwind()
                .await
                .map_err(|p| CallbackError::Panicked {
                    info: panic_message(&*p),
                })??;
            Ok(snapshot)
        }
    }
}
