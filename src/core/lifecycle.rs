//! # Lifecycle: the pipeline facade.
//!
//! The [`Lifecycle`] owns the [`InvocationChain`] (registry + resolver + fold) and
//! the [`EventBus`], both configured from one [`Config`]. Persistence code calls it
//! at each checkpoint:
//!
//! ```text
//! save:  run_phase(BeforeConvert) → publish → encode
//!        run_phase(BeforeSave)    → publish → store write
//!        run_phase(AfterSave)     → publish
//! read:  store read → run_phase(AfterLoad) → publish → decode
//!        run_phase(AfterConvert)  → publish
//! ```
//!
//! ## Example
//! ```rust
//! use hookvisor::{CallContext, Config, Entity, Lifecycle, Phase, Snapshot, TransformFn};
//!
//! #[derive(Debug)]
//! struct Person { name: String }
//! impl Entity for Person {}
//!
//! let lifecycle = Lifecycle::builder(Config::default())
//!     .with_transform(
//!         Phase::BeforeConvert,
//!         10,
//!         TransformFn::exact("trim", |p: &mut Person, _: &CallContext| {
//!             p.name = p.name.trim().to_string();
//!             Ok(())
//!         }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let out = lifecycle
//!     .run_phase(Phase::BeforeConvert, Snapshot::new(Person { name: " ada ".into() }), "people")
//!     .wait()
//!     .unwrap();
//! assert_eq!(out.downcast_ref::<Person>().unwrap().name, "ada");
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::callbacks::Callback;
use crate::core::builder::LifecycleBuilder;
use crate::core::chain::{ChainResult, InvocationChain};
use crate::core::{Completion, Config, Order, Phase};
use crate::entity::{EntityType, Snapshot, TypeHierarchy};
use crate::error::RegistryError;
use crate::events::{EventBus, LifecycleEvent, PublishResult};

/// Callback pipeline: registry, chain, and event bus behind one handle.
pub struct Lifecycle {
    cfg: Config,
    chain: InvocationChain,
    bus: EventBus,
}

impl Lifecycle {
    /// Returns a builder for configuring the lifecycle.
    pub fn builder(cfg: Config) -> LifecycleBuilder {
        LifecycleBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: Config, chain: InvocationChain, bus: EventBus) -> Self {
        Self { cfg, chain, bus }
    }

    /// Runs the callback chain for `phase` (see [`InvocationChain::run_phase`]).
    pub fn run_phase(
        &self,
        phase: Phase,
        snapshot: Snapshot,
        collection: &str,
    ) -> Completion<'static, ChainResult> {
        self.chain.run_phase(phase, snapshot, collection)
    }

    /// Cancellable variant of [`run_phase`](Self::run_phase).
    pub fn run_phase_cancellable(
        &self,
        phase: Phase,
        snapshot: Snapshot,
        collection: &str,
        cancel: CancellationToken,
    ) -> Completion<'static, ChainResult> {
        self.chain
            .run_phase_cancellable(phase, snapshot, collection, cancel)
    }

    /// Publishes a lifecycle event on the bus.
    pub fn publish(&self, event: LifecycleEvent) -> Completion<'static, PublishResult> {
        self.bus.publish(event)
    }

    /// Registers a callback between operations.
    pub fn register(
        &self,
        phase: Phase,
        bound: EntityType,
        order: impl Into<Order>,
        callback: Callback,
    ) -> Result<u64, RegistryError> {
        self.chain.register(phase, bound, order.into(), callback)
    }

    /// Removes a callback binding between operations.
    pub fn unregister(&self, phase: Phase, name: &str) -> bool {
        self.chain.unregister(phase, name)
    }

    pub fn chain(&self) -> &InvocationChain {
        &self.chain
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The frozen type hierarchy.
    pub fn types(&self) -> Arc<TypeHierarchy> {
        Arc::clone(self.chain.registry().types())
    }

    /// Drains fire-and-forget listener queues and stops their workers.
    pub async fn shutdown(&self) {
        self.bus.shutdown().await;
    }
}
