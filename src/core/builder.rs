use std::sync::Arc;

use crate::callbacks::{Callback, Notify, NotifyFn, Transform, TransformFn};
use crate::core::{Config, InvocationChain, Lifecycle, Order, Phase, Registry};
use crate::entity::{EntityType, TypeHierarchy};
use crate::error::{BuildError, ListenerFailure};
use crate::events::{ErrorHandler, EventBus};
use crate::listeners::Listen;

struct Pending {
    phase: Phase,
    bound: EntityType,
    order: Order,
    callback: Callback,
}

/// Builder for constructing a [`Lifecycle`] at bootstrap.
pub struct LifecycleBuilder {
    cfg: Config,
    types: TypeHierarchy,
    callbacks: Vec<Pending>,
    listeners: Vec<Arc<dyn Listen>>,
    on_error: Option<ErrorHandler>,
}

impl LifecycleBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            types: TypeHierarchy::new(),
            callbacks: Vec::new(),
            listeners: Vec::new(),
            on_error: None,
        }
    }

    /// Sets the declared type hierarchy used to rank callback bounds.
    ///
    /// The hierarchy is frozen once the lifecycle is built.
    pub fn with_types(mut self, types: TypeHierarchy) -> Self {
        self.types = types;
        self
    }

    /// Registers a callback for `phase` and entities matching `bound`.
    ///
    /// Registration sequence follows the order of `with_*` calls.
    pub fn with_callback(
        mut self,
        phase: Phase,
        bound: EntityType,
        order: impl Into<Order>,
        callback: Callback,
    ) -> Self {
        self.callbacks.push(Pending {
            phase,
            bound,
            order: order.into(),
            callback,
        });
        self
    }

    /// Registers a closure-backed transforming callback under its own bound.
    pub fn with_transform<T, F>(self, phase: Phase, order: impl Into<Order>, t: TransformFn<T, F>) -> Self
    where
        T: ?Sized + 'static,
        TransformFn<T, F>: Transform,
    {
        let bound = t.bound();
        self.with_callback(phase, bound, order, Callback::transforming(t))
    }

    /// Registers a closure-backed notifying callback under its own bound.
    pub fn with_notify<T, F>(self, phase: Phase, order: impl Into<Order>, n: NotifyFn<T, F>) -> Self
    where
        T: ?Sized + 'static,
        NotifyFn<T, F>: Notify,
    {
        let bound = n.bound();
        self.with_callback(phase, bound, order, Callback::notifying(n))
    }

    /// Adds an event listener.
    ///
    /// Sequential delivery visits listeners in the order they were added.
    pub fn with_listener(mut self, listener: Arc<dyn Listen>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Sets the handler receiving listener failures under
    /// [`ListenerErrorPolicy::Individual`](crate::ListenerErrorPolicy::Individual)
    /// and fire-and-forget delivery.
    pub fn with_error_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&ListenerFailure) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Builds the lifecycle.
    ///
    /// This consumes the builder and initializes:
    /// - the registry (all pending callbacks, in call order)
    /// - the invocation chain
    /// - the event bus (and its workers in fire-and-forget mode)
    ///
    /// # Errors
    /// - [`BuildError::Registry`] for the first rejected registration
    ///   ([`DuplicateBinding`](crate::RegistryError::DuplicateBinding) or
    ///   [`BoundMismatch`](crate::RegistryError::BoundMismatch)).
    /// - [`BuildError::Executor`] when fire-and-forget delivery is configured
    ///   outside a tokio runtime.
    pub fn build(self) -> Result<Lifecycle, BuildError> {
        let types = Arc::new(self.types);

        let mut registry = Registry::new(Arc::clone(&types));
        for p in self.callbacks {
            registry.register(p.phase, p.bound, p.order, p.callback)?;
        }

        let chain = InvocationChain::new(registry, self.cfg.strategy, self.cfg.observe_reads);
        let bus = EventBus::new(&self.cfg, types, self.listeners, self.on_error)?;
        Ok(Lifecycle::new_internal(self.cfg, chain, bus))
    }
}
