//! # Core listener trait and filters
//!
//! `Listen` is the extension point for observing lifecycle events on the
//! [`EventBus`](crate::EventBus). Listeners never transform anything and never
//! stop other listeners from running.
//!
//! ## Contract
//! - A listener only receives events its [`ListenerFilter`] matches: the event's
//!   declared entity type must be the filter's bound (or a declared subtype of it),
//!   and the event's phase must be in the filter's phase set.
//! - Returning an error does not stop delivery; the bus aggregates or reports it.
//! - In fire-and-forget mode each listener **declares** its preferred queue capacity
//!   via [`Listen::queue_capacity`]. If its queue overflows, events for that listener
//!   are **dropped** (warn).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use hookvisor::{CallbackError, LifecycleEvent, Listen, ListenerFilter, Phase};
//!
//! #[derive(Debug)]
//! struct User;
//! impl hookvisor::Entity for User {}
//!
//! struct LoadAudit;
//!
//! #[async_trait]
//! impl Listen for LoadAudit {
//!     async fn on_event(&self, ev: &LifecycleEvent) -> Result<(), CallbackError> {
//!         println!("loaded from {}", ev.collection);
//!         Ok(())
//!     }
//!     fn name(&self) -> &'static str { "load-audit" }
//!     fn filter(&self) -> ListenerFilter {
//!         ListenerFilter::for_type::<User>().phase(Phase::AfterLoad)
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Phase;
use crate::entity::{Entity, EntityType, TypeHierarchy};
use crate::error::CallbackError;
use crate::events::LifecycleEvent;

/// Contract for lifecycle event listeners.
#[async_trait]
pub trait Listen: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), CallbackError>;

    /// Human-readable name (for logs and failure reports).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Which events this listener receives.
    fn filter(&self) -> ListenerFilter {
        ListenerFilter::all()
    }

    /// Preferred queue capacity in fire-and-forget mode.
    ///
    /// `None` uses [`Config::listener_queue_capacity`](crate::Config::listener_queue_capacity).
    fn queue_capacity(&self) -> Option<usize> {
        None
    }
}

const ALL_PHASES: u8 = 0b1_1111;

/// Type bound plus phase set a listener subscribes to.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ListenerFilter {
    bound: EntityType,
    phases: u8,
}

impl ListenerFilter {
    /// Every phase, every entity type.
    pub fn all() -> Self {
        Self::bound(EntityType::any())
    }

    /// Every phase, entities of type `T` only.
    pub fn for_type<T: Entity>() -> Self {
        Self::bound(EntityType::of::<T>())
    }

    /// Every phase, entities matching `bound` (concrete type, declared capability, or universal).
    pub fn bound(bound: EntityType) -> Self {
        Self {
            bound,
            phases: ALL_PHASES,
        }
    }

    /// Restricts the filter to `phase`. Chained calls accumulate phases.
    pub fn phase(mut self, phase: Phase) -> Self {
        if self.phases == ALL_PHASES {
            self.phases = 0;
        }
        self.phases |= phase.bit();
        self
    }

    /// Returns true when `phase` is in the phase set.
    #[inline]
    pub fn has_phase(&self, phase: Phase) -> bool {
        self.phases & phase.bit() != 0
    }

    pub fn matches(&self, event: &LifecycleEvent, types: &TypeHierarchy) -> bool {
        self.has_phase(event.phase) && types.is_subtype(event.entity_type, self.bound)
    }
}

impl fmt::Debug for ListenerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phases: Vec<&str> = Phase::ALL
            .into_iter()
            .filter(|p| self.has_phase(*p))
            .map(|p| p.as_label())
            .collect();
        f.debug_struct("ListenerFilter")
            .field("bound", &self.bound)
            .field("phases", &phases)
            .finish()
    }
}

/// Listener backed by a synchronous closure.
///
/// ```rust
/// use hookvisor::{LifecycleEvent, Listen, ListenFn, ListenerFilter, Phase};
///
/// let filter = ListenerFilter::all().phase(Phase::AfterSave);
/// let l = ListenFn::arc("counter", filter, |_ev: &LifecycleEvent| Ok(()));
/// assert_eq!(l.name(), "counter");
/// ```
pub struct ListenFn<F> {
    name: &'static str,
    filter: ListenerFilter,
    f: F,
}

impl<F> ListenFn<F>
where
    F: Fn(&LifecycleEvent) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    pub fn new(name: &'static str, filter: ListenerFilter, f: F) -> Self {
        Self { name, filter, f }
    }

    /// Creates the listener and returns it as a shared trait object.
    pub fn arc(name: &'static str, filter: ListenerFilter, f: F) -> Arc<dyn Listen> {
        Arc::new(Self::new(name, filter, f))
    }
}

#[async_trait]
impl<F> Listen for ListenFn<F>
where
    F: Fn(&LifecycleEvent) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    async fn on_event(&self, event: &LifecycleEvent) -> Result<(), CallbackError> {
        (self.f)(event)
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn filter(&self) -> ListenerFilter {
        self.filter
    }
}
