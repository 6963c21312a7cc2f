//! # Pipeline configuration.
//!
//! Provides [`Config`], the centralized settings consumed by
//! [`LifecycleBuilder`](crate::LifecycleBuilder):
//! 1. **Invocation chain**: execution strategy, read-phase observation
//! 2. **Event bus**: on/off switch, delivery mode, listener error policy
//!
//! All of it is chosen once per deployment; a built [`Lifecycle`](crate::Lifecycle)
//! never changes its configuration.

use crate::core::phase::Phase;
use crate::core::strategy::ExecutionStrategy;

/// How the event bus hands events to listeners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Listeners run one after another inside `publish`, under the execution strategy.
    #[default]
    Sequential,
    /// Events are queued per listener and drained by background workers.
    ///
    /// `publish` returns immediately; there is no delivery-completion guarantee.
    /// Requires a running tokio runtime when the lifecycle is built.
    FireAndForget,
}

/// What the event bus does with listener failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListenerErrorPolicy {
    /// Collect every failure into one [`PublishError`](crate::PublishError).
    #[default]
    Aggregate,
    /// Hand each failure to the error handler as it happens; `publish` succeeds.
    Individual,
}

/// Global configuration for the lifecycle pipeline.
///
/// ## Field semantics
/// - `strategy`: blocking vs non-blocking driving of chains and sequential publishes
/// - `observe_reads`: `false` skips every `AfterLoad`/`AfterConvert` chain and event
/// - `bus_enabled`: `false` turns `publish` into a no-op
/// - `delivery`: sequential delivery or fire-and-forget queues
/// - `listener_errors`: aggregate or individual reporting of listener failures
/// - `listener_queue_capacity`: per-listener queue size in fire-and-forget mode (min 1)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over inspecting fields directly.
#[derive(Clone, Debug)]
pub struct Config {
    /// Execution strategy shared by the invocation chain and the event bus.
    pub strategy: ExecutionStrategy,

    /// Run the observational read phases (`AfterLoad`, `AfterConvert`).
    ///
    /// When disabled, no callback and no listener sees those phases; the write
    /// phases are unaffected.
    pub observe_reads: bool,

    /// Publish lifecycle events at all.
    pub bus_enabled: bool,

    /// Listener delivery mode.
    pub delivery: DeliveryMode,

    /// Listener failure reporting.
    pub listener_errors: ListenerErrorPolicy,

    /// Default queue capacity for fire-and-forget listeners that do not override
    /// [`Listen::queue_capacity`](crate::Listen::queue_capacity).
    pub listener_queue_capacity: usize,
}

impl Config {
    /// Returns true when chains and events for `phase` should run.
    #[inline]
    pub fn observes(&self, phase: Phase) -> bool {
        self.observe_reads || !phase.is_observational()
    }

    /// Returns true when listeners run on background workers.
    #[inline]
    pub fn is_fire_and_forget(&self) -> bool {
        self.delivery == DeliveryMode::FireAndForget
    }

    /// Returns the listener queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn listener_queue_capacity_clamped(&self) -> usize {
        self.listener_queue_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `strategy = NonBlocking`
    /// - `observe_reads = true`
    /// - `bus_enabled = true`
    /// - `delivery = Sequential`
    /// - `listener_errors = Aggregate`
    /// - `listener_queue_capacity = 1024`
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::default(),
            observe_reads: true,
            bus_enabled: true,
            delivery: DeliveryMode::default(),
            listener_errors: ListenerErrorPolicy::default(),
            listener_queue_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.strategy, ExecutionStrategy::NonBlocking);
        assert!(cfg.observe_reads && cfg.bus_enabled);
        assert_eq!(cfg.delivery, DeliveryMode::Sequential);
        assert_eq!(cfg.listener_errors, ListenerErrorPolicy::Aggregate);
        assert!(!cfg.is_fire_and_forget());
    }

    #[test]
    fn test_observes_write_phases_regardless() {
        let cfg = Config {
            observe_reads: false,
            ..Config::default()
        };
        assert!(cfg.observes(Phase::BeforeConvert));
        assert!(cfg.observes(Phase::AfterSave));
        assert!(!cfg.observes(Phase::AfterLoad));
        assert!(!cfg.observes(Phase::AfterConvert));
    }

    #[test]
    fn test_queue_capacity_clamped() {
        let cfg = Config {
            listener_queue_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.listener_queue_capacity_clamped(), 1);
    }
}
