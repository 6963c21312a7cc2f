//! # Lifecycle event bus.
//!
//! [`EventBus`] broadcasts one [`LifecycleEvent`] to every listener whose
//! [`ListenerFilter`](crate::ListenerFilter) matches it. Unlike the invocation
//! chain it never transforms anything and never short-circuits.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!   ├─ disabled / read phase not observed ──► Ready(Ok(()))
//!   ├─ Sequential:
//!   │    strategy.execute(for l in matching: l.on_event(&event).await)
//!   │        ├─ Aggregate  → Err(PublishError { failures }) if any failed
//!   │        └─ Individual → each failure → error handler; Ok(())
//!   └─ FireAndForget:
//!        ListenerSet::emit(Arc<event>) ──► Ready(Ok(()))   (no completion guarantee)
//! ```
//!
//! ## Rules
//! - **Same instance**: every listener sees the same event (shared `Arc`).
//! - **No short-circuit**: a failing or panicking listener never stops the others.
//! - **Registration order**: sequential delivery visits listeners in the order they
//!   were added.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::trace;

use crate::core::{Completion, Config, ExecutionStrategy, ListenerErrorPolicy, Phase};
use crate::entity::TypeHierarchy;
use crate::error::{panic_message, CallbackError, ExecutorError, ListenerFailure, PublishError};
use crate::events::LifecycleEvent;
use crate::listeners::{report, Listen, ListenerSet};

/// Callback receiving listener failures one by one.
pub type ErrorHandler = Arc<dyn Fn(&ListenerFailure) + Send + Sync>;

/// Outcome of one publish.
pub type PublishResult = Result<(), PublishError>;

/// Broadcast bus for lifecycle events.
pub struct EventBus {
    enabled: bool,
    observe_reads: bool,
    strategy: ExecutionStrategy,
    policy: ListenerErrorPolicy,
    types: Arc<TypeHierarchy>,
    listeners: Arc<[Arc<dyn Listen>]>,
    on_error: Option<ErrorHandler>,
    queued: Option<ListenerSet>,
}

impl EventBus {
    /// Creates a bus configured from `cfg`.
    ///
    /// In fire-and-forget mode this spawns one worker per listener and fails
    /// with [`ExecutorError`] outside a tokio runtime.
    pub fn new(
        cfg: &Config,
        types: Arc<TypeHierarchy>,
        listeners: Vec<Arc<dyn Listen>>,
        on_error: Option<ErrorHandler>,
    ) -> Result<Self, ExecutorError> {
        let queued = (cfg.bus_enabled && cfg.is_fire_and_forget())
            .then(|| {
                ListenerSet::new(
                    &listeners,
                    cfg.listener_queue_capacity_clamped(),
                    Arc::clone(&types),
                    on_error.clone(),
                )
            })
            .transpose()?;

        Ok(Self {
            enabled: cfg.bus_enabled,
            observe_reads: cfg.observe_reads,
            strategy: cfg.strategy,
            policy: cfg.listener_errors,
            types,
            listeners: listeners.into(),
            on_error,
            queued,
        })
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of subscribed listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn observes(&self, phase: Phase) -> bool {
        self.observe_reads || !phase.is_observational()
    }

    /// Delivers `event` to every matching listener.
    pub fn publish(&self, event: LifecycleEvent) -> Completion<'static, PublishResult> {
        if !self.enabled || !self.observes(event.phase) {
            return Completion::ready(Ok(()));
        }
        let event = Arc::new(event);

        if let Some(set) = &self.queued {
            set.emit(event);
            return Completion::ready(Ok(()));
        }

        let matching: Vec<Arc<dyn Listen>> = self
            .listeners
            .iter()
            .filter(|l| l.filter().matches(&event, &self.types))
            .cloned()
            .collect();
        if matching.is_empty() {
            return Completion::ready(Ok(()));
        }

        trace!(
            seq = event.seq,
            phase = %event.phase,
            listeners = matching.len(),
            "publishing event"
        );
        self.strategy.execute(
            deliver(matching, event, self.policy, self.on_error.clone()).boxed(),
        )
    }

    /// Stops fire-and-forget workers after they drain their queues.
    pub async fn shutdown(&self) {
        if let Some(set) = &self.queued {
            set.shutdown().await;
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("enabled", &self.enabled)
            .field("strategy", &self.strategy)
            .field("policy", &self.policy)
            .field("listeners", &self.listeners.len())
            .field("fire_and_forget", &self.queued.is_some())
            .finish()
    }
}

async fn deliver(
    listeners: Vec<Arc<dyn Listen>>,
    event: Arc<LifecycleEvent>,
    policy: ListenerErrorPolicy,
    on_error: Option<ErrorHandler>,
) -> PublishResult {
    let mut failures = Vec::new();

    for listener in &listeners {
        let outcome = AssertUnwindSafe(listener.on_event(&event))
            .catch_unwind()
            .await
            .unwrap_or_else(|p| {
                Err(CallbackError::Panicked {
                    info: panic_message(&*p),
                })
            });
        let Err(error) = outcome else { continue };

        let failure = ListenerFailure {
            listener: listener.name(),
            phase: event.phase,
            error,
        };
        match policy {
            ListenerErrorPolicy::Aggregate => failures.push(failure),
            ListenerErrorPolicy::Individual => report(on_error.as_ref(), failure),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(PublishError::Listeners { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeliveryMode;
    use crate::entity::{Entity, EntityType};
    use crate::listeners::{ListenFn, ListenerFilter};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct User;
    impl Entity for User {}

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(name: &'static str, log: &Log) -> Arc<dyn Listen> {
        let log = Arc::clone(log);
        ListenFn::arc(name, ListenerFilter::all(), move |ev: &LifecycleEvent| {
            log.lock().unwrap().push(format!("{name}:{}", ev.seq));
            Ok(())
        })
    }

    fn failing(name: &'static str) -> Arc<dyn Listen> {
        ListenFn::arc(name, ListenerFilter::all(), |_ev: &LifecycleEvent| {
            Err(CallbackError::fail("down"))
        })
    }

    fn event() -> LifecycleEvent {
        LifecycleEvent::new(Phase::AfterSave, "users", EntityType::of::<User>())
    }

    fn bus(cfg: Config, listeners: Vec<Arc<dyn Listen>>, on_error: Option<ErrorHandler>) -> EventBus {
        EventBus::new(&cfg, Arc::new(TypeHierarchy::new()), listeners, on_error).unwrap()
    }

    #[tokio::test]
    async fn test_aggregate_runs_every_listener() {
        let log: Log = Default::default();
        let bus = bus(
            Config::default(),
            vec![failing("a"), recording("b", &log), failing("c")],
            None,
        );
        let ev = event();
        let seq = ev.seq;

        let err = bus.publish(ev).await.unwrap_err();
        let names: Vec<&str> = err.failures().iter().map(|f| f.listener).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(*log.lock().unwrap(), vec![format!("b:{seq}")]);
    }

    #[test]
    fn test_individual_policy_reports_each_failure() {
        let seen: Arc<Mutex<Vec<&'static str>>> = Default::default();
        let s = Arc::clone(&seen);
        let handler: ErrorHandler = Arc::new(move |f: &ListenerFailure| {
            s.lock().unwrap().push(f.listener);
        });
        let cfg = Config {
            strategy: ExecutionStrategy::Blocking,
            listener_errors: ListenerErrorPolicy::Individual,
            ..Config::default()
        };
        let bus = bus(cfg, vec![failing("x"), failing("y")], Some(handler));

        let done = bus.publish(event());
        assert!(done.is_ready());
        assert!(done.wait().is_ok());
        assert_eq!(*seen.lock().unwrap(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_disabled_bus_is_noop() {
        let log: Log = Default::default();
        let cfg = Config {
            bus_enabled: false,
            ..Config::default()
        };
        let bus = bus(cfg, vec![recording("a", &log)], None);
        let done = bus.publish(event());
        assert!(done.is_ready());
        done.await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unobserved_read_phase_not_published() {
        let log: Log = Default::default();
        let cfg = Config {
            observe_reads: false,
            ..Config::default()
        };
        let bus = bus(cfg, vec![recording("a", &log)], None);
        bus.publish(LifecycleEvent::new(Phase::AfterLoad, "users", EntityType::of::<User>()))
            .await
            .unwrap();
        bus.publish(event()).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fire_and_forget_delivers_after_shutdown_drain() {
        let log: Log = Default::default();
        let cfg = Config {
            delivery: DeliveryMode::FireAndForget,
            ..Config::default()
        };
        let bus = bus(cfg, vec![recording("a", &log), recording("b", &log)], None);

        let done = bus.publish(event());
        assert!(done.is_ready());
        done.await.unwrap();
        bus.shutdown().await;

        let mut got: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.split(':').next().unwrap_or_default().to_string())
            .collect();
        got.sort();
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn test_fire_and_forget_needs_runtime() {
        let cfg = Config {
            delivery: DeliveryMode::FireAndForget,
            ..Config::default()
        };
        let log: Log = Default::default();
        let err = EventBus::new(
            &cfg,
            Arc::new(TypeHierarchy::new()),
            vec![recording("a", &log)],
            None,
        )
        .err()
        .unwrap();
        assert_eq!(err.as_label(), "executor_unavailable");

        let sequential = EventBus::new(
            &Config::default(),
            Arc::new(TypeHierarchy::new()),
            vec![recording("a", &log)],
            None,
        );
        assert!(sequential.is_ok());
    }
}
