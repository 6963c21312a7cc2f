//! # Fire-and-forget fan-out to lifecycle listeners.
//!
//! Provides [`ListenerSet`]: used by the [`EventBus`](crate::EventBus) in
//! [`DeliveryMode::FireAndForget`](crate::DeliveryMode::FireAndForget). Events are
//! handed to per-listener bounded queues without waiting for any listener.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │  (filter match)
//!     ├──► [queue 1] ──► worker 1 ──► listener1.on_event()
//!     │    (bounded)         ├──────► Err   → report(ListenerFailure)
//!     │                      └──────► panic → report(ListenerFailure{Panicked})
//!     ├──► [queue 2] ──► worker 2 ──► listener2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► listenerN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **No cross-listener ordering**: listener A may process event N while B processes N+5
//! - **Overflow**: event dropped for that listener only and reported
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: a slow or panicking listener doesn't affect others
//! - **Per-listener FIFO**: each listener sees its events in publish order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a listener uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::{trace, warn};

use crate::entity::TypeHierarchy;
use crate::error::{panic_message, CallbackError, ExecutorError, ListenerFailure};
use crate::events::{ErrorHandler, LifecycleEvent};
use crate::listeners::{Listen, ListenerFilter};

/// Per-listener channel metadata.
struct ListenerChannel {
    name: &'static str,
    filter: ListenerFilter,
    sender: mpsc::Sender<Arc<LifecycleEvent>>,
}

/// Fan-out coordinator for fire-and-forget delivery.
pub struct ListenerSet {
    channels: Mutex<Vec<ListenerChannel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    types: Arc<TypeHierarchy>,
    on_error: Option<ErrorHandler>,
}

impl ListenerSet {
    /// Creates a new set and spawns one worker task per listener.
    ///
    /// ### Per-listener setup
    /// - Bounded mpsc queue (capacity from [`Listen::queue_capacity`] or `default_capacity`, min 1)
    /// - Dedicated worker task (runs until the queue is closed)
    /// - Panic isolation via `catch_unwind`
    ///
    /// ### Errors
    /// [`ExecutorError`] when called outside a tokio runtime; workers are spawned
    /// on the caller's runtime.
    pub fn new(
        listeners: &[Arc<dyn Listen>],
        default_capacity: usize,
        types: Arc<TypeHierarchy>,
        on_error: Option<ErrorHandler>,
    ) -> Result<Self, ExecutorError> {
        let runtime = Handle::try_current().map_err(|e| {
            ExecutorError(format!("fire-and-forget listeners need a tokio runtime: {e}"))
        })?;
        let mut channels = Vec::with_capacity(listeners.len());
        let mut workers = Vec::with_capacity(listeners.len());

        for listener in listeners {
            let cap = listener.queue_capacity().unwrap_or(default_capacity).max(1);
            let name = listener.name();
            let (tx, mut rx) = mpsc::channel::<Arc<LifecycleEvent>>(cap);
            let l = Arc::clone(listener);
            let handler = on_error.clone();

            let handle = runtime.spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let outcome = AssertUnwindSafe(l.on_event(ev.as_ref()))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|p| {
                            Err(CallbackError::Panicked {
                                info: panic_message(&*p),
                            })
                        });
                    if let Err(error) = outcome {
                        report(
                            handler.as_ref(),
                            ListenerFailure {
                                listener: name,
                                phase: ev.phase,
                                error,
                            },
                        );
                    }
                }
            });
            channels.push(ListenerChannel {
                name,
                filter: listener.filter(),
                sender: tx,
            });
            workers.push(handle);
        }

        Ok(Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
            types,
            on_error,
        })
    }

    /// Queues `event` for every matching listener.
    ///
    /// - Uses `try_send` (non-blocking)
    /// - On queue full: drops the event for that listener and reports it
    /// - On queue closed (after shutdown): drops the event and reports it
    pub fn emit(&self, event: Arc<LifecycleEvent>) {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

        for channel in channels.iter() {
            if !channel.filter.matches(&event, &self.types) {
                continue;
            }
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            report(
                self.on_error.as_ref(),
                ListenerFailure {
                    listener: channel.name,
                    phase: event.phase,
                    error: CallbackError::fail(format!("event dropped: queue {reason}")),
                },
            );
        }
    }

    /// Number of listeners with a live queue.
    pub fn len(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gracefully shuts down all listener workers.
    ///
    /// 1. Drops all channel senders (workers drain their queue, then see it closed)
    /// 2. Awaits all worker tasks to finish
    ///
    /// Events emitted afterwards match no listener.
    pub async fn shutdown(&self) {
        let channels = std::mem::take(&mut *self.channels.lock().unwrap_or_else(PoisonError::into_inner));
        drop(channels);

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        trace!(workers = workers.len(), "draining listener workers");
        for h in workers {
            let _ = h.await;
        }
    }
}

/// Hands a failure to the error handler, or logs it when there is none.
pub(crate) fn report(handler: Option<&ErrorHandler>, failure: ListenerFailure) {
    warn!(
        listener = failure.listener,
        phase = %failure.phase,
        error = %failure.error,
        "listener failed"
    );
    if let Some(h) = handler {
        h(&failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Phase;
    use crate::entity::{Entity, EntityType};
    use crate::listeners::ListenFn;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct User;
    impl Entity for User {}

    fn event(phase: Phase) -> Arc<LifecycleEvent> {
        Arc::new(LifecycleEvent::new(phase, "users", EntityType::of::<User>()))
    }

    #[tokio::test]
    async fn test_delivers_only_matching_events() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let listener = ListenFn::arc(
            "loads",
            ListenerFilter::for_type::<User>().phase(Phase::AfterLoad),
            move |_ev: &LifecycleEvent| {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        let set = ListenerSet::new(&[listener], 16, Arc::new(TypeHierarchy::new()), None).unwrap();

        set.emit(event(Phase::AfterLoad));
        set.emit(event(Phase::BeforeSave));
        set.emit(event(Phase::AfterLoad));
        set.shutdown().await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_failures_and_panics_are_reported() {
        struct Flaky;

        #[async_trait]
        impl Listen for Flaky {
            async fn on_event(&self, ev: &LifecycleEvent) -> Result<(), CallbackError> {
                match ev.phase {
                    Phase::AfterSave => panic!("listener blew up"),
                    _ => Err(CallbackError::fail("nope")),
                }
            }
            fn name(&self) -> &'static str {
                "flaky"
            }
        }

        let seen: Arc<Mutex<Vec<ListenerFailure>>> = Default::default();
        let s = Arc::clone(&seen);
        let handler: ErrorHandler = Arc::new(move |f: &ListenerFailure| {
            s.lock().unwrap().push(f.clone());
        });

        let listeners: Vec<Arc<dyn Listen>> = vec![Arc::new(Flaky)];
        let set = ListenerSet::new(&listeners, 16, Arc::new(TypeHierarchy::new()), Some(handler)).unwrap();
        set.emit(event(Phase::BeforeSave));
        set.emit(event(Phase::AfterSave));
        set.shutdown().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].error.as_label(), "callback_failed");
        assert_eq!(
            seen[1].error,
            CallbackError::Panicked {
                info: "listener blew up".into()
            }
        );
        assert!(seen.iter().all(|f| f.listener == "flaky"));
    }

    #[tokio::test]
    async fn test_emit_after_shutdown_is_dropped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let listener = ListenFn::arc("any", ListenerFilter::all(), move |_ev: &LifecycleEvent| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let set = ListenerSet::new(&[listener], 4, Arc::new(TypeHierarchy::new()), None).unwrap();
        set.shutdown().await;
        set.emit(event(Phase::AfterSave));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_new_outside_runtime_is_error() {
        let listener = ListenFn::arc("any", ListenerFilter::all(), |_ev: &LifecycleEvent| Ok(()));
        let err = ListenerSet::new(&[listener], 4, Arc::new(TypeHierarchy::new()), None)
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "executor_unavailable");
    }
}
