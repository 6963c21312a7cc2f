//! # Lifecycle event listeners.
//!
//! This module provides the [`Listen`] trait and built-in helpers for observing
//! events broadcast through the [`EventBus`](crate::EventBus).
//!
//! ## Architecture
//! ```text
//! Template ── publish(LifecycleEvent) ──► EventBus
//!                                            │ filter match
//!                                            ├──► Sequential: l.on_event(&ev) one by one
//!                                            └──► FireAndForget: ListenerSet
//!                                                     ├──► [queue] ──► worker ──► l1.on_event()
//!                                                     └──► [queue] ──► worker ──► lN.on_event()
//! ```
//!
//! ## Implementing custom listeners
//! ```no_run
//! use async_trait::async_trait;
//! use hookvisor::{CallbackError, LifecycleEvent, Listen, Phase};
//!
//! struct SaveCounter;
//!
//! #[async_trait]
//! impl Listen for SaveCounter {
//!     async fn on_event(&self, event: &LifecycleEvent) -> Result<(), CallbackError> {
//!         if event.phase == Phase::AfterSave {
//!             // increment counter
//!         }
//!         Ok(())
//!     }
//! }
//! ```

mod listener;
mod listener_set;
#[cfg(feature = "logging")]
mod log;

pub use listener::{ListenFn, Listen, ListenerFilter};
pub use listener_set::ListenerSet;
#[cfg(feature = "logging")]
pub use log::LogWriter;

pub(crate) use listener_set::report;
