//! Lifecycle events: payload and broadcast bus.
//!
//! ## Contents
//! - [`LifecycleEvent`] checkpoint notification with a global sequence number
//! - [`EventBus`] delivers events to matching [`Listen`](crate::Listen)ers
//!
//! ## Quick reference
//! - **Publishers**: [`Template`](crate::Template) after every checkpoint, or
//!   callers through [`Lifecycle::publish`](crate::Lifecycle::publish).
//! - **Consumers**: listeners added with
//!   [`LifecycleBuilder::with_listener`](crate::LifecycleBuilder::with_listener).

mod bus;
mod event;

pub use bus::{ErrorHandler, EventBus, PublishResult};
pub use event::LifecycleEvent;
