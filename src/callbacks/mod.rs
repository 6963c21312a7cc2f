//! Callback shapes registered into the pipeline.
//!
//! ## Contents
//! - [`Transform`], [`Notify`] the two callback capabilities (async traits)
//! - [`Callback`] registered body, one of the two shapes
//! - [`CallContext`] phase, collection and typed entity views for one chain run
//! - [`TransformFn`], [`NotifyFn`] closure-backed callbacks with a typed bound

mod callback;
mod callback_fn;

pub use callback::{CallContext, Callback, CallbackKind, Notify, Transform};
pub use callback_fn::{NotifyFn, TransformFn};
