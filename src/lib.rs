//! # hookvisor
//!
//! **Hookvisor** is an entity lifecycle callback pipeline for Rust.
//!
//! It intercepts domain objects as they move through conversion
//! (object ⇄ document) and persistence (store read/write), letting registered
//! callbacks transform or veto them at well-defined checkpoints, in a
//! deterministic order, under either a blocking or a non-blocking execution model.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Transform   │   │    Notify    │   │    Listen    │
//!     │ (audit, ...) │   │(validate,...)│   │ (log, ...)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  │
//! ┌──────────────────────────────────────────┐     │
//! │  LifecycleBuilder (bootstrap)            │◄────┘
//! │  - TypeHierarchy (declared supertypes)   │
//! │  - Registry (phase → registrations)      │
//! └──────────────────┬───────────────────────┘
//!                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Lifecycle                                                        │
//! │  - InvocationChain: resolve(type, phase) → fold → Snapshot        │
//! │  - EventBus: publish(LifecycleEvent) → matching listeners         │
//! │  - ExecutionStrategy: Blocking | NonBlocking (Completion)         │
//! └──────────────────┬────────────────────────────────────────────────┘
//!                    ▲ run_phase / publish at each checkpoint
//! ┌──────────────────┴────────────────────────────────────────────────┐
//! │  Template<Codec, Store>                                           │
//! │  save:  BeforeConvert → encode → BeforeSave → write → AfterSave   │
//! │  find:  read → AfterLoad → decode → (references) → AfterConvert   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Resolution order
//! ```text
//! registrations(phase)
//!   └─ keep: bound == T | bound declared as supertype of T | bound == dyn Entity
//!   └─ sort: specificity (exact < declared depth < universal)
//!            → explicit Order (lower first, default LOWEST)
//!            → registration sequence
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Callbacks**     | Transforming and notifying callbacks with typed bounds.      | [`Transform`], [`Notify`], [`TransformFn`]  |
//! | **Types**         | Runtime type keys and explicit supertype declarations.       | [`EntityType`], [`TypeHierarchy`], [`upcast!`] |
//! | **Chain**         | Ordered, short-circuiting fold over resolved callbacks.      | [`InvocationChain`], [`Snapshot`]           |
//! | **Events**        | Broadcast of checkpoint events to filtered listeners.        | [`EventBus`], [`Listen`], [`LifecycleEvent`]|
//! | **Persistence**   | Reference driver running every checkpoint.                   | [`Template`], [`Codec`], [`Store`]          |
//! | **Errors**        | Typed errors with stable labels.                             | [`ChainError`], [`RegistryError`]           |
//! | **Configuration** | Deployment-wide settings.                                    | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] listener _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use hookvisor::{
//!     upcast, CallContext, CallbackError, Config, Entity, Lifecycle, MemoryStore, NotifyFn,
//!     Phase, Template, TransformFn, TypeHierarchy, JsonCodec,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! trait Audited: Send + Sync + 'static {
//!     fn touch(&mut self, by: &str);
//! }
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     #[serde(rename = "_id")]
//!     id: String,
//!     name: String,
//!     modified_by: Option<String>,
//! }
//!
//! impl Entity for User {}
//!
//! impl Audited for User {
//!     fn touch(&mut self, by: &str) { self.modified_by = Some(by.to_string()); }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut types = TypeHierarchy::new();
//!     types.declare::<User>().extends(upcast!(User => dyn Audited))?;
//!
//!     let lifecycle = Lifecycle::builder(Config::default())
//!         .with_types(types)
//!         .with_transform(
//!             Phase::BeforeConvert,
//!             10,
//!             TransformFn::<dyn Audited, _>::capability("audit", |a, _ctx| {
//!                 a.touch("system");
//!                 Ok(())
//!             }),
//!         )
//!         .with_notify(
//!             Phase::BeforeConvert,
//!             20,
//!             NotifyFn::exact("non-empty-name", |u: &User, _: &CallContext| {
//!                 if u.name.is_empty() { Err(CallbackError::veto("empty name")) } else { Ok(()) }
//!             }),
//!         )
//!         .build()?;
//!
//!     let template = Template::new(
//!         Arc::new(lifecycle),
//!         JsonCodec::new().with_type::<User>(),
//!         MemoryStore::new(),
//!     );
//!
//!     let saved = template
//!         .save("users", User { id: "u-1".into(), name: "ada".into(), modified_by: None })
//!         .await?;
//!     assert_eq!(saved.modified_by.as_deref(), Some("system"));
//!
//!     let loaded: Option<User> = template.find_by_id("users", "u-1").await?;
//!     assert_eq!(loaded.map(|u| u.name), Some("ada".to_string()));
//!     Ok(())
//! }
//! ```

mod callbacks;
mod core;
mod entity;
mod error;
mod events;
mod listeners;
mod template;

// ---- Public re-exports ----

pub use callbacks::{CallContext, Callback, CallbackKind, Notify, NotifyFn, Transform, TransformFn};
pub use core::{
    ChainResult, Completion, Config, DeliveryMode, ExecutionStrategy, InvocationChain, Lifecycle,
    LifecycleBuilder, ListenerErrorPolicy, Order, Phase, Registration, Registry,
};
pub use entity::{
    CastMut, CastRef, Document, Entity, EntityType, Snapshot, Specificity, TypeDecl, TypeHierarchy,
    Upcast,
};
pub use error::{
    BuildError, CallbackError, ChainError, CodecError, ExecutorError, ListenerFailure,
    OperationError, PublishError, RegistryError, StoreError,
};
pub use events::{ErrorHandler, EventBus, LifecycleEvent, PublishResult};
pub use listeners::{ListenFn, Listen, ListenerFilter, ListenerSet};
pub use template::{Codec, JsonCodec, MemoryStore, Reference, Store, Template};

// Optional: expose a simple built-in logging listener.
#[cfg(feature = "logging")]
pub use listeners::LogWriter;
