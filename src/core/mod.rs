//! Pipeline core: phases, registry, resolution, the invocation chain and the facade.
//!
//! The public entry point of this module is [`Lifecycle`], built with
//! [`LifecycleBuilder`] from a [`Config`].
//!
//! Internal modules:
//! - [`phase`]: lifecycle checkpoints and their snapshot shapes;
//! - [`registry`]: phase-indexed callback bindings;
//! - [`resolver`]: concrete type + phase → ordered callbacks;
//! - [`chain`]: sequential fold with short-circuit, copy-on-write registry;
//! - [`strategy`]: blocking vs non-blocking driving, [`Completion`];
//! - [`config`]: deployment-wide settings;
//! - [`builder`] / [`lifecycle`]: bootstrap wiring and the facade.

mod builder;
mod chain;
mod config;
mod lifecycle;
mod phase;
mod registry;
mod resolver;
mod strategy;

pub use builder::LifecycleBuilder;
pub use chain::{ChainResult, InvocationChain};
pub use config::{Config, DeliveryMode, ListenerErrorPolicy};
pub use lifecycle::Lifecycle;
pub use phase::Phase;
pub use registry::{Order, Registration, Registry};
pub use strategy::{Completion, ExecutionStrategy};
