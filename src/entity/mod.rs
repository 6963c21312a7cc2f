//! Entities, runtime type keys, the declared type hierarchy, and snapshots.
//!
//! ## Contents
//! - [`Entity`], [`EntityType`], [`Upcast`] erased domain objects and their typed views
//! - [`TypeHierarchy`] explicit supertype declarations used by the resolver
//! - [`Snapshot`], [`Document`] the value carried through an invocation chain

mod hierarchy;
mod snapshot;
mod types;

pub use hierarchy::{Specificity, TypeDecl, TypeHierarchy};
pub use snapshot::{Document, Snapshot};
pub use types::{CastMut, CastRef, Entity, EntityType, Upcast};
