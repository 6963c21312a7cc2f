//! Persistence driver: the consumer of the lifecycle checkpoints.
//!
//! ## Contents
//! - [`Codec`], [`JsonCodec`], [`Reference`] entity ⇄ document conversion and cross-references
//! - [`Store`], [`MemoryStore`] async document store boundary and an in-memory implementation
//! - [`Template`] `save` / `find_by_id` / `find_all` running every checkpoint

mod codec;
mod operations;
mod store;

pub use codec::{Codec, JsonCodec, Reference};
pub use operations::Template;
pub use store::{MemoryStore, Store};
