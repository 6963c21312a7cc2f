//! # Template: persistence operations driving the lifecycle checkpoints.
//!
//! ```text
//! save(collection, entity):
//!   BeforeConvert ─► codec.encode ─► BeforeSave ─► store.write (ack) ─► AfterSave
//!
//! find_by_id / find_all:
//!   store.read ─► AfterLoad ─► codec.decode
//!             ─► for each reference: store.read ─► AfterLoad ─► decode ─► AfterConvert ─► attach
//!             ─► AfterConvert
//! ```
//!
//! ## Rules
//! - Every checkpoint runs the callback chain, then publishes the matching event.
//! - A chain failure aborts the operation; later checkpoints never run.
//! - A failed publish is logged and does not fail the operation.
//! - Referenced documents are loaded as roots: they get their own `AfterLoad` and
//!   `AfterConvert`. References of a referenced document are not followed.
//! - Values embedded in a document never see callbacks.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{Lifecycle, Phase};
use crate::entity::{Document, Entity, EntityType, Snapshot};
use crate::error::{ChainError, OperationError};
use crate::events::LifecycleEvent;
use crate::template::codec::Codec;
use crate::template::store::Store;

/// Persistence operations over a codec and a store, wired to a [`Lifecycle`].
pub struct Template<C, S> {
    lifecycle: Arc<Lifecycle>,
    codec: C,
    store: S,
}

impl<C: Codec, S: Store> Template<C, S> {
    pub fn new(lifecycle: Arc<Lifecycle>, codec: C, store: S) -> Self {
        Self {
            lifecycle,
            codec,
            store,
        }
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Saves `entity` into `collection` and returns it as seen by `AfterSave`.
    pub async fn save<T: Entity>(&self, collection: &str, entity: T) -> Result<T, OperationError> {
        let snapshot = self
            .checkpoint(Phase::BeforeConvert, Snapshot::new(entity), collection)
            .await?;

        let document = self.codec.encode(entity_of(&snapshot, Phase::BeforeConvert)?)?;
        let snapshot = self
            .checkpoint(Phase::BeforeSave, snapshot.with_document(document), collection)
            .await?;

        let outgoing = snapshot
            .document()
            .cloned()
            .ok_or_else(|| malformed(Phase::BeforeSave, "document"))?;
        let ack = self.store.write(collection, outgoing).await?;
        debug!(collection, id = ?ack.get("_id"), "document written");

        let snapshot = self
            .checkpoint(Phase::AfterSave, snapshot.with_document(ack), collection)
            .await?;
        downcast(snapshot)
    }

    /// Loads the document with `_id == id` from `collection` as a `T`.
    pub async fn find_by_id<T: Entity>(
        &self,
        collection: &str,
        id: impl Into<Value>,
    ) -> Result<Option<T>, OperationError> {
        let id = id.into();
        let Some(document) = self.store.read(collection, &id).await? else {
            return Ok(None);
        };
        let snapshot = self
            .load(EntityType::of::<T>(), collection, document)
            .await?;
        downcast(snapshot).map(Some)
    }

    /// Loads every document of `collection` as a `T`, in store order.
    pub async fn find_all<T: Entity>(&self, collection: &str) -> Result<Vec<T>, OperationError> {
        let documents = self.store.scan(collection).await?;
        let mut out = Vec::with_capacity(documents.len());
        for document in documents {
            let snapshot = self
                .load(EntityType::of::<T>(), collection, document)
                .await?;
            out.push(downcast(snapshot)?);
        }
        Ok(out)
    }

    /// Loads one root: AfterLoad, decode, references, AfterConvert.
    async fn load(
        &self,
        ty: EntityType,
        collection: &str,
        document: Document,
    ) -> Result<Snapshot, OperationError> {
        let mut root = self.decode(ty, collection, document).await?;

        let references = match root.document() {
            Some(doc) => self.codec.references(ty, doc),
            None => Vec::new(),
        };
        for r in references {
            let Some(document) = self.store.read(&r.collection, &r.id).await? else {
                warn!(
                    collection = %r.collection,
                    id = %r.id,
                    field = %r.field,
                    "referenced document not found"
                );
                continue;
            };
            let referenced = self.decode(r.entity_type, &r.collection, document).await?;
            let referenced = self
                .checkpoint(Phase::AfterConvert, referenced, &r.collection)
                .await?;
            let (Some(entity), _) = referenced.into_parts() else {
                return Err(malformed(Phase::AfterConvert, "entity"));
            };
            let target = root
                .entity_mut()
                .ok_or_else(|| malformed(Phase::AfterLoad, "entity"))?;
            self.codec.attach(target, &r.field, entity)?;
        }

        self.checkpoint(Phase::AfterConvert, root, collection).await
    }

    /// AfterLoad, then decode into an entity carrying its document.
    async fn decode(
        &self,
        ty: EntityType,
        collection: &str,
        document: Document,
    ) -> Result<Snapshot, OperationError> {
        let loaded = self
            .checkpoint(Phase::AfterLoad, Snapshot::loaded(ty, document), collection)
            .await?;
        let (_, document) = loaded.into_parts();
        let document = document.ok_or_else(|| malformed(Phase::AfterLoad, "document"))?;

        let entity = self.codec.decode(ty, &document)?;
        let actual = entity.as_ref().entity_type();
        if actual != ty {
            return Err(OperationError::UnexpectedType {
                expected: ty,
                actual,
            });
        }
        Ok(Snapshot::from_boxed(entity).with_document(document))
    }

    /// Runs the chain for `phase`, then publishes the matching event.
    async fn checkpoint(
        &self,
        phase: Phase,
        snapshot: Snapshot,
        collection: &str,
    ) -> Result<Snapshot, OperationError> {
        let snapshot = self
            .lifecycle
            .run_phase(phase, snapshot, collection)
            .await?;

        if self.lifecycle.bus().is_enabled() {
            let event = LifecycleEvent::from_snapshot(phase, collection, &snapshot);
            if let Err(e) = self.lifecycle.publish(event).await {
                warn!(phase = %phase, collection, error = %e, "lifecycle event delivery failed");
            }
        }
        Ok(snapshot)
    }
}

fn malformed(phase: Phase, missing: &'static str) -> OperationError {
    ChainError::MalformedSnapshot { phase, missing }.into()
}

fn entity_of(snapshot: &Snapshot, phase: Phase) -> Result<&dyn Entity, OperationError> {
    snapshot.entity().ok_or_else(|| malformed(phase, "entity"))
}

fn downcast<T: Entity>(snapshot: Snapshot) -> Result<T, OperationError> {
    let actual = snapshot.entity_type();
    snapshot
        .into_entity::<T>()
        .ok_or(OperationError::UnexpectedType {
            expected: EntityType::of::<T>(),
            actual,
        })
}
