//! # Lifecycle events published on the bus.
//!
//! A [`LifecycleEvent`] mirrors one checkpoint of a persistence operation: which
//! [`Phase`] was reached, for which collection and entity type, and (when the
//! phase has one) a copy of the document. Events carry no entity; listeners
//! cannot transform anything.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when fire-and-forget delivery reorders events
//! across listeners.
//!
//! ## Example
//! ```rust
//! use hookvisor::{EntityType, LifecycleEvent, Phase};
//!
//! #[derive(Debug)]
//! struct User;
//! impl hookvisor::Entity for User {}
//!
//! let ev = LifecycleEvent::new(Phase::AfterLoad, "users", EntityType::of::<User>());
//! assert_eq!(ev.phase, Phase::AfterLoad);
//! assert_eq!(&*ev.collection, "users");
//! assert!(ev.document.is_none());
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;

use crate::core::Phase;
use crate::entity::{Document, EntityType, Snapshot};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Notification that a lifecycle checkpoint was reached.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    /// Global sequence number (monotonic).
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Checkpoint reached.
    pub phase: Phase,
    /// Target store namespace.
    pub collection: Arc<str>,
    /// Declared entity type; listener filters match against it.
    pub entity_type: EntityType,
    /// Document at this checkpoint, when the phase has one.
    pub document: Option<Document>,
}

impl LifecycleEvent {
    /// Creates an event with no document.
    pub fn new(phase: Phase, collection: impl Into<Arc<str>>, entity_type: EntityType) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            phase,
            collection: collection.into(),
            entity_type,
            document: None,
        }
    }

    /// Creates the event matching a snapshot that just passed `phase`.
    pub fn from_snapshot(phase: Phase, collection: impl Into<Arc<str>>, snapshot: &Snapshot) -> Self {
        let ev = Self::new(phase, collection, snapshot.entity_type());
        match snapshot.document() {
            Some(doc) => ev.with_document(doc.clone()),
            None => ev,
        }
    }

    #[inline]
    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    /// The document's `_id`, if present.
    pub fn document_id(&self) -> Option<&Value> {
        self.document.as_ref()?.get("_id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use serde_json::json;

    #[derive(Debug)]
    struct User;
    impl Entity for User {}

    #[test]
    fn test_seq_is_monotonic() {
        let a = LifecycleEvent::new(Phase::BeforeSave, "users", EntityType::of::<User>());
        let b = LifecycleEvent::new(Phase::AfterSave, "users", EntityType::of::<User>());
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_from_snapshot_copies_document() {
        let mut doc = Document::new();
        doc.insert("_id".into(), json!("u-1"));
        let snap = Snapshot::new(User).with_document(doc);

        let ev = LifecycleEvent::from_snapshot(Phase::AfterSave, "users", &snap);
        assert_eq!(ev.entity_type, EntityType::of::<User>());
        assert_eq!(ev.document_id(), Some(&json!("u-1")));
        assert!(snap.has_document());
    }
}
