//! # Snapshot: the value flowing through an invocation chain.
//!
//! Depending on the phase a snapshot holds the domain object, the wire document,
//! or both:
//!
//! | Phase           | entity    | document  |
//! |-----------------|-----------|-----------|
//! | `BeforeConvert` | required  | optional  |
//! | `BeforeSave`    | required  | required  |
//! | `AfterSave`     | required  | required  |
//! | `AfterLoad`     | optional  | required  |
//! | `AfterConvert`  | required  | required  |
//!
//! The snapshot always knows its concrete [`EntityType`], even when only the
//! document is present (`AfterLoad`), so the resolver can pick callbacks before
//! the object exists.
//!
//! Ownership moves along the chain: each transforming callback consumes the
//! snapshot and returns the next one.

use std::fmt;

use crate::core::Phase;
use crate::entity::types::{Entity, EntityType};
use crate::error::ChainError;

/// Wire-format document (codec output, store input).
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Entity and/or document at one checkpoint.
pub struct Snapshot {
    entity_type: EntityType,
    entity: Option<Box<dyn Entity>>,
    document: Option<Document>,
}

impl Snapshot {
    /// Snapshot holding a domain object (write path, `BeforeConvert`).
    ///
    /// An already boxed entity goes through [`Snapshot::from_boxed`]; the box
    /// itself is not an entity:
    ///
    /// ```compile_fail
    /// use hookvisor::{Entity, Snapshot};
    ///
    /// #[derive(Debug)]
    /// struct Person;
    /// impl Entity for Person {}
    ///
    /// let boxed: Box<dyn Entity> = Box::new(Person);
    /// let _ = Snapshot::new(boxed);
    /// ```
    pub fn new<T: Entity>(entity: T) -> Self {
        Self {
            entity_type: EntityType::of::<T>(),
            entity: Some(Box::new(entity)),
            document: None,
        }
    }

    /// Snapshot from an already erased entity.
    pub fn from_boxed(entity: Box<dyn Entity>) -> Self {
        Self {
            entity_type: entity.entity_type(),
            entity: Some(entity),
            document: None,
        }
    }

    /// Snapshot of a raw document about to be converted into `entity_type` (`AfterLoad`).
    pub fn loaded(entity_type: EntityType, document: Document) -> Self {
        Self {
            entity_type,
            entity: None,
            document: Some(document),
        }
    }

    /// Attaches (or replaces) the document.
    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    /// Attaches the converted entity to a loaded snapshot.
    ///
    /// Hands the entity back as `Err` when its type differs from the snapshot's
    /// declared type.
    pub fn with_entity(mut self, entity: Box<dyn Entity>) -> Result<Self, Box<dyn Entity>> {
        if entity.entity_type() != self.entity_type {
            return Err(entity);
        }
        self.entity = Some(entity);
        Ok(self)
    }

    #[inline]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn entity(&self) -> Option<&dyn Entity> {
        self.entity.as_deref()
    }

    pub fn entity_mut(&mut self) -> Option<&mut dyn Entity> {
        self.entity.as_deref_mut()
    }

    /// Typed access to the entity when its concrete type is `T`.
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.entity()?.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.entity_mut()?.as_any_mut().downcast_mut::<T>()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    pub fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Splits the snapshot into its parts.
    pub fn into_parts(self) -> (Option<Box<dyn Entity>>, Option<Document>) {
        (self.entity, self.document)
    }

    /// Takes the entity out as its concrete type.
    pub fn into_entity<T: Entity>(self) -> Option<T> {
        let any = self.entity?.into_any();
        any.downcast::<T>().ok().map(|b| *b)
    }

    /// Checks the phase's shape rules (see module docs).
    pub(crate) fn check_shape(&self, phase: Phase) -> Result<(), ChainError> {
        if phase.requires_entity() && self.entity.is_none() {
            return Err(ChainError::MalformedSnapshot {
                phase,
                missing: "entity",
            });
        }
        if phase.requires_document() && self.document.is_none() {
            return Err(ChainError::MalformedSnapshot {
                phase,
                missing: "document",
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("entity_type", &self.entity_type)
            .field("entity", &self.entity)
            .field("document", &self.document)
            .finish()
    }
}
