//! # Entity ⇄ document conversion.
//!
//! The [`Codec`] is the boundary between domain objects and wire documents. The
//! pipeline never looks inside a document; it only calls the codec between the
//! `BeforeConvert` and `BeforeSave` checkpoints (encode) and between `AfterLoad`
//! and `AfterConvert` (decode).
//!
//! [`JsonCodec`] is a serde-backed implementation keyed by registered entity types.
//! Cross-references are declared per root type: the root document stores the
//! referenced document's `_id` under a field, and an attach function hands the
//! loaded referenced entity to the root.
//!
//! ## Example
//! ```rust
//! use hookvisor::{Codec, Entity, EntityType, JsonCodec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     #[serde(rename = "_id")]
//!     id: String,
//!     name: String,
//! }
//!
//! impl Entity for User {}
//!
//! let codec = JsonCodec::new().with_type::<User>();
//! let doc = codec.encode(&User { id: "u-1".into(), name: "ada".into() }).unwrap();
//! assert_eq!(doc["_id"], "u-1");
//!
//! let back = codec.decode(EntityType::of::<User>(), &doc).unwrap();
//! assert_eq!(back.as_ref().entity_type(), EntityType::of::<User>());
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::entity::{Document, Entity, EntityType};
use crate::error::CodecError;

/// Pointer from a root document to another root in some collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Field of the root that holds the reference.
    pub field: String,
    /// Collection of the referenced document.
    pub collection: String,
    /// `_id` of the referenced document.
    pub id: Value,
    /// Entity type of the referenced document.
    pub entity_type: EntityType,
}

/// Converts entities to documents and back.
pub trait Codec: Send + Sync + 'static {
    /// Encodes an entity into a document.
    fn encode(&self, entity: &dyn Entity) -> Result<Document, CodecError>;

    /// Decodes a document into an entity of type `ty`.
    fn decode(&self, ty: EntityType, document: &Document) -> Result<Box<dyn Entity>, CodecError>;

    /// Cross-references held by a document of type `ty`.
    fn references(&self, _ty: EntityType, _document: &Document) -> Vec<Reference> {
        Vec::new()
    }

    /// Hands a loaded referenced entity to its root.
    fn attach(
        &self,
        _root: &mut dyn Entity,
        _field: &str,
        _referenced: Box<dyn Entity>,
    ) -> Result<(), CodecError> {
        Ok(())
    }
}

type EncodeFn = fn(&dyn Entity) -> Result<Document, CodecError>;
type DecodeFn = fn(&Document) -> Result<Box<dyn Entity>, CodecError>;
type AttachFn = Arc<dyn Fn(&mut dyn Entity, Box<dyn Entity>) -> Result<(), CodecError> + Send + Sync>;

struct Binding {
    name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
    references: Vec<RefBinding>,
}

struct RefBinding {
    field: String,
    collection: String,
    target: EntityType,
    attach: AttachFn,
}

/// Serde JSON codec for registered entity types.
#[derive(Default)]
pub struct JsonCodec {
    types: HashMap<TypeId, Binding>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` for encoding and decoding. `T` must serialize to a JSON object.
    pub fn with_type<T>(mut self) -> Self
    where
        T: Entity + Serialize + DeserializeOwned,
    {
        self.types.insert(
            TypeId::of::<T>(),
            Binding {
                name: std::any::type_name::<T>(),
                encode: encode_as::<T>,
                decode: decode_as::<T>,
                references: Vec::new(),
            },
        );
        self
    }

    /// Declares that `field` of a `R` document holds the `_id` of a `T` document in
    /// `collection`; `attach` hands the loaded `T` to the root.
    ///
    /// `R` must already be registered with [`with_type`](Self::with_type).
    pub fn with_reference<R, T>(
        mut self,
        field: &str,
        collection: &str,
        attach: fn(&mut R, T),
    ) -> Result<Self, CodecError>
    where
        R: Entity,
        T: Entity,
    {
        let binding = self.types.get_mut(&TypeId::of::<R>()).ok_or_else(|| {
            CodecError(format!(
                "reference on unregistered type {}",
                std::any::type_name::<R>()
            ))
        })?;

        let field_name = field.to_string();
        binding.references.push(RefBinding {
            field: field.to_string(),
            collection: collection.to_string(),
            target: EntityType::of::<T>(),
            attach: Arc::new(move |root: &mut dyn Entity, referenced: Box<dyn Entity>| {
                let root = root
                    .as_any_mut()
                    .downcast_mut::<R>()
                    .ok_or_else(|| CodecError(format!("attach {field_name}: root type mismatch")))?;
                let referenced = referenced.into_any()
                    .downcast::<T>()
                    .map_err(|_| CodecError(format!("attach {field_name}: referenced type mismatch")))?;
                attach(root, *referenced);
                Ok(())
            }),
        });
        Ok(self)
    }

    fn binding(&self, ty: EntityType) -> Result<&Binding, CodecError> {
        self.types
            .get(&ty.id())
            .ok_or_else(|| CodecError(format!("no codec registered for {ty}")))
    }
}

impl Codec for JsonCodec {
    fn encode(&self, entity: &dyn Entity) -> Result<Document, CodecError> {
        (self.binding(entity.entity_type())?.encode)(entity)
    }

    fn decode(&self, ty: EntityType, document: &Document) -> Result<Box<dyn Entity>, CodecError> {
        (self.binding(ty)?.decode)(document)
    }

    fn references(&self, ty: EntityType, document: &Document) -> Vec<Reference> {
        let Ok(binding) = self.binding(ty) else {
            return Vec::new();
        };
        binding
            .references
            .iter()
            .filter_map(|r| {
                let id = document.get(&r.field).filter(|v| !v.is_null())?;
                Some(Reference {
                    field: r.field.clone(),
                    collection: r.collection.clone(),
                    id: id.clone(),
                    entity_type: r.target,
                })
            })
            .collect()
    }

    fn attach(
        &self,
        root: &mut dyn Entity,
        field: &str,
        referenced: Box<dyn Entity>,
    ) -> Result<(), CodecError> {
        let binding = self.binding(root.entity_type())?;
        let r = binding
            .references
            .iter()
            .find(|r| r.field == field)
            .ok_or_else(|| CodecError(format!("{} has no reference field {field}", binding.name)))?;
        (r.attach)(root, referenced)
    }
}

fn encode_as<T: Entity + Serialize>(entity: &dyn Entity) -> Result<Document, CodecError> {
    let typed = entity
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| CodecError(format!("expected {}", std::any::type_name::<T>())))?;
    match serde_json::to_value(typed).map_err(|e| CodecError(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(CodecError(format!("not a JSON object: {other}"))),
    }
}

fn decode_as<T: Entity + DeserializeOwned>(document: &Document) -> Result<Box<dyn Entity>, CodecError> {
    let value: T = serde_json::from_value(Value::Object(document.clone()))
        .map_err(|e| CodecError(e.to_string()))?;
    Ok(Box::new(value))
}
