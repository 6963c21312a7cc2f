//! # Callback shapes and the per-invocation context.
//!
//! Two closed capability tags replace a class hierarchy of hook methods:
//!
//! - [`Transform`] consumes the [`Snapshot`] and returns the next one. Use it to
//!   stamp audit fields, normalise documents, or rewrite entities.
//! - [`Notify`] borrows the snapshot read-only and returns nothing but an optional
//!   error. It still occupies its ordered slot, so mixed chains stay deterministic.
//!
//! Both are async so the same body runs under either
//! [`ExecutionStrategy`](crate::ExecutionStrategy). A callback's identity is its
//! [`name`](Transform::name); registering the same name twice for a phase is a
//! [`DuplicateBinding`](crate::RegistryError::DuplicateBinding).
//!
//! ## Example
//! ```
//! use async_trait::async_trait;
//! use hookvisor::{CallContext, CallbackError, Snapshot, Transform};
//!
//! struct StampCollection;
//!
//! #[async_trait]
//! impl Transform for StampCollection {
//!     fn name(&self) -> &str { "stamp-collection" }
//!
//!     async fn transform(&self, mut snapshot: Snapshot, ctx: &CallContext) -> Result<Snapshot, CallbackError> {
//!         if let Some(doc) = snapshot.document_mut() {
//!             doc.insert("_collection".into(), ctx.collection().into());
//!         }
//!         Ok(snapshot)
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Phase;
use crate::entity::{EntityType, Snapshot, TypeHierarchy};
use crate::error::CallbackError;

/// Callback that receives a snapshot and produces the next one.
#[async_trait]
pub trait Transform: Send + Sync + 'static {
    /// Stable identity used for duplicate detection and error reports.
    fn name(&self) -> &str;

    /// Transforms the snapshot. Returning an error aborts the chain.
    async fn transform(
        &self,
        snapshot: Snapshot,
        ctx: &CallContext,
    ) -> Result<Snapshot, CallbackError>;

    /// Bound the callback's typed view requires; `None` accepts any snapshot.
    ///
    /// Registration rejects a bound that does not imply this one.
    fn view_bound(&self) -> Option<EntityType> {
        None
    }
}

/// Callback that observes a snapshot without changing it.
#[async_trait]
pub trait Notify: Send + Sync + 'static {
    /// Stable identity used for duplicate detection and error reports.
    fn name(&self) -> &str;

    /// Observes the snapshot. Returning an error aborts the chain.
    async fn notify(&self, snapshot: &Snapshot, ctx: &CallContext) -> Result<(), CallbackError>;

    /// See [`Transform::view_bound`].
    fn view_bound(&self) -> Option<EntityType> {
        None
    }
}

/// Capability tag of a registered callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackKind {
    Transforming,
    Notifying,
}

/// A registered callback body.
#[derive(Clone)]
pub enum Callback {
    Transforming(Arc<dyn Transform>),
    Notifying(Arc<dyn Notify>),
}

impl Callback {
    /// Wraps a transforming callback.
    pub fn transforming(t: impl Transform) -> Self {
        Callback::Transforming(Arc::new(t))
    }

    /// Wraps a notifying callback.
    pub fn notifying(n: impl Notify) -> Self {
        Callback::Notifying(Arc::new(n))
    }

    pub fn name(&self) -> &str {
        match self {
            Callback::Transforming(t) => t.name(),
            Callback::Notifying(n) => n.name(),
        }
    }

    /// Bound the callback's typed view requires, if it has one.
    pub fn view_bound(&self) -> Option<EntityType> {
        match self {
            Callback::Transforming(t) => t.view_bound(),
            Callback::Notifying(n) => n.view_bound(),
        }
    }

    pub fn kind(&self) -> CallbackKind {
        match self {
            Callback::Transforming(_) => CallbackKind::Transforming,
            Callback::Notifying(_) => CallbackKind::Notifying,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Read-only context handed to every callback of one chain run.
#[derive(Clone)]
pub struct CallContext {
    phase: Phase,
    collection: Arc<str>,
    entity_type: EntityType,
    types: Arc<TypeHierarchy>,
}

impl CallContext {
    pub(crate) fn new(
        phase: Phase,
        collection: Arc<str>,
        entity_type: EntityType,
        types: Arc<TypeHierarchy>,
    ) -> Self {
        Self {
            phase,
            collection,
            entity_type,
            types,
        }
    }

    /// Phase being run.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Target store namespace.
    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Concrete type of the entity flowing through the chain.
    #[inline]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// The frozen type hierarchy (for capability views).
    #[inline]
    pub fn types(&self) -> &TypeHierarchy {
        &self.types
    }

    /// Views the snapshot's entity as the declared capability `C`.
    pub fn view<'s, C: ?Sized + 'static>(
        &self,
        snapshot: &'s Snapshot,
    ) -> Result<&'s C, CallbackError> {
        let entity = snapshot.entity().ok_or(CallbackError::MissingEntity { phase: self.phase })?;
        self.types
            .upcast::<C>(snapshot.entity_type())
            .and_then(|up| up.view(entity))
            .ok_or_else(|| self.mismatch::<C>(snapshot))
    }

    /// Mutable variant of [`CallContext::view`].
    pub fn view_mut<'s, C: ?Sized + 'static>(
        &self,
        snapshot: &'s mut Snapshot,
    ) -> Result<&'s mut C, CallbackError> {
        let actual = snapshot.entity_type();
        let up = self.types.upcast::<C>(actual).ok_or(CallbackError::TypeMismatch {
            expected: EntityType::of::<C>(),
            actual,
        })?;
        let entity = snapshot
            .entity_mut()
            .ok_or(CallbackError::MissingEntity { phase: self.phase })?;
        up.view_mut(entity).ok_or(CallbackError::TypeMismatch {
            expected: EntityType::of::<C>(),
            actual,
        })
    }

    fn mismatch<C: ?Sized + 'static>(&self, snapshot: &Snapshot) -> CallbackError {
        CallbackError::TypeMismatch {
            expected: EntityType::of::<C>(),
            actual: snapshot.entity_type(),
        }
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("phase", &self.phase)
            .field("collection", &self.collection)
            .field("entity_type", &self.entity_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::upcast;

    trait Tagged: Send + Sync + 'static {
        fn tags(&mut self) -> &mut Vec<String>;
    }

    #[derive(Debug)]
    struct Post {
        tags: Vec<String>,
    }
    impl Entity for Post {}

    impl Tagged for Post {
        fn tags(&mut self) -> &mut Vec<String> {
            &mut self.tags
        }
    }

    fn ctx(types: TypeHierarchy) -> CallContext {
        CallContext::new(
            Phase::BeforeConvert,
            Arc::from("posts"),
            EntityType::of::<Post>(),
            Arc::new(types),
        )
    }

    #[test]
    fn test_view_mut_through_declared_capability() {
        let mut types = TypeHierarchy::new();
        types
            .declare::<Post>()
            .extends(upcast!(Post => dyn Tagged))
            .unwrap();
        let ctx = ctx(types);

        let mut snap = Snapshot::new(Post { tags: vec![] });
        ctx.view_mut::<dyn Tagged>(&mut snap)
            .unwrap()
            .tags()
            .push("rust".into());
        assert_eq!(snap.downcast_ref::<Post>().unwrap().tags, vec!["rust"]);
        assert_eq!(ctx.collection(), "posts");
    }

    #[test]
    fn test_view_undeclared_capability_is_mismatch() {
        let ctx = ctx(TypeHierarchy::new());
        let snap = Snapshot::new(Post { tags: vec![] });
        let err = ctx.view::<dyn Tagged>(&snap).err().unwrap();
        assert_eq!(err.as_label(), "callback_type_mismatch");
    }

    #[test]
    fn test_callback_kind_and_name() {
        struct Noop;

        #[async_trait]
        impl Notify for Noop {
            fn name(&self) -> &str {
                "noop"
            }
            async fn notify(&self, _: &Snapshot, _: &CallContext) -> Result<(), CallbackError> {
                Ok(())
            }
        }

        let cb = Callback::notifying(Noop);
        assert_eq!(cb.name(), "noop");
        assert_eq!(cb.kind(), CallbackKind::Notifying);
    }
}
