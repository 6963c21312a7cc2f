//! # Closure-backed typed callbacks (`TransformFn`, `NotifyFn`)
//!
//! Wrap a synchronous closure over a typed view of the entity. The view type `T`
//! is the callback's bound:
//!
//! | constructor            | bound              | view          |
//! |------------------------|--------------------|---------------|
//! | `exact::<Person>`      | `Person`           | `&mut Person` |
//! | `capability::<dyn N>`  | declared supertype | `&mut dyn N`  |
//! | `universal`            | every entity       | `&mut dyn Entity` |
//!
//! Capability views are resolved at call time through the
//! [`TypeHierarchy`](crate::TypeHierarchy); an entity that does not declare the
//! capability fails with [`CallbackError::TypeMismatch`].
//!
//! For callbacks that need to suspend (I/O), implement [`Transform`] or
//! [`Notify`] directly.
//!
//! ## Example
//! ```rust
//! use hookvisor::{CallContext, Callback, Entity, TransformFn};
//!
//! #[derive(Debug)]
//! struct Person { name: String }
//! impl Entity for Person {}
//!
//! let trim = TransformFn::exact("trim-name", |p: &mut Person, _ctx: &CallContext| {
//!     p.name = p.name.trim().to_string();
//!     Ok(())
//! });
//! let cb = Callback::transforming(trim);
//! assert_eq!(cb.name(), "trim-name");
//! ```

use std::borrow::Cow;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::callbacks::callback::{CallContext, Notify, Transform};
use crate::entity::{Entity, EntityType, Snapshot, Upcast};
use crate::error::CallbackError;

/// How a typed callback obtains its view of the entity.
pub(crate) struct Access<T: ?Sized + 'static> {
    /// Fixed upcast for exact and universal bounds; `None` = look up the declared capability.
    direct: Option<Upcast<T>>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> Access<T> {
    pub(crate) fn declared() -> Self {
        Self {
            direct: None,
            _marker: PhantomData,
        }
    }

    fn with(up: Upcast<T>) -> Self {
        Self {
            direct: Some(up),
            _marker: PhantomData,
        }
    }

    /// The bound this access is for.
    pub(crate) fn bound(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn upcast(&self, ctx: &CallContext, snapshot: &Snapshot) -> Result<Upcast<T>, CallbackError> {
        self.direct
            .or_else(|| ctx.types().upcast::<T>(snapshot.entity_type()))
            .ok_or(CallbackError::TypeMismatch {
                expected: self.bound(),
                actual: snapshot.entity_type(),
            })
    }

    pub(crate) fn view<'s>(
        &self,
        ctx: &CallContext,
        snapshot: &'s Snapshot,
    ) -> Result<&'s T, CallbackError> {
        let up = self.upcast(ctx, snapshot)?;
        let entity = snapshot.entity().ok_or(CallbackError::MissingEntity {
            phase: ctx.phase(),
        })?;
        up.view(entity).ok_or(CallbackError::TypeMismatch {
            expected: self.bound(),
            actual: snapshot.entity_type(),
        })
    }

    pub(crate) fn view_mut<'s>(
        &self,
        ctx: &CallContext,
        snapshot: &'s mut Snapshot,
    ) -> Result<&'s mut T, CallbackError> {
        let up = self.upcast(ctx, snapshot)?;
        let actual = snapshot.entity_type();
        let entity = snapshot.entity_mut().ok_or(CallbackError::MissingEntity {
            phase: ctx.phase(),
        })?;
        up.view_mut(entity).ok_or(CallbackError::TypeMismatch {
            expected: self.bound(),
            actual,
        })
    }
}

impl<T: Entity> Access<T> {
    pub(crate) fn exact() -> Self {
        Self::with(Upcast::exact())
    }
}

impl Access<dyn Entity> {
    pub(crate) fn universal() -> Self {
        Self::with(Upcast::universal())
    }
}

/// Transforming callback backed by `Fn(&mut T, &CallContext)`.
pub struct TransformFn<T: ?Sized + 'static, F> {
    name: Cow<'static, str>,
    access: Access<T>,
    f: F,
}

impl<T, F> TransformFn<T, F>
where
    T: Entity,
    F: Fn(&mut T, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    /// Callback bound to the concrete type `T`.
    pub fn exact(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            access: Access::exact(),
            f,
        }
    }
}

impl<C, F> TransformFn<C, F>
where
    C: ?Sized + 'static,
    F: Fn(&mut C, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    /// Callback bound to a capability declared in the type hierarchy.
    pub fn capability(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            access: Access::declared(),
            f,
        }
    }
}

impl<F> TransformFn<dyn Entity, F>
where
    F: Fn(&mut dyn Entity, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    /// Callback bound to every entity.
    pub fn universal(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            access: Access::universal(),
            f,
        }
    }
}

impl<T: ?Sized + 'static, F> TransformFn<T, F> {
    /// The type bound this callback should be registered with.
    pub fn bound(&self) -> EntityType {
        self.access.bound()
    }
}

#[async_trait]
impl<T, F> Transform for TransformFn<T, F>
where
    T: ?Sized + 'static,
    F: Fn(&mut T, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(
        &self,
        mut snapshot: Snapshot,
        ctx: &CallContext,
    ) -> Result<Snapshot, CallbackError> {
        let view = self.access.view_mut(ctx, &mut snapshot)?;
        (self.f)(view, ctx)?;
        Ok(snapshot)
    }

    fn view_bound(&self) -> Option<EntityType> {
        Some(self.access.bound())
    }
}

/// Notifying callback backed by `Fn(&T, &CallContext)`.
pub struct NotifyFn<T: ?Sized + 'static, F> {
    name: Cow<'static, str>,
    access: Access<T>,
    f: F,
}

impl<T, F> NotifyFn<T, F>
where
    T: Entity,
    F: Fn(&T, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    /// Callback bound to the concrete type `T`.
    pub fn exact(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            access: Access::exact(),
            f,
        }
    }
}

impl<C, F> NotifyFn<C, F>
where
    C: ?Sized + 'static,
    F: Fn(&C, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    /// Callback bound to a capability declared in the type hierarchy.
    pub fn capability(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            access: Access::declared(),
            f,
        }
    }
}

impl<F> NotifyFn<dyn Entity, F>
where
    F: Fn(&dyn Entity, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    /// Callback bound to every entity.
    pub fn universal(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            access: Access::universal(),
            f,
        }
    }
}

impl<T: ?Sized + 'static, F> NotifyFn<T, F> {
    /// The type bound this callback should be registered with.
    pub fn bound(&self) -> EntityType {
        self.access.bound()
    }
}

#[async_trait]
impl<T, F> Notify for NotifyFn<T, F>
where
    T: ?Sized + 'static,
    F: Fn(&T, &CallContext) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, snapshot: &Snapshot, ctx: &CallContext) -> Result<(), CallbackError> {
        let view = self.access.view(ctx, snapshot)?;
        (self.f)(view, ctx)
    }

    fn view_bound(&self) -> Option<EntityType> {
        Some(self.access.bound())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Phase;
    use crate::entity::TypeHierarchy;
    use crate::upcast;
    use std::sync::Arc;

    trait Named: Send + Sync + 'static {
        fn name_mut(&mut self) -> &mut String;
    }

    #[derive(Debug, PartialEq)]
    struct Person {
        name: String,
    }
    impl Entity for Person {}

    impl Named for Person {
        fn name_mut(&mut self) -> &mut String {
            &mut self.name
        }
    }

    #[derive(Debug)]
    struct Invoice;
    impl Entity for Invoice {}

    fn ctx_for<T: Entity>(types: TypeHierarchy) -> CallContext {
        CallContext::new(
            Phase::BeforeSave,
            Arc::from("people"),
            EntityType::of::<T>(),
            Arc::new(types),
        )
    }

    #[tokio::test]
    async fn test_exact_transform() {
        let cb = TransformFn::exact("upper", |p: &mut Person, _ctx: &CallContext| {
            p.name = p.name.to_uppercase();
            Ok(())
        });
        assert_eq!(cb.bound(), EntityType::of::<Person>());

        let ctx = ctx_for::<Person>(TypeHierarchy::new());
        let out = cb
            .transform(Snapshot::new(Person { name: "ada".into() }), &ctx)
            .await
            .unwrap();
        assert_eq!(out.downcast_ref::<Person>().unwrap().name, "ADA");
    }

    #[tokio::test]
    async fn test_capability_transform() {
        let mut types = TypeHierarchy::new();
        types
            .declare::<Person>()
            .extends(upcast!(Person => dyn Named))
            .unwrap();
        let ctx = ctx_for::<Person>(types);

        let cb = TransformFn::<dyn Named, _>::capability("suffix", |n: &mut dyn Named, _ctx: &CallContext| {
            n.name_mut().push_str("-A");
            Ok(())
        });
        assert_eq!(cb.bound(), EntityType::of::<dyn Named>());

        let out = cb
            .transform(Snapshot::new(Person { name: "x".into() }), &ctx)
            .await
            .unwrap();
        assert_eq!(out.into_entity::<Person>().unwrap().name, "x-A");
    }

    #[tokio::test]
    async fn test_capability_on_undeclared_type_is_mismatch() {
        let ctx = ctx_for::<Invoice>(TypeHierarchy::new());
        let cb = TransformFn::<dyn Named, _>::capability("suffix", |n: &mut dyn Named, _ctx: &CallContext| {
            n.name_mut().push('!');
            Ok(())
        });
        let err = cb
            .transform(Snapshot::new(Invoice), &ctx)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CallbackError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_universal_notify_sees_every_entity() {
        let cb = NotifyFn::universal("type-check", |e: &dyn Entity, ctx: &CallContext| {
            if e.entity_type() == ctx.entity_type() {
                Ok(())
            } else {
                Err(CallbackError::fail("type drift"))
            }
        });
        assert!(cb.bound().is_any());
        let ctx = ctx_for::<Invoice>(TypeHierarchy::new());
        assert!(cb.notify(&Snapshot::new(Invoice), &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_exact_notify_veto() {
        let cb = NotifyFn::exact("non-empty", |p: &Person, _ctx: &CallContext| {
            if p.name.is_empty() {
                Err(CallbackError::veto("name is empty"))
            } else {
                Ok(())
            }
        });
        let ctx = ctx_for::<Person>(TypeHierarchy::new());
        let err = cb
            .notify(&Snapshot::new(Person { name: String::new() }), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_veto());
    }
}
