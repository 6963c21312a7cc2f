//! # Entity capability and runtime type keys.
//!
//! Domain types opt in with an empty `impl Entity for Person {}`. Wrappers such
//! as `Box<dyn Entity>` or references are never entities themselves, so the
//! runtime type of an erased entity is always its concrete type.
//!
//! Callbacks are bound to an [`EntityType`], which can name:
//! - a concrete entity type (`EntityType::of::<Person>()`),
//! - a capability trait object declared as a supertype (`EntityType::of::<dyn Named>()`),
//! - the universal bound [`EntityType::any`] (`dyn Entity`), matching every entity.
//!
//! [`Upcast`] carries the casting functions that turn a `&dyn Entity` into a
//! typed view (`&T` for exact bounds, `&dyn Capability` for declared supertypes).
//! Use the [`upcast!`](crate::upcast) macro to build one for a capability.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime key of an entity type or capability.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for logs and errors.
#[derive(Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// Key for `T`, which may be a concrete type or an unsized capability (`dyn Trait`).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The universal bound: every entity is a subtype of `dyn Entity`.
    pub fn any() -> Self {
        Self::of::<dyn Entity>()
    }

    /// Returns true for the universal bound.
    #[inline]
    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<dyn Entity>()
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name (diagnostics only, not stable across compilers).
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A domain object that can flow through the pipeline.
///
/// Opt in with an empty impl:
/// ```
/// use hookvisor::{Entity, EntityType};
///
/// #[derive(Debug)]
/// struct Person { name: String }
///
/// impl Entity for Person {}
///
/// let erased: Box<dyn Entity> = Box::new(Person { name: "ada".into() });
/// assert_eq!(erased.entity_type(), EntityType::of::<Person>());
/// assert_eq!(erased.downcast_ref::<Person>().map(|p| p.name.as_str()), Some("ada"));
/// ```
pub trait Entity: Any + Send + Sync + fmt::Debug + 'static {
    /// Concrete runtime type of this entity.
    fn entity_type(&self) -> EntityType {
        EntityType::of::<Self>()
    }
}

impl dyn Entity {
    #[inline]
    pub fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    #[inline]
    pub fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    /// Returns true if the concrete type is `T`.
    #[inline]
    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    #[inline]
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Shared-reference cast from an erased entity to a typed view.
pub type CastRef<C> = for<'a> fn(&'a dyn Entity) -> Option<&'a C>;

/// Mutable cast from an erased entity to a typed view.
pub type CastMut<C> = for<'a> fn(&'a mut dyn Entity) -> Option<&'a mut C>;

/// Pair of casting functions from `dyn Entity` to the view `C`.
///
/// For capabilities, build it with [`upcast!`](crate::upcast):
/// ```
/// use hookvisor::{upcast, EntityType, Upcast};
///
/// trait Named: Send + Sync + 'static {
///     fn name(&self) -> &str;
/// }
///
/// #[derive(Debug)]
/// struct Person { name: String }
///
/// impl hookvisor::Entity for Person {}
/// impl Named for Person {
///     fn name(&self) -> &str { &self.name }
/// }
///
/// let up: Upcast<dyn Named> = upcast!(Person => dyn Named);
/// let p = Person { name: "ada".into() };
/// assert_eq!(up.view(&p).map(|n| n.name()), Some("ada"));
/// assert_eq!(up.target(), EntityType::of::<dyn Named>());
/// ```
pub struct Upcast<C: ?Sized + 'static> {
    by_ref: CastRef<C>,
    by_mut: CastMut<C>,
}

impl<C: ?Sized + 'static> Clone for Upcast<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized + 'static> Copy for Upcast<C> {}

impl<C: ?Sized + 'static> fmt::Debug for Upcast<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upcast")
            .field("target", &type_name::<C>())
            .finish()
    }
}

impl<C: ?Sized + 'static> Upcast<C> {
    pub fn new(by_ref: CastRef<C>, by_mut: CastMut<C>) -> Self {
        Self { by_ref, by_mut }
    }

    /// Key of the view this upcast produces.
    pub fn target(&self) -> EntityType {
        EntityType::of::<C>()
    }

    #[inline]
    pub fn view<'a>(&self, entity: &'a dyn Entity) -> Option<&'a C> {
        (self.by_ref)(entity)
    }

    #[inline]
    pub fn view_mut<'a>(&self, entity: &'a mut dyn Entity) -> Option<&'a mut C> {
        (self.by_mut)(entity)
    }
}

impl<T: Entity> Upcast<T> {
    /// Downcast to the concrete type `T` (no declaration needed).
    pub fn exact() -> Self {
        Self::new(exact_ref::<T>, exact_mut::<T>)
    }
}

impl Upcast<dyn Entity> {
    /// Identity view used by callbacks bound to the universal bound.
    pub fn universal() -> Self {
        Self::new(universal_ref, universal_mut)
    }
}

fn exact_ref<T: Entity>(entity: &dyn Entity) -> Option<&T> {
    entity.downcast_ref::<T>()
}

fn exact_mut<T: Entity>(entity: &mut dyn Entity) -> Option<&mut T> {
    entity.downcast_mut::<T>()
}

fn universal_ref(entity: &dyn Entity) -> Option<&dyn Entity> {
    Some(entity)
}

fn universal_mut(entity: &mut dyn Entity) -> Option<&mut dyn Entity> {
    Some(entity)
}

/// Builds an [`Upcast`] from a concrete entity type to a capability it implements.
///
/// `upcast!(Person => dyn Named)` expands to a pair of non-capturing closures
/// that downcast to `Person` and coerce to `dyn Named`.
#[macro_export]
macro_rules! upcast {
    ($concrete:ty => $capability:ty) => {
        $crate::Upcast::<$capability>::new(
            |entity| match <dyn $crate::Entity>::downcast_ref::<$concrete>(entity) {
                Some(e) => Some(e),
                None => None,
            },
            |entity| match <dyn $crate::Entity>::downcast_mut::<$concrete>(entity) {
                Some(e) => Some(e),
                None => None,
            },
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync + 'static {
        fn name(&self) -> &str;
        fn rename(&mut self, name: &str);
    }

    #[derive(Debug, PartialEq)]
    struct Person {
        name: String,
    }

    impl Named for Person {
        fn name(&self) -> &str {
            &self.name
        }
        fn rename(&mut self, name: &str) {
            self.name = name.to_string();
        }
    }

    impl Entity for Person {}

    #[derive(Debug)]
    struct Invoice;

    impl Entity for Invoice {}

    #[test]
    fn test_entity_type_identity() {
        assert_eq!(EntityType::of::<Person>(), EntityType::of::<Person>());
        assert_ne!(EntityType::of::<Person>(), EntityType::of::<Invoice>());
        assert_ne!(EntityType::of::<Person>(), EntityType::of::<dyn Named>());
        assert!(EntityType::any().is_any());
        assert!(!EntityType::of::<Person>().is_any());
        assert!(EntityType::of::<Person>().name().ends_with("Person"));
    }

    #[test]
    fn test_boxed_entity_reports_concrete_type() {
        let mut boxed: Box<dyn Entity> = Box::new(Person { name: "x".into() });
        assert_eq!(boxed.entity_type(), EntityType::of::<Person>());
        assert!(boxed.is::<Person>());
        assert!(!boxed.is::<Invoice>());

        let by_mut: &mut dyn Entity = boxed.as_mut();
        assert_eq!(by_mut.entity_type(), EntityType::of::<Person>());

        let back = boxed.into_any().downcast::<Person>().unwrap();
        assert_eq!(back.name, "x");
    }

    #[test]
    fn test_exact_upcast() {
        let up = Upcast::<Person>::exact();
        let mut boxed: Box<dyn Entity> = Box::new(Person { name: "x".into() });
        up.view_mut(boxed.as_mut()).unwrap().name.push('y');
        assert_eq!(up.view(boxed.as_ref()).unwrap().name, "xy");
        assert!(Upcast::<Invoice>::exact().view(boxed.as_ref()).is_none());
    }

    #[test]
    fn test_capability_upcast_macro() {
        let up: Upcast<dyn Named> = upcast!(Person => dyn Named);
        let mut boxed: Box<dyn Entity> = Box::new(Person { name: "ada".into() });
        up.view_mut(boxed.as_mut()).unwrap().rename("grace");
        assert_eq!(up.view(boxed.as_ref()).unwrap().name(), "grace");

        let other: Box<dyn Entity> = Box::new(Invoice);
        assert!(up.view(other.as_ref()).is_none());
    }

    #[test]
    fn test_universal_upcast() {
        let up = Upcast::<dyn Entity>::universal();
        let boxed: Box<dyn Entity> = Box::new(Invoice);
        let view = up.view(boxed.as_ref()).unwrap();
        assert_eq!(view.entity_type(), EntityType::of::<Invoice>());
        assert!(up.target().is_any());
    }
}
