//! # Explicit type hierarchy used by the type resolver.
//!
//! Rust has no class inheritance, so "supertype of T" is declared once at bootstrap:
//! each concrete entity type lists the capabilities (trait objects) it satisfies,
//! with the depth at which they sit and the [`Upcast`] that produces the typed view.
//!
//! ```text
//! Person ──depth 1──► dyn Named
//!        ──depth 2──► dyn Auditable
//!        ──  MAX  ──► dyn Entity      (implicit, every entity)
//! ```
//!
//! ## Rules
//! - Exact match has specificity `0`; declared supertypes use their depth (`>= 1`).
//! - The universal bound has the lowest specificity.
//! - Declaring the same supertype twice for one concrete type is a
//!   [`RegistryError::ResolutionAmbiguity`]; so is declaring a type as its own supertype.
//! - The hierarchy is frozen once handed to a [`Lifecycle`](crate::Lifecycle).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::types::{Entity, EntityType, Upcast};
use crate::error::RegistryError;

/// Rank of a type bound relative to a concrete type; lower is more specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity(u32);

impl Specificity {
    /// Bound equals the concrete type.
    pub const EXACT: Specificity = Specificity(0);
    /// Universal bound (`dyn Entity`).
    pub const UNIVERSAL: Specificity = Specificity(u32::MAX);

    /// Declared supertype distance (clamped to `1..u32::MAX`).
    pub fn depth(depth: u32) -> Self {
        Specificity(depth.clamp(1, u32::MAX - 1))
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// One declared supertype of a concrete entity type.
#[derive(Clone)]
struct Supertype {
    ty: EntityType,
    specificity: Specificity,
    /// Type-erased `Upcast<C>` for `C = ty`.
    upcast: Arc<dyn Any + Send + Sync>,
}

/// Declared supertypes per concrete entity type.
#[derive(Clone, Default)]
pub struct TypeHierarchy {
    decls: HashMap<TypeId, Vec<Supertype>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts declaring supertypes of the concrete entity type `T`.
    pub fn declare<T: Entity>(&mut self) -> TypeDecl<'_, T> {
        TypeDecl {
            types: self,
            _marker: PhantomData,
        }
    }

    /// Specificity of `bound` for an entity of type `concrete`, or `None` when unrelated.
    pub fn specificity(&self, concrete: EntityType, bound: EntityType) -> Option<Specificity> {
        if bound == concrete {
            return Some(Specificity::EXACT);
        }
        if bound.is_any() {
            return Some(Specificity::UNIVERSAL);
        }
        self.decls
            .get(&concrete.id())?
            .iter()
            .find(|s| s.ty == bound)
            .map(|s| s.specificity)
    }

    /// Declared supertypes of `concrete`, most specific first.
    pub fn supertypes(&self, concrete: EntityType) -> Vec<(EntityType, Specificity)> {
        let mut out: Vec<(EntityType, Specificity)> = self
            .decls
            .get(&concrete.id())
            .map(|v| v.iter().map(|s| (s.ty, s.specificity)).collect())
            .unwrap_or_default();
        out.sort_by_key(|(_, s)| *s);
        out
    }

    /// Returns true when `concrete` is `bound`, declares it, or `bound` is universal.
    #[inline]
    pub fn is_subtype(&self, concrete: EntityType, bound: EntityType) -> bool {
        self.specificity(concrete, bound).is_some()
    }

    /// Casting functions from `concrete` to the declared capability `C`.
    pub fn upcast<C: ?Sized + 'static>(&self, concrete: EntityType) -> Option<Upcast<C>> {
        let target = EntityType::of::<C>();
        self.decls
            .get(&concrete.id())?
            .iter()
            .find(|s| s.ty == target)
            .and_then(|s| s.upcast.downcast_ref::<Upcast<C>>().copied())
    }

    /// Number of concrete types with declarations.
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    fn insert<C: ?Sized + 'static>(
        &mut self,
        concrete: EntityType,
        depth: u32,
        upcast: Upcast<C>,
    ) -> Result<(), RegistryError> {
        let target = upcast.target();
        if target == concrete || target.is_any() {
            return Err(RegistryError::ResolutionAmbiguity {
                entity_type: concrete,
                supertype: target,
                reason: "bound already has a fixed specificity",
            });
        }

        let entry = self.decls.entry(concrete.id()).or_default();
        if entry.iter().any(|s| s.ty == target) {
            return Err(RegistryError::ResolutionAmbiguity {
                entity_type: concrete,
                supertype: target,
                reason: "supertype declared more than once",
            });
        }
        entry.push(Supertype {
            ty: target,
            specificity: Specificity::depth(depth),
            upcast: Arc::new(upcast),
        });
        Ok(())
    }
}

/// Builder for the supertypes of one concrete type; see [`TypeHierarchy::declare`].
///
/// ```
/// use hookvisor::{upcast, Entity, EntityType, TypeHierarchy};
///
/// trait Named: Send + Sync + 'static {}
/// trait Auditable: Send + Sync + 'static {}
///
/// #[derive(Debug)]
/// struct Person;
/// impl Entity for Person {}
/// impl Named for Person {}
/// impl Auditable for Person {}
///
/// let mut types = TypeHierarchy::new();
/// types
///     .declare::<Person>()
///     .extends(upcast!(Person => dyn Named))?
///     .extends_at(2, upcast!(Person => dyn Auditable))?;
///
/// let person = EntityType::of::<Person>();
/// assert!(types.specificity(person, EntityType::of::<dyn Named>())
///     < types.specificity(person, EntityType::of::<dyn Auditable>()));
/// # Ok::<(), hookvisor::RegistryError>(())
/// ```
pub struct TypeDecl<'a, T: Entity> {
    types: &'a mut TypeHierarchy,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> TypeDecl<'a, T> {
    /// Declares a direct supertype (depth 1).
    pub fn extends<C: ?Sized + 'static>(self, upcast: Upcast<C>) -> Result<Self, RegistryError> {
        self.extends_at(1, upcast)
    }

    /// Declares a supertype at the given depth (`1` = direct parent).
    pub fn extends_at<C: ?Sized + 'static>(
        self,
        depth: u32,
        upcast: Upcast<C>,
    ) -> Result<Self, RegistryError> {
        self.types.insert(EntityType::of::<T>(), depth, upcast)?;
        Ok(self)
    }
}
