//! # Callback registry - phase-indexed bindings.
//!
//! The registry stores every [`Registration`] under its [`Phase`]. It is a plain
//! value: the [`InvocationChain`](crate::InvocationChain) keeps it behind an
//! `Arc` and swaps in a modified copy on every change, so a chain that already
//! resolved its callbacks keeps the set it started with.
//!
//! ## Architecture
//! ```text
//! register(phase, bound, order, cb) ──► phases[phase].push(Registration{.., seq})
//! lookup(phase, concrete)          ──► resolver::resolve(types, phases[phase], concrete)
//! ```
//!
//! ## Rules
//! - A callback's identity is its name; one name per phase.
//! - A typed callback's registration bound must imply its view bound.
//! - `seq` grows monotonically across phases and never repeats, even after `unregister`.
//! - Registrations are immutable once stored.

use std::fmt;
use std::sync::Arc;

use crate::callbacks::Callback;
use crate::core::phase::Phase;
use crate::core::resolver;
use crate::entity::{EntityType, TypeHierarchy};
use crate::error::RegistryError;

/// Explicit callback order; lower runs first.
///
/// The default is [`Order::LOWEST`] (runs after every explicitly ordered callback).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Order(pub i32);

impl Order {
    pub const HIGHEST: Order = Order(i32::MIN);
    pub const LOWEST: Order = Order(i32::MAX);

    #[inline]
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for Order {
    fn default() -> Self {
        Order::LOWEST
    }
}

impl From<i32> for Order {
    fn from(v: i32) -> Self {
        Order(v)
    }
}

/// A callback bound to a phase and a type bound.
pub struct Registration {
    phase: Phase,
    bound: EntityType,
    order: Order,
    seq: u64,
    callback: Callback,
}

impl Registration {
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Type bound the callback accepts.
    #[inline]
    pub fn bound(&self) -> EntityType {
        self.bound
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    /// Registration sequence number (tie-breaker).
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.callback.name()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("phase", &self.phase)
            .field("bound", &self.bound)
            .field("order", &self.order.0)
            .field("seq", &self.seq)
            .field("callback", &self.callback)
            .finish()
    }
}

/// Phase-indexed set of callback registrations.
#[derive(Clone)]
pub struct Registry {
    types: Arc<TypeHierarchy>,
    phases: [Vec<Arc<Registration>>; 5],
    next_seq: u64,
}

impl Registry {
    /// Creates an empty registry over a frozen type hierarchy.
    pub fn new(types: Arc<TypeHierarchy>) -> Self {
        Self {
            types,
            phases: Default::default(),
            next_seq: 0,
        }
    }

    /// Binds `callback` to `phase` for entities matching `bound`.
    ///
    /// Returns the registration sequence number.
    ///
    /// # Errors
    /// - [`RegistryError::DuplicateBinding`] when a callback with the same name is
    ///   already bound to `phase`.
    /// - [`RegistryError::BoundMismatch`] when some entity matching `bound` could
    ///   not be viewed as the callback's own typed bound.
    pub fn register(
        &mut self,
        phase: Phase,
        bound: EntityType,
        order: Order,
        callback: Callback,
    ) -> Result<u64, RegistryError> {
        if let Some(declared) = callback.view_bound() {
            // Every entity matching `bound` must reach `declared`.
            if !self.types.is_subtype(bound, declared) {
                return Err(RegistryError::BoundMismatch {
                    callback: callback.name().to_string(),
                    declared,
                    registered: bound,
                });
            }
        }

        let slot = &mut self.phases[phase.index()];
        if slot.iter().any(|r| r.name() == callback.name()) {
            return Err(RegistryError::DuplicateBinding {
                phase,
                callback: callback.name().to_string(),
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        slot.push(Arc::new(Registration {
            phase,
            bound,
            order,
            seq,
            callback,
        }));
        Ok(seq)
    }

    /// Removes the binding named `name` from `phase`; returns whether it existed.
    pub fn unregister(&mut self, phase: Phase, name: &str) -> bool {
        let slot = &mut self.phases[phase.index()];
        let before = slot.len();
        slot.retain(|r| r.name() != name);
        slot.len() != before
    }

    /// Ordered callbacks that apply to `concrete` at `phase`.
    pub fn lookup(&self, phase: Phase, concrete: EntityType) -> Vec<Arc<Registration>> {
        resolver::resolve(&self.types, &self.phases[phase.index()], concrete)
    }

    /// All registrations of `phase`, in registration order.
    pub fn registrations(&self, phase: Phase) -> &[Arc<Registration>] {
        &self.phases[phase.index()]
    }

    pub fn types(&self) -> &Arc<TypeHierarchy> {
        &self.types
    }

    /// Total number of registrations across phases.
    pub fn len(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        for phase in Phase::ALL {
            m.entry(&phase.as_label(), &self.phases[phase.index()].len());
        }
        m.finish()
    }
}
