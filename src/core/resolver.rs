//! # Type resolver - concrete type + phase → ordered callback list.
//!
//! ```text
//! registrations(phase)
//!     │ keep bound == T, bound ∈ declared supertypes(T), bound == dyn Entity
//!     ▼
//! sort by (specificity, order, seq)
//!     │   specificity: exact 0 < declared depth < universal
//!     ▼
//! [cb1, cb2, ...]   (empty = pass-through)
//! ```
//!
//! Every registration has a distinct `seq`, so the sort key is total and the
//! result is deterministic.

use std::sync::Arc;

use crate::core::registry::Registration;
use crate::entity::{EntityType, Specificity, TypeHierarchy};

/// Resolves the ordered list of registrations applying to `concrete`.
pub(crate) fn resolve(
    types: &TypeHierarchy,
    registrations: &[Arc<Registration>],
    concrete: EntityType,
) -> Vec<Arc<Registration>> {
    let mut ranked: Vec<(Specificity, &Arc<Registration>)> = registrations
        .iter()
        .filter_map(|r| types.specificity(concrete, r.bound()).map(|s| (s, r)))
        .collect();

    ranked.sort_by_key(|(rank, r)| (*rank, r.order(), r.seq()));
    ranked.into_iter().map(|(_, r)| Arc::clone(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{Callback, NotifyFn};
    use crate::core::{Order, Phase, Registry};
    use crate::entity::Entity;
    use crate::upcast;

    trait Base: Send + Sync + 'static {}

    #[derive(Debug)]
    struct Derived;
    impl Entity for Derived {}
    impl Base for Derived {}

    #[derive(Debug)]
    struct Unrelated;
    impl Entity for Unrelated {}

    fn noop(name: &'static str) -> Callback {
        Callback::notifying(NotifyFn::universal(name, |_: &dyn Entity, _| Ok(())))
    }

    fn names(regs: &[Arc<Registration>]) -> Vec<String> {
        regs.iter().map(|r| r.name().to_string()).collect()
    }

    fn hierarchy() -> Arc<TypeHierarchy> {
        let mut types = TypeHierarchy::new();
        types
            .declare::<Derived>()
            .extends(upcast!(Derived => dyn Base))
            .unwrap();
        Arc::new(types)
    }

    #[test]
    fn test_specificity_beats_order() {
        let mut reg = Registry::new(hierarchy());
        let p = Phase::BeforeConvert;
        reg.register(p, EntityType::any(), Order(-100), noop("any")).unwrap();
        reg.register(p, EntityType::of::<dyn Base>(), Order(5), noop("A")).unwrap();
        reg.register(p, EntityType::of::<Derived>(), Order(1), noop("B")).unwrap();

        let out = reg.lookup(p, EntityType::of::<Derived>());
        assert_eq!(names(&out), vec!["B", "A", "any"]);
    }

    #[test]
    fn test_order_then_sequence() {
        let mut reg = Registry::new(hierarchy());
        let p = Phase::BeforeSave;
        reg.register(p, EntityType::of::<Derived>(), Order(20), noop("late")).unwrap();
        reg.register(p, EntityType::of::<Derived>(), Order::default(), noop("last-1")).unwrap();
        reg.register(p, EntityType::of::<Derived>(), Order(10), noop("early")).unwrap();
        reg.register(p, EntityType::of::<Derived>(), Order::default(), noop("last-2")).unwrap();

        let out = reg.lookup(p, EntityType::of::<Derived>());
        assert_eq!(names(&out), vec!["early", "late", "last-1", "last-2"]);
    }

    #[test]
    fn test_unrelated_bounds_are_filtered() {
        let mut reg = Registry::new(hierarchy());
        let p = Phase::AfterSave;
        reg.register(p, EntityType::of::<dyn Base>(), Order::default(), noop("base")).unwrap();
        reg.register(p, EntityType::of::<Derived>(), Order::default(), noop("derived")).unwrap();

        assert!(reg.lookup(p, EntityType::of::<Unrelated>()).is_empty());
        assert!(reg.lookup(Phase::AfterLoad, EntityType::of::<Derived>()).is_empty());
    }
}
