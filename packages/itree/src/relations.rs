//! Strong equivalence, weak equivalence and refinement.
//!
//! Each relation is the engine instantiated with one set of skip flags:
//!
//! | relation | unmatched silent steps allowed on |
//! |---|---|
//! | strong | neither side |
//! | weak | either side |
//! | refinement | the right side only |
//!
//! The plain forms compare results by equality, `_by` forms take a leaf
//! relation between possibly different result types, and `_with` forms take
//! explicit budgets.
//!
//! Under the default budget a check gives up after 100 000 unfoldings and
//! unmatched silent steps together, so finite trees longer than that come
//! back undetermined unless `max_unfoldings` is raised.

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::event::Event;
use crate::step_rel::Skip;
use crate::tree::Tree;
use crate::verdict::Verdict;

fn relate_by<E, A, B>(
    skip: Skip,
    a: &Tree<E, A>,
    b: &Tree<E, B>,
    rr: impl Fn(&A, &B) -> bool + 'static,
    config: EngineConfig,
) -> Verdict
where
    E: Event,
    A: 'static,
    B: 'static,
{
    Engine::with_config(skip, rr, config).check(a, b)
}

fn equal<R: PartialEq>(a: &R, b: &R) -> bool {
    a == b
}

/// Step-for-step equivalence.
pub fn strong_eq<E: Event, R: PartialEq + 'static>(a: &Tree<E, R>, b: &Tree<E, R>) -> Verdict {
    strong_eq_with(a, b, EngineConfig::default())
}

pub fn strong_eq_by<E, A, B>(a: &Tree<E, A>, b: &Tree<E, B>, rr: impl Fn(&A, &B) -> bool + 'static) -> Verdict
where
    E: Event,
    A: 'static,
    B: 'static,
{
    relate_by(Skip::STRONG, a, b, rr, EngineConfig::default())
}

pub fn strong_eq_with<E: Event, R: PartialEq + 'static>(
    a: &Tree<E, R>,
    b: &Tree<E, R>,
    config: EngineConfig,
) -> Verdict {
    relate_by(Skip::STRONG, a, b, equal::<R>, config)
}

/// Equivalence up to finite runs of silent steps.
///
/// Two divergent trees are weakly equivalent; a tree that stops or interacts
/// is not weakly equivalent to one that diverges.
pub fn weak_eq<E: Event, R: PartialEq + 'static>(a: &Tree<E, R>, b: &Tree<E, R>) -> Verdict {
    weak_eq_with(a, b, EngineConfig::default())
}

pub fn weak_eq_by<E, A, B>(a: &Tree<E, A>, b: &Tree<E, B>, rr: impl Fn(&A, &B) -> bool + 'static) -> Verdict
where
    E: Event,
    A: 'static,
    B: 'static,
{
    relate_by(Skip::WEAK, a, b, rr, EngineConfig::default())
}

pub fn weak_eq_with<E: Event, R: PartialEq + 'static>(
    a: &Tree<E, R>,
    b: &Tree<E, R>,
    config: EngineConfig,
) -> Verdict {
    relate_by(Skip::WEAK, a, b, equal::<R>, config)
}

/// `a` refines `b`: `b` may take silent steps `a` does not, never the
/// other way round.
pub fn refines<E: Event, R: PartialEq + 'static>(a: &Tree<E, R>, b: &Tree<E, R>) -> Verdict {
    refines_with(a, b, EngineConfig::default())
}

pub fn refines_by<E, A, B>(a: &Tree<E, A>, b: &Tree<E, B>, rr: impl Fn(&A, &B) -> bool + 'static) -> Verdict
where
    E: Event,
    A: 'static,
    B: 'static,
{
    relate_by(Skip::REFINE, a, b, rr, EngineConfig::default())
}

pub fn refines_with<E: Event, R: PartialEq + 'static>(
    a: &Tree<E, R>,
    b: &Tree<E, R>,
    config: EngineConfig,
) -> Verdict {
    relate_by(Skip::REFINE, a, b, equal::<R>, config)
}
