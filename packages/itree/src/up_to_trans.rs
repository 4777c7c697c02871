//! Closing pairs up to strong equivalence.
//!
//! `(a, c)` is discharged when a usable hypothesis `(a', c')` has `a'`
//! strongly equivalent to `a` and `c'` strongly equivalent to `c`. Strong
//! equivalence is checked by a separate strong engine with its own budget,
//! so the outer search only pays for the hypotheses it inspects.

use std::marker::PhantomData;

use crate::closure::Closure;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::event::Event;
use crate::hypotheses::Guard;
use crate::step_rel::Skip;
use crate::tree::Tree;
use crate::verdict::Verdict;

pub struct TransClosure<E, A, B> {
    _marker: PhantomData<fn() -> (E, A, B)>,
}

impl<E, A, B> TransClosure<E, A, B> {
    pub fn new() -> Self {
        TransClosure {
            _marker: PhantomData,
        }
    }
}

impl<E, A, B> Default for TransClosure<E, A, B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Strong equivalence under equality of results, on a budget of its own.
///
/// Handles to one node are equivalent without a search.
fn strongly_equivalent<E, R>(x: &Tree<E, R>, y: &Tree<E, R>, config: &EngineConfig) -> bool
where
    E: Event,
    R: PartialEq + 'static,
{
    if x.resolved_id() == y.resolved_id() {
        return true;
    }
    let config = config.clone().with_max_unfoldings(config.trans_fuel);
    Engine::with_config(Skip::STRONG, |a: &R, b: &R| a == b, config)
        .check(x, y)
        .holds()
}

impl<E, A, B> Closure<E, A, B> for TransClosure<E, A, B>
where
    E: Event,
    A: PartialEq + 'static,
    B: PartialEq + 'static,
{
    fn name(&self) -> &'static str {
        "up-to-trans"
    }

    fn discharge(
        &self,
        engine: &mut Engine<E, A, B>,
        a: &Tree<E, A>,
        c: &Tree<E, B>,
        guard: Guard,
    ) -> Option<Verdict> {
        let candidates = engine.usable_hypotheses(guard);
        if candidates.is_empty() {
            return None;
        }
        let config = engine.config().clone();
        candidates
            .iter()
            .any(|(a2, c2)| strongly_equivalent(a2, a, &config) && strongly_equivalent(c2, c, &config))
            .then_some(Verdict::Holds)
    }
}
