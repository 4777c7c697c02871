//! Relating sequential compositions piece by piece.
//!
//! A [`BindGoal`] names two compositions `bind(t1, k1)` and `bind(t2, k2)`
//! together with a relation `ru` on the prefix results. Once registered on an
//! engine, the pair of composed trees is discharged by relating the prefixes
//! `t1` and `t2` under a leaf relation that asks for `ru(v1, v2)` and for the
//! continuations `k1 v1` and `k2 v2` to be related by the engine itself.
//!
//! The prefix search runs on the engine's budget. When it reaches a pair of
//! leaves after matching a step or effect pair, the continuations are related
//! with every hypothesis of the engine usable, the composed pair included;
//! otherwise only what was usable when the composed pair was met.

use std::collections::HashMap;
use std::rc::Rc;

use crate::closure::Closure;
use crate::engine::{unfold, Coinductive, Engine};
use crate::event::Event;
use crate::hypotheses::{pair_key, Guard, Hypotheses, Lookup, PairKey};
use crate::ops::Kleisli;
use crate::step_rel::{Skip, StepContext};
use crate::tree::Tree;
use crate::verdict::{Exhaustion, Mismatch, MismatchKind, Verdict};

/// Two compositions to be related through their prefixes.
pub struct BindGoal<E: Event, X, Y, A, B> {
    prefix_left: Tree<E, X>,
    prefix_right: Tree<E, Y>,
    prefix_rel: Rc<dyn Fn(&X, &Y) -> bool>,
    k_left: Kleisli<E, X, A>,
    k_right: Kleisli<E, Y, B>,
}

impl<E, X, Y, A, B> BindGoal<E, X, Y, A, B>
where
    E: Event,
    X: Clone + 'static,
    Y: Clone + 'static,
    A: 'static,
    B: 'static,
{
    pub fn new(
        t1: &Tree<E, X>,
        t2: &Tree<E, Y>,
        ru: impl Fn(&X, &Y) -> bool + 'static,
        k1: impl Fn(X) -> Tree<E, A> + 'static,
        k2: impl Fn(Y) -> Tree<E, B> + 'static,
    ) -> Self {
        BindGoal {
            prefix_left: t1.clone(),
            prefix_right: t2.clone(),
            prefix_rel: Rc::new(ru),
            k_left: Rc::new(k1),
            k_right: Rc::new(k2),
        }
    }

    /// The composed trees `bind(t1, k1)` and `bind(t2, k2)`.
    pub fn trees(&self) -> (Tree<E, A>, Tree<E, B>) {
        (
            self.prefix_left.bind_rc(Rc::clone(&self.k_left)),
            self.prefix_right.bind_rc(Rc::clone(&self.k_right)),
        )
    }
}

/// Discharges one registered composed pair through its [`BindGoal`].
pub struct BindClosure<E: Event, X, Y, A, B> {
    key: PairKey,
    goal: BindGoal<E, X, Y, A, B>,
}

impl<E, X, Y, A, B> Closure<E, A, B> for BindClosure<E, X, Y, A, B>
where
    E: Event,
    X: Clone + 'static,
    Y: Clone + 'static,
    A: 'static,
    B: 'static,
{
    fn name(&self) -> &'static str {
        "up-to-bind"
    }

    fn discharge(
        &self,
        engine: &mut Engine<E, A, B>,
        a: &Tree<E, A>,
        b: &Tree<E, B>,
        guard: Guard,
    ) -> Option<Verdict> {
        if pair_key(a, b) != self.key {
            return None;
        }
        let verdict = engine.nested(|engine| {
            let mut search = PrefixSearch {
                outer: engine,
                goal: &self.goal,
                entry: guard,
                hyps: Hypotheses::new(),
                refuted: HashMap::new(),
            };
            unfold(
                &mut search,
                &self.goal.prefix_left,
                &self.goal.prefix_right,
                Guard::NONE,
            )
        });
        Some(verdict)
    }
}

/// Relates the prefixes of a goal on the budget of the outer engine.
struct PrefixSearch<'e, E: Event, X, Y, A, B> {
    outer: &'e mut Engine<E, A, B>,
    goal: &'e BindGoal<E, X, Y, A, B>,
    /// Guard the composed pair was met at.
    entry: Guard,
    hyps: Hypotheses<E, X, Y>,
    refuted: HashMap<PairKey, Mismatch>,
}

impl<E, X, Y, A, B> StepContext<E, X, Y> for PrefixSearch<'_, E, X, Y, A, B>
where
    E: Event,
    X: Clone + 'static,
    Y: Clone + 'static,
    A: 'static,
    B: 'static,
{
    fn leaf(&mut self, v1: &X, v2: &Y, guard: Guard) -> Verdict {
        if !(self.goal.prefix_rel)(v1, v2) {
            return Verdict::fail(MismatchKind::Leaf);
        }
        let outer_guard = if guard.level() > 0 {
            self.outer.guarded()
        } else {
            self.entry
        };
        let left = (self.goal.k_left)(v1.clone());
        let right = (self.goal.k_right)(v2.clone());
        self.outer.relate(&left, &right, outer_guard)
    }

    fn cont(&mut self, a: &Tree<E, X>, b: &Tree<E, Y>) -> Verdict {
        let guard = self.hyps.guarded();
        unfold(self, a, b, guard)
    }

    fn max_skips(&self) -> usize {
        self.outer.config().max_skips
    }

    fn charge_skip(&mut self) -> Result<(), Exhaustion> {
        self.outer.charge_skip_step()
    }

    fn assumed(&mut self, a: &Tree<E, X>, b: &Tree<E, Y>, guard: Guard) -> bool {
        let usable = self.hyps.lookup(pair_key(a, b), guard) == Lookup::Usable;
        if usable {
            self.outer.note_hypothesis_hit();
        }
        usable
    }
}

impl<E, X, Y, A, B> Coinductive<E, X, Y> for PrefixSearch<'_, E, X, Y, A, B>
where
    E: Event,
    X: Clone + 'static,
    Y: Clone + 'static,
    A: 'static,
    B: 'static,
{
    fn skip(&self) -> Skip {
        self.outer.skip()
    }

    fn hypotheses(&mut self) -> &mut Hypotheses<E, X, Y> {
        &mut self.hyps
    }

    fn cached_failure(&mut self, key: PairKey) -> Option<Mismatch> {
        self.refuted.get(&key).cloned()
    }

    fn record_failure(&mut self, key: PairKey, mismatch: &Mismatch) {
        if self.outer.config().cache_failures {
            self.refuted.insert(key, mismatch.clone());
        }
    }

    fn charge(&mut self) -> Result<(), Exhaustion> {
        let depth = self.outer.depth();
        self.outer.charge_at(depth)
    }

    fn on_hypothesis_hit(&mut self) {
        self.outer.note_hypothesis_hit();
    }

    fn on_unguarded(&mut self, key: PairKey) {
        self.outer.note_unguarded(key);
    }
}

impl<E: Event, A: 'static, B: 'static> Engine<E, A, B> {
    /// Register `goal` and return its composed trees.
    ///
    /// Whenever this engine meets that pair of trees, the goal's prefix
    /// search is tried before the trees are unfolded.
    pub fn register_bind<X, Y>(&mut self, goal: BindGoal<E, X, Y, A, B>) -> (Tree<E, A>, Tree<E, B>)
    where
        X: Clone + 'static,
        Y: Clone + 'static,
    {
        let (left, right) = goal.trees();
        let key = pair_key(&left, &right);
        self.register_closure(Rc::new(BindClosure { key, goal }));
        (left, right)
    }

    /// Register `goal` and check its composed trees.
    pub fn check_bind<X, Y>(&mut self, goal: BindGoal<E, X, Y, A, B>) -> Verdict
    where
        X: Clone + 'static,
        Y: Clone + 'static,
    {
        let (left, right) = self.register_bind(goal);
        self.check(&left, &right)
    }
}

/// Weakly relate `bind(t1, k1)` and `bind(t2, k2)` through their prefixes,
/// comparing final results by equality.
pub fn bind_congruence<E, X, Y, R>(
    t1: &Tree<E, X>,
    t2: &Tree<E, Y>,
    ru: impl Fn(&X, &Y) -> bool + 'static,
    k1: impl Fn(X) -> Tree<E, R> + 'static,
    k2: impl Fn(Y) -> Tree<E, R> + 'static,
) -> Verdict
where
    E: Event,
    X: Clone + 'static,
    Y: Clone + 'static,
    R: PartialEq + 'static,
{
    let mut engine = Engine::new(Skip::WEAK, |a: &R, b: &R| a == b);
    engine.check_bind(BindGoal::new(t1, t2, ru, k1, k2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::unsync::OnceCell;

    #[derive(Clone, Debug, PartialEq)]
    struct Read;

    impl Event for Read {
        type Response = i32;

        fn responses(&self) -> Vec<i32> {
            vec![0, 1, 2]
        }
    }

    type T = Tree<Read, i32>;

    fn eq(a: &i32, b: &i32) -> bool {
        a == b
    }

    #[test]
    fn test_bind_congruence_through_silent_prefix_step() {
        let t1 = T::effect(Read, T::leaf);
        let t2 = T::step(t1.clone());
        let k = |v: i32| T::step(T::leaf(2 * v));
        assert!(bind_congruence(&t1, &t2, eq, k, k).holds());
    }

    #[test]
    fn test_prefix_relation_relates_different_results() {
        let t1 = T::effect(Read, T::leaf);
        let t2 = T::effect(Read, |v| T::leaf(v * 10));
        let k1 = |v: i32| T::leaf(v + 1);
        let k2 = |v: i32| T::leaf(v / 10 + 1);

        let mut engine = Engine::new(Skip::WEAK, eq);
        let goal = BindGoal::new(&t1, &t2, |x: &i32, y: &i32| x * 10 == *y, k1, k2);
        assert!(engine.check_bind(goal).holds());
        assert_eq!(engine.stats().closure_hits, 1);
    }

    #[test]
    fn test_wrong_prefix_relation_falls_back_to_unfolding() {
        let t = T::effect(Read, T::leaf);
        let k = |v: i32| T::leaf(v);

        let mut engine = Engine::new(Skip::STRONG, eq);
        let goal = BindGoal::new(&t, &t, |_: &i32, _: &i32| false, k, k);
        assert!(engine.check_bind(goal).holds());
        assert_eq!(engine.stats().closure_hits, 0);
    }

    #[test]
    fn test_guarded_prefix_makes_outer_hypotheses_usable() {
        let left_slot: Rc<OnceCell<T>> = Rc::new(OnceCell::new());
        let right_slot: Rc<OnceCell<T>> = Rc::new(OnceCell::new());
        let back_to = |slot: &Rc<OnceCell<T>>| {
            let slot = Rc::clone(slot);
            move |_: i32| slot.get().cloned().unwrap_or_else(|| T::leaf(-1))
        };

        let prefix = T::step(T::leaf(0));
        let mut engine = Engine::new(Skip::STRONG, eq);
        let (left, right) = engine.register_bind(BindGoal::new(
            &prefix,
            &prefix,
            eq,
            back_to(&left_slot),
            back_to(&right_slot),
        ));
        assert!(left_slot.set(left.clone()).is_ok());
        assert!(right_slot.set(right.clone()).is_ok());

        assert!(engine.check(&left, &right).holds());
        assert_eq!(engine.stats().closure_hits, 1);
        assert_eq!(engine.stats().unguarded_rejections, 0);
        assert!(engine.stats().hypothesis_hits >= 1);
    }

    #[test]
    fn test_prefix_search_counts_against_depth_limit() {
        let t1 = T::effect(Read, T::leaf);
        let t2 = T::step(t1.clone());
        let k = |v: i32| T::leaf(v + 1);

        let config = crate::config::EngineConfig::default().with_max_depth(1);
        let mut engine = Engine::with_config(Skip::WEAK, eq, config);
        assert!(engine.check_bind(BindGoal::new(&t1, &t2, eq, k, k)).holds());
        assert_eq!(engine.stats().closure_hits, 0);

        let mut engine = Engine::new(Skip::WEAK, eq);
        assert!(engine.check_bind(BindGoal::new(&t1, &t2, eq, k, k)).holds());
        assert_eq!(engine.stats().closure_hits, 1);
    }

    #[test]
    fn test_prefix_mismatch_is_not_accepted() {
        let t1 = T::effect(Read, T::leaf);
        let t2 = T::leaf(0);
        let k = |v: i32| T::leaf(v);
        let v = bind_congruence(&t1, &t2, eq, k, k);
        assert!(v.fails());
    }
}
