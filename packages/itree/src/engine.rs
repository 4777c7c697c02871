//! Guarded greatest-fixpoint search.
//!
//! The engine relates two trees by unfolding them pair by pair with the
//! [`step_rel`] rule. Every pair being unfolded is pushed on a hypothesis
//! stack; meeting it again below a matched step or effect pair closes the
//! loop. Registered [`Closure`]s are tried before a pair is unfolded.
//!
//! Unfolding runs on an explicit stack of frames, so the length of a
//! comparison is bounded by the unfolding budget alone. The native stack only
//! grows when a closure starts a search of its own.
//!
//! Two entry points share that machinery:
//!
//! - [`Engine::check`] searches for a relation containing one pair.
//! - [`Engine::claim`] and [`Engine::prove`] verify a candidate relation
//!   given as a set of claimed pairs.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::closure::Closure;
use crate::config::EngineConfig;
use crate::eqv_trace;
use crate::error::ProofError;
use crate::event::Event;
use crate::hypotheses::{pair_key, Guard, Hypotheses, Lookup, PairKey};
use crate::ids::ClaimId;
use crate::step_rel::{behind_skips, expand, step_rel, Below, Expansion, Skip, StepContext};
use crate::tree::Tree;
use crate::up_to_trans::TransClosure;
use crate::verdict::{Exhaustion, Mismatch, MismatchKind, Side, Verdict};

/// Leaf relation of an engine.
pub type LeafRel<A, B> = Rc<dyn Fn(&A, &B) -> bool>;

/// Unfolding budget, shared by an engine and the searches it nests.
#[derive(Clone, Debug)]
pub(crate) struct Fuel(Rc<Cell<usize>>);

impl Fuel {
    pub(crate) fn new(amount: usize) -> Self {
        Fuel(Rc::new(Cell::new(amount)))
    }

    pub(crate) fn charge(&self) -> bool {
        match self.0.get() {
            0 => false,
            n => {
                self.0.set(n - 1);
                true
            }
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.0.get()
    }
}

/// Counters for the most recent check or proof.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub unfoldings: usize,
    /// Unmatched silent steps; each one is paid from the unfolding budget.
    pub skips: usize,
    pub hypothesis_hits: usize,
    pub closure_hits: usize,
    pub cached_failures: usize,
    pub unguarded_rejections: usize,
}

/// How a claim is verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Discharge {
    /// Unfold one level, then close against the claims.
    #[default]
    Unfold,
    /// Close against the claims without unfolding. Never guarded.
    Hypothesis,
}

struct Claim<E: Event, A, B> {
    left: Tree<E, A>,
    right: Tree<E, B>,
    discharge: Discharge,
}

impl<E: Event, A, B> Clone for Claim<E, A, B> {
    fn clone(&self) -> Self {
        Claim {
            left: self.left.clone(),
            right: self.right.clone(),
            discharge: self.discharge,
        }
    }
}

/// Evidence that every claim lies in the relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    pub proved: Vec<ClaimId>,
    pub stats: EngineStats,
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} claim(s) proved in {} unfolding(s)",
            self.proved.len(),
            self.stats.unfoldings
        )
    }
}

/// A coinductive search over one hypothesis stack.
///
/// Implemented by [`Engine`] and by the nested searches closures run on the
/// engine's budget; [`unfold`] is the loop both share.
pub(crate) trait Coinductive<E: Event, A, B>: StepContext<E, A, B> {
    fn skip(&self) -> Skip;
    fn hypotheses(&mut self) -> &mut Hypotheses<E, A, B>;
    fn cached_failure(&mut self, key: PairKey) -> Option<Mismatch>;
    fn record_failure(&mut self, key: PairKey, mismatch: &Mismatch);
    /// Pay for one unfolding, or say which budget ran out.
    fn charge(&mut self) -> Result<(), Exhaustion>;
    fn on_hypothesis_hit(&mut self);
    fn on_unguarded(&mut self, key: PairKey);

    fn try_closures(&mut self, _a: &Tree<E, A>, _b: &Tree<E, B>, _guard: Guard) -> Option<Verdict> {
        None
    }
}

/// A pair whose outer shapes matched, waiting on the pairs below it.
struct Frame<E: Event, A, B> {
    key: PairKey,
    /// Stack height before the pair was pushed.
    base: usize,
    skipped: Vec<Side>,
    below: Below<E, A, B>,
    verdict: Verdict,
}

enum Entered<E: Event, A, B> {
    Done(Verdict),
    Open(Frame<E, A, B>),
}

/// Relate `a` and `b` at `guard`.
///
/// For each pair, in order: usable hypothesis, cached refutation, budget,
/// then the pair is pushed and discharged by a closure or expanded by the
/// generator. Pairs below a matched step or effect pair are related at the
/// guard of the full stack, depth first. Unguarded hits are reported and
/// never accepted.
pub(crate) fn unfold<E, A, B, C>(cx: &mut C, a: &Tree<E, A>, b: &Tree<E, B>, guard: Guard) -> Verdict
where
    E: Event,
    C: Coinductive<E, A, B>,
{
    let mut frames: Vec<Frame<E, A, B>> = Vec::new();
    let (mut a, mut b, mut guard) = (a.clone(), b.clone(), guard);
    loop {
        let mut verdict = match enter(cx, &a, &b, guard) {
            Entered::Done(verdict) => verdict,
            Entered::Open(frame) => {
                frames.push(frame);
                Verdict::Holds
            }
        };
        // Hand the verdict up until some frame has another pair to relate.
        loop {
            let Some(mut frame) = frames.pop() else {
                return verdict;
            };
            let outcome = frame.below.attribute(verdict);
            frame.verdict = std::mem::replace(&mut frame.verdict, Verdict::Holds).and(|| outcome);
            if !frame.verdict.fails() {
                if let Some((x, y)) = frame.below.next_pair() {
                    frames.push(frame);
                    (a, b, guard) = (x, y, cx.hypotheses().guarded());
                    break;
                }
            }
            let outcome = behind_skips(frame.below.close(frame.verdict), &frame.skipped);
            verdict = settle::<E, A, B, C>(cx, frame.key, frame.base, outcome);
        }
    }
}

fn enter<E, A, B, C>(cx: &mut C, a: &Tree<E, A>, b: &Tree<E, B>, guard: Guard) -> Entered<E, A, B>
where
    E: Event,
    C: Coinductive<E, A, B>,
{
    let key = pair_key(a, b);
    match cx.hypotheses().lookup(key, guard) {
        Lookup::Usable => {
            cx.on_hypothesis_hit();
            return Entered::Done(Verdict::Holds);
        }
        Lookup::Unguarded => cx.on_unguarded(key),
        Lookup::Absent => {}
    }

    if let Some(mismatch) = cx.cached_failure(key) {
        return Entered::Done(Verdict::Fails(mismatch));
    }
    if let Err(why) = cx.charge() {
        return Entered::Done(Verdict::Undetermined(why));
    }

    let base = cx.hypotheses().len();
    cx.hypotheses().push(key, a.clone(), b.clone());
    if let Some(verdict) = cx.try_closures(a, b, guard) {
        return Entered::Done(settle::<E, A, B, C>(cx, key, base, verdict));
    }
    let skip = cx.skip();
    match expand(skip, a, b, guard, cx) {
        (skipped, Expansion::Done(verdict)) => {
            Entered::Done(settle::<E, A, B, C>(cx, key, base, behind_skips(verdict, &skipped)))
        }
        (skipped, Expansion::Below(below)) => Entered::Open(Frame {
            key,
            base,
            skipped,
            below,
            verdict: Verdict::Holds,
        }),
    }
}

/// Pop the pair and remember it if it was refuted.
fn settle<E, A, B, C>(cx: &mut C, key: PairKey, base: usize, verdict: Verdict) -> Verdict
where
    E: Event,
    C: Coinductive<E, A, B>,
{
    cx.hypotheses().truncate(base);
    if let Verdict::Fails(mismatch) = &verdict {
        cx.record_failure(key, mismatch);
    }
    verdict
}

/// Decides relations between trees over events `E` with results `A` and `B`.
pub struct Engine<E: Event, A, B> {
    skip: Skip,
    leaf_rel: LeafRel<A, B>,
    config: EngineConfig,
    fuel: Fuel,
    hyps: Hypotheses<E, A, B>,
    refuted: HashMap<PairKey, Mismatch>,
    closures: Vec<Rc<dyn Closure<E, A, B>>>,
    claims: Vec<Claim<E, A, B>>,
    stats: EngineStats,
    /// First unguarded attempt since the last reset.
    unguarded: Option<PairKey>,
    /// Searches started by closures and still running on this engine.
    nesting: usize,
}

impl<E: Event, A: 'static, B: 'static> Engine<E, A, B> {
    pub fn new(skip: Skip, leaf_rel: impl Fn(&A, &B) -> bool + 'static) -> Self {
        Self::with_config(skip, leaf_rel, EngineConfig::default())
    }

    pub fn with_config(
        skip: Skip,
        leaf_rel: impl Fn(&A, &B) -> bool + 'static,
        config: EngineConfig,
    ) -> Self {
        let fuel = Fuel::new(config.max_unfoldings);
        Engine {
            skip,
            leaf_rel: Rc::new(leaf_rel),
            config,
            fuel,
            hyps: Hypotheses::new(),
            refuted: HashMap::new(),
            closures: Vec::new(),
            claims: Vec::new(),
            stats: EngineStats::default(),
            unguarded: None,
            nesting: 0,
        }
    }

    /// Register a closure, tried in registration order.
    pub fn register_closure(&mut self, closure: Rc<dyn Closure<E, A, B>>) {
        self.closures.push(closure);
    }

    pub fn with_closure(mut self, closure: Rc<dyn Closure<E, A, B>>) -> Self {
        self.register_closure(closure);
        self
    }

    /// Relate `a` and `b`: the search for a relation containing them starts
    /// from an empty hypothesis stack and a full budget.
    pub fn check(&mut self, a: &Tree<E, A>, b: &Tree<E, B>) -> Verdict {
        self.reset();
        let verdict = self.relate(a, b, Guard::NONE);
        self.hyps.clear();

        log::debug!(
            "{} check {} ~ {}: {} ({} unfoldings, {} hypothesis hits, {} closure hits)",
            relation_name(self.skip),
            a.id(),
            b.id(),
            verdict,
            self.stats.unfoldings,
            self.stats.hypothesis_hits,
            self.stats.closure_hits,
        );
        verdict
    }

    /// Relate `a` and `b` inside the current search.
    ///
    /// This is the recursion closures use; hypotheses usable under `guard`
    /// may close the pair.
    pub fn relate(&mut self, a: &Tree<E, A>, b: &Tree<E, B>, guard: Guard) -> Verdict {
        unfold(self, a, b, guard)
    }

    /// Add a pair to the candidate relation verified by [`Engine::prove`].
    pub fn claim(&mut self, a: &Tree<E, A>, b: &Tree<E, B>) -> ClaimId {
        self.claim_with(a, b, Discharge::Unfold)
    }

    pub fn claim_with(&mut self, a: &Tree<E, A>, b: &Tree<E, B>, discharge: Discharge) -> ClaimId {
        let id = ClaimId::from_index(self.claims.len());
        self.claims.push(Claim {
            left: a.clone(),
            right: b.clone(),
            discharge,
        });
        id
    }

    pub fn clear_claims(&mut self) {
        self.claims.clear();
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// Verify that the claims form a relation closed under the generator.
    ///
    /// All claims are checked even when an earlier one fails; the first
    /// failure is returned.
    pub fn prove(&mut self) -> Result<Certificate, ProofError> {
        if self.claims.is_empty() {
            return Err(ProofError::NoClaims);
        }
        let proved = self
            .prove_each()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Certificate {
            proved,
            stats: self.stats,
        })
    }

    /// Verify every claim, one outcome per claim in claim order.
    pub fn prove_each(&mut self) -> Vec<Result<ClaimId, ProofError>> {
        self.reset();
        let claims = self.claims.clone();
        for claim in &claims {
            self.hyps
                .push(pair_key(&claim.left, &claim.right), claim.left.clone(), claim.right.clone());
        }
        let base = self.hyps.len();

        let mut outcomes = Vec::with_capacity(claims.len());
        for (index, claim) in claims.iter().enumerate() {
            let id = ClaimId::from_index(index);
            self.unguarded = None;
            let outcome = match claim.discharge {
                Discharge::Hypothesis => {
                    let key = pair_key(&claim.left, &claim.right);
                    self.on_unguarded(key);
                    Err(ProofError::unguarded(id, key.0, key.1))
                }
                Discharge::Unfold => {
                    let verdict = step_rel(self.skip, &claim.left, &claim.right, Guard::NONE, self);
                    self.hyps.truncate(base);
                    self.claim_outcome(id, verdict)
                }
            };
            if let Err(err) = &outcome {
                log::warn!("{err}");
            }
            outcomes.push(outcome);
        }

        self.hyps.clear();
        log::debug!(
            "{} proof of {} claim(s): {} unfoldings",
            relation_name(self.skip),
            claims.len(),
            self.stats.unfoldings
        );
        outcomes
    }

    /// A refutation stands whatever hypotheses were rejected on the way;
    /// giving up is blamed on a rejected unguarded hypothesis when there was one.
    fn claim_outcome(&self, id: ClaimId, verdict: Verdict) -> Result<ClaimId, ProofError> {
        match (verdict, self.unguarded) {
            (Verdict::Holds, _) => Ok(id),
            (Verdict::Fails(mismatch), _) => Err(ProofError::refuted(id, mismatch)),
            (Verdict::Undetermined(_), Some((left, right))) => {
                Err(ProofError::unguarded(id, left, right))
            }
            (Verdict::Undetermined(reason), None) => Err(ProofError::inconclusive(id, reason)),
        }
    }

    fn reset(&mut self) {
        self.hyps.clear();
        self.refuted.clear();
        self.fuel = Fuel::new(self.config.max_unfoldings);
        self.stats = EngineStats::default();
        self.unguarded = None;
        self.nesting = 0;
    }

    /// Hypotheses usable under `guard`, oldest first.
    pub fn usable_hypotheses(&self, guard: Guard) -> Vec<(Tree<E, A>, Tree<E, B>)> {
        self.hyps
            .usable(guard)
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect()
    }

    /// Guard under which every current hypothesis is usable.
    pub fn guarded(&self) -> Guard {
        self.hyps.guarded()
    }

    pub fn skip(&self) -> Skip {
        self.skip
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn remaining_fuel(&self) -> usize {
        self.fuel.remaining()
    }

    /// Charge one unfolding made by a search nested `depth` deep.
    pub(crate) fn charge_at(&mut self, depth: usize) -> Result<(), Exhaustion> {
        if depth >= self.config.max_depth {
            return Err(Exhaustion::Depth);
        }
        if !self.fuel.charge() {
            return Err(Exhaustion::Fuel);
        }
        self.stats.unfoldings += 1;
        Ok(())
    }

    /// Number of closure searches currently running on this engine.
    pub(crate) fn depth(&self) -> usize {
        self.nesting
    }

    /// Run a search nested one level deeper.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    pub(crate) fn charge_skip_step(&mut self) -> Result<(), Exhaustion> {
        if !self.fuel.charge() {
            return Err(Exhaustion::Fuel);
        }
        self.stats.skips += 1;
        Ok(())
    }

    pub(crate) fn note_hypothesis_hit(&mut self) {
        self.stats.hypothesis_hits += 1;
    }

    pub(crate) fn note_unguarded(&mut self, key: PairKey) {
        self.stats.unguarded_rejections += 1;
        self.unguarded.get_or_insert(key);
        log::warn!(
            "rejected unguarded use of hypothesis ({}, {})",
            key.0,
            key.1
        );
    }
}

impl<E, A, B> Engine<E, A, B>
where
    E: Event,
    A: PartialEq + 'static,
    B: PartialEq + 'static,
{
    /// Also close pairs up to strong equivalence on each side.
    pub fn up_to_trans(self) -> Self {
        self.with_closure(Rc::new(TransClosure::<E, A, B>::new()))
    }
}

impl<E: Event, A: 'static, B: 'static> StepContext<E, A, B> for Engine<E, A, B> {
    fn leaf(&mut self, a: &A, b: &B, _guard: Guard) -> Verdict {
        if (self.leaf_rel)(a, b) {
            Verdict::Holds
        } else {
            Verdict::fail(MismatchKind::Leaf)
        }
    }

    fn cont(&mut self, a: &Tree<E, A>, b: &Tree<E, B>) -> Verdict {
        let guard = self.hyps.guarded();
        unfold(self, a, b, guard)
    }

    fn max_skips(&self) -> usize {
        self.config.max_skips
    }

    fn charge_skip(&mut self) -> Result<(), Exhaustion> {
        self.charge_skip_step()
    }

    fn assumed(&mut self, a: &Tree<E, A>, b: &Tree<E, B>, guard: Guard) -> bool {
        let usable = self.hyps.lookup(pair_key(a, b), guard) == Lookup::Usable;
        if usable {
            self.note_hypothesis_hit();
        }
        usable
    }
}

impl<E: Event, A: 'static, B: 'static> Coinductive<E, A, B> for Engine<E, A, B> {
    fn skip(&self) -> Skip {
        self.skip
    }

    fn hypotheses(&mut self) -> &mut Hypotheses<E, A, B> {
        &mut self.hyps
    }

    fn cached_failure(&mut self, key: PairKey) -> Option<Mismatch> {
        let mismatch = self.refuted.get(&key)?.clone();
        self.stats.cached_failures += 1;
        Some(mismatch)
    }

    fn record_failure(&mut self, key: PairKey, mismatch: &Mismatch) {
        if self.config.cache_failures {
            self.refuted.insert(key, mismatch.clone());
        }
    }

    fn charge(&mut self) -> Result<(), Exhaustion> {
        let depth = self.depth();
        self.charge_at(depth)
    }

    fn on_hypothesis_hit(&mut self) {
        self.note_hypothesis_hit();
    }

    fn on_unguarded(&mut self, key: PairKey) {
        self.note_unguarded(key);
    }

    fn try_closures(&mut self, a: &Tree<E, A>, b: &Tree<E, B>, guard: Guard) -> Option<Verdict> {
        if self.closures.is_empty() {
            return None;
        }
        let closures = self.closures.clone();
        for closure in closures {
            if let Some(Verdict::Holds) = closure.discharge(self, a, b, guard) {
                self.stats.closure_hits += 1;
                eqv_trace!("{} closure discharged {} ~ {}", closure.name(), a.id(), b.id());
                return Some(Verdict::Holds);
            }
        }
        None
    }
}

fn relation_name(skip: Skip) -> &'static str {
    if skip == Skip::STRONG {
        "strong"
    } else if skip == Skip::WEAK {
        "weak"
    } else if skip == Skip::REFINE {
        "refinement"
    } else {
        "reverse refinement"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::spin;
    use crate::verdict::Side;

    #[derive(Clone, Debug, PartialEq)]
    enum Tick {
        Tick,
        Tock,
    }

    impl Event for Tick {
        type Response = ();

        fn responses(&self) -> Vec<()> {
            vec![()]
        }
    }

    type T = Tree<Tick, i32>;

    fn eq_engine(skip: Skip) -> Engine<Tick, i32, i32> {
        Engine::new(skip, |a: &i32, b: &i32| a == b)
    }

    fn ticking(ev: Tick) -> T {
        T::fix(move |this| T::effect(ev.clone(), move |_| this.clone()))
    }

    #[test]
    fn test_shared_loop_closes_after_guard() {
        let mut engine = eq_engine(Skip::STRONG);
        let t = ticking(Tick::Tick);
        assert!(engine.check(&t, &t).holds());
        assert_eq!(engine.stats().hypothesis_hits, 1);
        assert_eq!(engine.stats().unfoldings, 1);
    }

    #[test]
    fn test_loops_of_different_period_close() {
        let one = T::fix(|this| T::step(this));
        let two = T::fix(|this| T::step(T::step(this)));
        let mut engine = eq_engine(Skip::STRONG);
        assert!(engine.check(&one, &two).holds());
    }

    #[test]
    fn test_different_loops_fail_with_trail() {
        let mut engine = eq_engine(Skip::STRONG);
        let v = engine.check(&ticking(Tick::Tick), &ticking(Tick::Tock));
        let mismatch = v.mismatch().cloned();
        assert!(matches!(
            mismatch.map(|m| m.kind),
            Some(MismatchKind::Event { .. })
        ));
    }

    #[test]
    fn test_long_finite_chains_are_decided() {
        let mut engine = eq_engine(Skip::STRONG);
        let long = T::leaf(0).delay(50_000);
        assert!(engine.check(&long, &long.map(|x| x)).holds());
        assert_eq!(engine.stats().unfoldings, 50_001);

        let v = engine.check(&T::leaf(0).delay(300), &T::leaf(1).delay(300));
        let trail = v.mismatch().map(|m| m.trail.len());
        assert_eq!(trail, Some(300));
    }

    #[test]
    fn test_skips_are_paid_from_fuel() {
        let mut engine = eq_engine(Skip::WEAK);
        assert!(engine.check(&T::leaf(5).delay(20_000), &T::leaf(5)).holds());
        assert_eq!(engine.stats().skips, 20_000);

        let config = EngineConfig::default().with_max_unfoldings(100);
        let mut short = Engine::with_config(Skip::WEAK, |a: &i32, b: &i32| a == b, config);
        assert_eq!(
            short.check(&T::leaf(5).delay(500), &T::leaf(5)),
            Verdict::Undetermined(Exhaustion::Fuel)
        );
    }

    #[test]
    fn test_fuel_exhaustion_is_undetermined() {
        fn fresh() -> T {
            T::step(T::lazy(fresh))
        }
        let config = EngineConfig::default().with_max_unfoldings(10);
        let mut engine = Engine::with_config(Skip::STRONG, |a: &i32, b: &i32| a == b, config);
        assert_eq!(
            engine.check(&fresh(), &fresh()),
            Verdict::Undetermined(Exhaustion::Fuel)
        );
        assert_eq!(engine.remaining_fuel(), 0);

        // A new check starts from a full budget.
        assert!(engine.check(&T::leaf(1), &T::leaf(1)).holds());
    }

    #[test]
    fn test_weak_spin_against_leaf_is_divergence() {
        let mut engine = eq_engine(Skip::WEAK);
        let v = engine.check(&spin(), &T::leaf(0));
        assert_eq!(
            v.mismatch().map(|m| m.kind.clone()),
            Some(MismatchKind::Divergence { side: Side::Left })
        );
    }

    #[test]
    fn test_failures_are_cached_across_claims() {
        let x = T::step(T::leaf(1));
        let y = T::step(T::leaf(2));
        let via_effect = |t: &T| {
            let t = t.clone();
            T::effect(Tick::Tick, move |_| t.clone())
        };

        let mut engine = eq_engine(Skip::STRONG);
        engine.claim(&T::step(x.clone()), &T::step(y.clone()));
        engine.claim(&via_effect(&x), &via_effect(&y));
        let outcomes = engine.prove_each();
        assert!(outcomes.iter().all(|o| matches!(o, Err(ProofError::Refuted { .. }))));
        assert_eq!(engine.stats().cached_failures, 1);

        let mut uncached = Engine::with_config(
            Skip::STRONG,
            |a: &i32, b: &i32| a == b,
            EngineConfig {
                cache_failures: false,
                ..EngineConfig::default()
            },
        );
        uncached.claim(&T::step(x.clone()), &T::step(y.clone()));
        uncached.claim(&via_effect(&x), &via_effect(&y));
        uncached.prove_each();
        assert_eq!(uncached.stats().cached_failures, 0);
    }

    #[test]
    fn test_claims_verify_mutual_loop() {
        let (ping, pong) = (Tick::Tick, Tick::Tock);
        let left = T::fix(move |this| {
            T::effect(ping.clone(), move |_| {
                let this = this.clone();
                T::effect(pong.clone(), move |_| this.clone())
            })
        });
        let Some(second) = next_after_effect(&left) else {
            panic!("expected effect");
        };

        let mut engine = eq_engine(Skip::STRONG);
        engine.claim(&left, &left);
        engine.claim(&second, &second);
        let certificate = engine.prove().unwrap();
        assert_eq!(certificate.proved.len(), 2);
        assert!(certificate.to_string().starts_with("2 claim(s) proved"));
    }

    fn next_after_effect(t: &T) -> Option<T> {
        match t.observe() {
            crate::tree::Shape::Effect(_, resume) => Some(resume(())),
            _ => None,
        }
    }

    #[test]
    fn test_hypothesis_discharge_is_unguarded() {
        let t = ticking(Tick::Tick);
        let mut engine = eq_engine(Skip::STRONG);
        let id = engine.claim_with(&t, &t, Discharge::Hypothesis);
        let err = engine.prove().unwrap_err();
        assert!(matches!(err, ProofError::Unguarded { claim, .. } if claim == id));
        assert_eq!(engine.stats().unguarded_rejections, 1);
    }

    #[test]
    fn test_prove_reports_every_claim() {
        let mut engine = eq_engine(Skip::STRONG);
        engine.claim(&T::leaf(1), &T::leaf(2));
        engine.claim(&T::leaf(3), &T::leaf(3));
        let outcomes = engine.prove_each();
        assert!(matches!(outcomes[0], Err(ProofError::Refuted { .. })));
        assert_eq!(outcomes[1].as_ref().ok(), Some(&ClaimId::from_index(1)));
        assert!(matches!(engine.prove(), Err(ProofError::Refuted { .. })));
    }

    /// Relates the claimed pair again without a guard, once.
    struct ReassertClaim {
        left: T,
        right: T,
        fired: Cell<bool>,
    }

    impl Closure<Tick, i32, i32> for ReassertClaim {
        fn name(&self) -> &'static str {
            "reassert-claim"
        }

        fn discharge(
            &self,
            engine: &mut Engine<Tick, i32, i32>,
            _a: &T,
            _b: &T,
            _guard: Guard,
        ) -> Option<Verdict> {
            if self.fired.replace(true) {
                return None;
            }
            engine.relate(&self.left, &self.right, Guard::NONE);
            None
        }
    }

    #[test]
    fn test_refutation_wins_over_unguarded_attempt() {
        let left = T::step(T::leaf(1));
        let right = T::step(T::leaf(2));
        let mut engine = eq_engine(Skip::STRONG).with_closure(Rc::new(ReassertClaim {
            left: left.clone(),
            right: right.clone(),
            fired: Cell::new(false),
        }));
        engine.claim(&left, &right);
        let err = engine.prove().unwrap_err();
        assert!(matches!(err, ProofError::Refuted { .. }), "got {err}");
        assert_eq!(engine.stats().unguarded_rejections, 1);
    }

    #[test]
    fn test_prove_without_claims() {
        let mut engine = eq_engine(Skip::WEAK);
        assert!(matches!(engine.prove(), Err(ProofError::NoClaims)));
    }
}
