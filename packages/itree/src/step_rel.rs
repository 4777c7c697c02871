//! The one-level comparison rule every relation is built from.
//!
//! [`step_rel`] relates two trees by their outer shapes. Anything found under
//! a matched step or effect pair is handed to [`StepContext::cont`], the
//! coinductive continuation; that is the only place the surrounding fixpoint
//! is consulted. Unmatched silent steps allowed by [`Skip`] are consumed in a
//! loop within the same call.
//!
//! The engine does not recurse through `cont`: it takes the [`Below`] left by
//! [`expand`] and relates the pairs it hands out on a stack of its own.

use std::collections::HashSet;

use bitflags::bitflags;

use crate::event::Event;
use crate::hypotheses::Guard;
use crate::ids::NodeId;
use crate::tree::{Resume, Shape, Tree};
use crate::verdict::{Exhaustion, MismatchKind, Side, TrailStep, Verdict};

bitflags! {
    /// Sides allowed to take silent steps the other side does not match.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Skip: u8 {
        const LEFT = 0b01;
        const RIGHT = 0b10;
    }
}

impl Skip {
    /// Step-for-step correspondence.
    pub const STRONG: Skip = Skip::empty();
    /// Either side may take extra silent steps.
    pub const WEAK: Skip = Skip::LEFT.union(Skip::RIGHT);
    /// Only the right side may take extra silent steps.
    pub const REFINE: Skip = Skip::RIGHT;

    pub fn allows(self, side: Side) -> bool {
        match side {
            Side::Left => self.contains(Skip::LEFT),
            Side::Right => self.contains(Skip::RIGHT),
        }
    }

    /// The same flags with the sides exchanged.
    pub fn flipped(self) -> Skip {
        let mut flipped = Skip::empty();
        flipped.set(Skip::LEFT, self.contains(Skip::RIGHT));
        flipped.set(Skip::RIGHT, self.contains(Skip::LEFT));
        flipped
    }
}

/// What the generator needs from the relation being built.
pub trait StepContext<E: Event, A, B> {
    /// Relate two results. `guard` is the guard level of the obligation the
    /// leaves were reached in.
    fn leaf(&mut self, a: &A, b: &B, guard: Guard) -> Verdict;

    /// Relate the trees under a matched step or effect pair.
    fn cont(&mut self, a: &Tree<E, A>, b: &Tree<E, B>) -> Verdict;

    /// Consecutive unmatched silent steps tolerated on one side.
    fn max_skips(&self) -> usize;

    /// Pay for one unmatched silent step.
    fn charge_skip(&mut self) -> Result<(), Exhaustion> {
        Ok(())
    }

    /// Whether the pair reached after skipping is already assumed related
    /// under `guard`.
    fn assumed(&mut self, _a: &Tree<E, A>, _b: &Tree<E, B>, _guard: Guard) -> bool {
        false
    }
}

/// The pairs left to relate under a matched step or effect pair.
pub(crate) enum Below<E: Event, A, B> {
    Tau(Option<(Tree<E, A>, Tree<E, B>)>),
    Effect {
        event: E,
        left: Resume<E, A>,
        right: Resume<E, B>,
        responses: std::vec::IntoIter<E::Response>,
        /// Response the pair handed out last was resumed with.
        current: Option<E::Response>,
    },
}

impl<E: Event, A, B> Below<E, A, B> {
    fn effect(event: &E, left: &Resume<E, A>, right: &Resume<E, B>) -> Self {
        Below::Effect {
            event: event.clone(),
            left: left.clone(),
            right: right.clone(),
            responses: event.responses().into_iter(),
            current: None,
        }
    }

    /// Next pair to relate, built on demand.
    pub(crate) fn next_pair(&mut self) -> Option<(Tree<E, A>, Tree<E, B>)> {
        match self {
            Below::Tau(pair) => pair.take(),
            Below::Effect {
                left,
                right,
                responses,
                current,
                ..
            } => {
                let response = responses.next()?;
                let pair = (left(response.clone()), right(response.clone()));
                *current = Some(response);
                Some(pair)
            }
        }
    }

    /// Attribute the outcome of the pair handed out last.
    pub(crate) fn attribute(&self, outcome: Verdict) -> Verdict {
        match self {
            Below::Effect {
                current: Some(response),
                ..
            } if outcome.fails() => outcome.within(TrailStep::Response(format!("{response:?}"))),
            _ => outcome,
        }
    }

    /// Attribute the combined outcome of every pair to the matched pair.
    pub(crate) fn close(&self, outcome: Verdict) -> Verdict {
        match self {
            Below::Tau(_) => outcome.within(TrailStep::Tau),
            Below::Effect { event, .. } if outcome.fails() => {
                outcome.within(TrailStep::Event(format!("{event:?}")))
            }
            Below::Effect { .. } => outcome,
        }
    }
}

/// Outcome of comparing the outer shapes, after any skipping.
pub(crate) enum Expansion<E: Event, A, B> {
    Done(Verdict),
    Below(Below<E, A, B>),
}

/// Compare the outer shapes of `a` and `b`, skipping silent steps as `skip`
/// allows. Returns the sides skipped, outermost first.
pub(crate) fn expand<E, A, B, C>(
    skip: Skip,
    a: &Tree<E, A>,
    b: &Tree<E, B>,
    guard: Guard,
    cx: &mut C,
) -> (Vec<Side>, Expansion<E, A, B>)
where
    E: Event,
    C: StepContext<E, A, B> + ?Sized,
{
    let mut a = a.clone();
    let mut b = b.clone();
    let mut skipped: Vec<Side> = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();

    let expansion = loop {
        let (side, next_a, next_b) = match (a.observe(), b.observe()) {
            (Shape::Leaf(x), Shape::Leaf(y)) => break Expansion::Done(cx.leaf(x, y, guard)),
            (Shape::Step(m1), Shape::Step(m2)) => {
                break Expansion::Below(Below::Tau(Some((m1.clone(), m2.clone()))))
            }
            (Shape::Effect(e1, k1), Shape::Effect(e2, k2)) => {
                if e1 != e2 {
                    break Expansion::Done(Verdict::fail(MismatchKind::Event {
                        left: format!("{e1:?}"),
                        right: format!("{e2:?}"),
                    }));
                }
                break Expansion::Below(Below::effect(e1, k1, k2));
            }
            (Shape::Step(m1), _) if skip.allows(Side::Left) => (Side::Left, Some(m1.clone()), None),
            (_, Shape::Step(m2)) if skip.allows(Side::Right) => (Side::Right, None, Some(m2.clone())),
            (left, right) => {
                break Expansion::Done(Verdict::fail(MismatchKind::Shape {
                    left: left.kind(),
                    right: right.kind(),
                }))
            }
        };

        // Only one side ever skips in a call: the other is not a step.
        let at = match side {
            Side::Left => a.resolved_id(),
            Side::Right => b.resolved_id(),
        };
        if !seen.insert(at) {
            break Expansion::Done(Verdict::fail(MismatchKind::Divergence { side }));
        }
        if skipped.len() >= cx.max_skips() {
            break Expansion::Done(Verdict::Undetermined(Exhaustion::SuspectedDivergence {
                side,
            }));
        }
        if let Err(why) = cx.charge_skip() {
            break Expansion::Done(Verdict::Undetermined(why));
        }
        if let Some(next) = next_a {
            a = next;
        }
        if let Some(next) = next_b {
            b = next;
        }
        skipped.push(side);
        if cx.assumed(&a, &b, guard) {
            break Expansion::Done(Verdict::Holds);
        }
    };
    (skipped, expansion)
}

/// Attribute `verdict` to the silent steps skipped before reaching it.
pub(crate) fn behind_skips(verdict: Verdict, skipped: &[Side]) -> Verdict {
    if !verdict.fails() {
        return verdict;
    }
    skipped
        .iter()
        .rev()
        .fold(verdict, |v, side| v.within(TrailStep::Skip(*side)))
}

/// Relate `a` and `b` one level deep.
///
/// Rules, in order: leaf/leaf by the leaf relation; step/step by `cont`;
/// effect/effect when the events are equal and `cont` relates both
/// continuations at every response; a left step is skipped when `skip`
/// allows it, then a right step likewise; everything else is a mismatch.
/// After a skip the new pair may be closed by [`StepContext::assumed`].
/// Monotone in `cont`.
pub fn step_rel<E, A, B, C>(
    skip: Skip,
    a: &Tree<E, A>,
    b: &Tree<E, B>,
    guard: Guard,
    cx: &mut C,
) -> Verdict
where
    E: Event,
    C: StepContext<E, A, B> + ?Sized,
{
    let (skipped, expansion) = expand(skip, a, b, guard, cx);
    let verdict = match expansion {
        Expansion::Done(verdict) => verdict,
        Expansion::Below(mut below) => {
            let mut verdict = Verdict::Holds;
            while let Some((x, y)) = below.next_pair() {
                let outcome = below.attribute(cx.cont(&x, &y));
                verdict = verdict.and(|| outcome);
                if verdict.fails() {
                    break;
                }
            }
            below.close(verdict)
        }
    };
    behind_skips(verdict, &skipped)
}
