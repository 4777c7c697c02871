//! Three-valued outcome of comparing two trees.
//!
//! A bounded search can prove a pair related, refute it, or give up. Giving
//! up is never reported as a refutation.

use std::fmt;
use std::sync::Arc;

use crate::tree::ShapeKind;

/// Which tree of a compared pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// One observation on the path from the compared roots to a mismatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrailStep {
    /// Both sides took a silent step.
    Tau,
    /// One side took an unmatched silent step.
    Skip(Side),
    /// Both sides emitted this event.
    Event(String),
    /// Both continuations were resumed with this response.
    Response(String),
}

impl fmt::Display for TrailStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailStep::Tau => write!(f, "tau"),
            TrailStep::Skip(side) => write!(f, "skip-{side}"),
            TrailStep::Event(ev) => write!(f, "!{ev}"),
            TrailStep::Response(v) => write!(f, "?{v}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MismatchKind {
    /// Both sides terminated but the leaf relation refused the results.
    Leaf,
    /// The outer shapes cannot be matched under the active skip flags.
    Shape { left: ShapeKind, right: ShapeKind },
    /// Both sides emitted events, and the events differ.
    Event { left: String, right: String },
    /// One side is a cycle of silent steps, the other interacts or stops.
    Divergence { side: Side },
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKind::Leaf => write!(f, "results not related"),
            MismatchKind::Shape { left, right } => write!(f, "{left} against {right}"),
            MismatchKind::Event { left, right } => write!(f, "event {left} against {right}"),
            MismatchKind::Divergence { side } => write!(f, "{side} side diverges"),
        }
    }
}

/// Observations from the compared roots down to a mismatch, outermost first.
///
/// Trails of refutations found below one another share their tails, so
/// extending one at the front is constant time.
#[derive(Clone, Default)]
pub struct Trail(Option<Arc<TrailLink>>);

struct TrailLink {
    step: TrailStep,
    rest: Trail,
}

impl Trail {
    pub fn new() -> Self {
        Trail(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrailStep> + '_ {
        let mut link = self.0.as_deref();
        std::iter::from_fn(move || {
            let current = link?;
            link = current.rest.0.as_deref();
            Some(&current.step)
        })
    }

    pub fn to_vec(&self) -> Vec<TrailStep> {
        self.iter().cloned().collect()
    }

    pub fn push_front(&mut self, step: TrailStep) {
        let rest = Trail(self.0.take());
        self.0 = Some(Arc::new(TrailLink { step, rest }));
    }
}

impl Drop for Trail {
    fn drop(&mut self) {
        let mut link = self.0.take();
        while let Some(shared) = link {
            link = match Arc::try_unwrap(shared) {
                Ok(mut owned) => owned.rest.0.take(),
                Err(_) => None,
            };
        }
    }
}

impl PartialEq for Trail {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Trail {}

impl fmt::Debug for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<TrailStep> for Trail {
    fn from_iter<I: IntoIterator<Item = TrailStep>>(steps: I) -> Self {
        let steps: Vec<TrailStep> = steps.into_iter().collect();
        let mut trail = Trail::new();
        for step in steps.into_iter().rev() {
            trail.push_front(step);
        }
        trail
    }
}

/// A refutation, with the observations leading to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub trail: Trail,
}

impl Mismatch {
    pub fn new(kind: MismatchKind) -> Self {
        Mismatch {
            kind,
            trail: Trail::new(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.trail.is_empty() {
            write!(f, " after")?;
            for step in self.trail.iter() {
                write!(f, " {step}")?;
            }
        }
        Ok(())
    }
}

/// Why a search gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exhaustion {
    /// The unfolding budget ran out.
    Fuel,
    /// Searches nested through closures reached the depth limit.
    Depth,
    /// More consecutive silent steps than `max_skips` on one side; a hint
    /// of divergence, not a proof of it.
    SuspectedDivergence { side: Side },
}

impl fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exhaustion::Fuel => write!(f, "unfolding budget exhausted"),
            Exhaustion::Depth => write!(f, "depth limit reached"),
            Exhaustion::SuspectedDivergence { side } => {
                write!(f, "{side} side may diverge (skip bound reached)")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Holds,
    Fails(Mismatch),
    Undetermined(Exhaustion),
}

impl Verdict {
    pub fn fail(kind: MismatchKind) -> Self {
        Verdict::Fails(Mismatch::new(kind))
    }

    pub fn holds(&self) -> bool {
        matches!(self, Verdict::Holds)
    }

    pub fn fails(&self) -> bool {
        matches!(self, Verdict::Fails(_))
    }

    pub fn is_undetermined(&self) -> bool {
        matches!(self, Verdict::Undetermined(_))
    }

    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Verdict::Fails(m) => Some(m),
            _ => None,
        }
    }

    /// Record that this outcome was reached below `step`.
    pub fn within(self, step: TrailStep) -> Self {
        match self {
            Verdict::Fails(mut m) => {
                m.trail.push_front(step);
                Verdict::Fails(m)
            }
            other => other,
        }
    }

    /// Conjunction: a refutation wins over giving up.
    pub fn and(self, other: impl FnOnce() -> Verdict) -> Verdict {
        match self {
            Verdict::Holds => other(),
            Verdict::Fails(_) => self,
            Verdict::Undetermined(_) => match other() {
                failed @ Verdict::Fails(_) => failed,
                _ => self,
            },
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Holds => write!(f, "holds"),
            Verdict::Fails(m) => write!(f, "fails: {m}"),
            Verdict::Undetermined(why) => write!(f, "undetermined: {why}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_fail() -> Verdict {
        Verdict::fail(MismatchKind::Shape {
            left: ShapeKind::Leaf,
            right: ShapeKind::Effect,
        })
    }

    #[test]
    fn test_and_prefers_refutation() {
        let v = Verdict::Undetermined(Exhaustion::Fuel).and(shape_fail);
        assert!(v.fails());
        let v = Verdict::Undetermined(Exhaustion::Fuel).and(|| Verdict::Holds);
        assert!(v.is_undetermined());
        assert!(Verdict::Holds.and(|| Verdict::Holds).holds());
    }

    #[test]
    fn test_trail_rendering() {
        let v = shape_fail()
            .within(TrailStep::Response("1".into()))
            .within(TrailStep::Event("Read".into()))
            .within(TrailStep::Tau);
        assert_eq!(v.to_string(), "fails: leaf against effect after tau !Read ?1");
    }

    #[test]
    fn test_long_trails_extend_and_drop() {
        let mut v = shape_fail();
        for _ in 0..200_000 {
            v = v.within(TrailStep::Tau);
        }
        let trail = v.mismatch().map(|m| m.trail.clone()).unwrap_or_default();
        assert_eq!(trail.len(), 200_000);
        assert!(trail.iter().all(|step| *step == TrailStep::Tau));
        drop(v);
        assert_eq!(trail.len(), 200_000);
    }

    #[test]
    fn test_trail_from_steps_keeps_order() {
        let trail: Trail = [TrailStep::Tau, TrailStep::Skip(Side::Left)].into_iter().collect();
        assert_eq!(trail.to_vec(), vec![TrailStep::Tau, TrailStep::Skip(Side::Left)]);
    }

    #[test]
    fn test_exhaustion_display() {
        let v = Verdict::Undetermined(Exhaustion::SuspectedDivergence { side: Side::Left });
        assert!(v.to_string().contains("left side may diverge"));
    }
}
