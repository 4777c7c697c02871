//! Enhancements of the coinduction principle.
//!
//! A closure offers another way to discharge a pair once hypothesis lookup
//! has not closed it: the engine asks every registered closure before
//! unfolding the pair itself. Closures are trusted; registering one asserts
//! that it is compatible with the step generator of the engine it is
//! registered on.

use crate::engine::Engine;
use crate::event::Event;
use crate::hypotheses::Guard;
use crate::tree::Tree;
use crate::verdict::Verdict;

pub trait Closure<E: Event, A, B> {
    /// Short name used in trace output.
    fn name(&self) -> &'static str;

    /// Try to relate `a` and `b`.
    ///
    /// `guard` is the guard the pair is being related at; the closure may
    /// only appeal to hypotheses usable under it. Returns `None` when the
    /// closure does not apply. Anything other than `Some(Verdict::Holds)`
    /// leaves the pair to be unfolded normally.
    fn discharge(
        &self,
        engine: &mut Engine<E, A, B>,
        a: &Tree<E, A>,
        b: &Tree<E, B>,
        guard: Guard,
    ) -> Option<Verdict>;
}
