//! Event families a tree interacts through.

use std::fmt;

/// An indexed family of events.
///
/// Emitting an event suspends the tree until the environment supplies exactly
/// one response. The family's response type is the associated `Response`; two
/// events that expect different kinds of response must compare unequal, so
/// event equality also decides response-type agreement.
pub trait Event: Clone + fmt::Debug + PartialEq + 'static {
    type Response: Clone + fmt::Debug + 'static;

    /// The responses the environment may give to this event.
    ///
    /// Effect nodes are compared by resuming both continuations with every
    /// response listed here. Events with an open response domain should list
    /// a representative sample; verdicts are then relative to that sample.
    fn responses(&self) -> Vec<Self::Response>;
}

/// An event family with no inhabitants, for trees that never interact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Void {}

impl Event for Void {
    type Response = ();

    fn responses(&self) -> Vec<()> {
        match *self {}
    }
}
