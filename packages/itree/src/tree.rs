//! Lazily unfolded interaction trees.
//!
//! A [`Tree`] is a handle to a node. The node either holds its one-level
//! [`Shape`] already, or a thunk that produces another tree whose shape it
//! adopts the first time anyone observes it. Forcing and dropping are
//! iterative, so long chains of steps or of deferred nodes (left-nested
//! binds, for instance) do not grow the native stack.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::event::Event;
use crate::ids::NodeId;

/// Continuation of an effect node: maps a response to the rest of the tree.
pub type Resume<E, R> = Rc<dyn Fn(<E as Event>::Response) -> Tree<E, R>>;

type Thunk<E, R> = Box<dyn FnOnce() -> Tree<E, R>>;

/// The outermost constructor of a tree.
pub enum Shape<E: Event, R> {
    /// Terminated with a result.
    Leaf(R),
    /// A silent internal transition.
    Step(Tree<E, R>),
    /// An emitted event and the continuation awaiting its response.
    Effect(E, Resume<E, R>),
}

/// Constructor tag of a [`Shape`], without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Leaf,
    Step,
    Effect,
}

impl<E: Event, R> Shape<E, R> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Leaf(_) => ShapeKind::Leaf,
            Shape::Step(_) => ShapeKind::Step,
            Shape::Effect(..) => ShapeKind::Effect,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Shape::Leaf(_))
    }

    pub fn is_step(&self) -> bool {
        matches!(self, Shape::Step(_))
    }

    pub fn is_effect(&self) -> bool {
        matches!(self, Shape::Effect(..))
    }
}

impl<E: Event, R: Clone> Clone for Shape<E, R> {
    fn clone(&self) -> Self {
        match self {
            Shape::Leaf(r) => Shape::Leaf(r.clone()),
            Shape::Step(next) => Shape::Step(next.clone()),
            Shape::Effect(ev, resume) => Shape::Effect(ev.clone(), Rc::clone(resume)),
        }
    }
}

impl<E: Event, R: fmt::Debug> fmt::Debug for Shape<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Leaf(r) => f.debug_tuple("Leaf").field(r).finish(),
            Shape::Step(next) => write!(f, "Step({})", next.id()),
            Shape::Effect(ev, _) => f.debug_tuple("Effect").field(ev).field(&"<resume>").finish(),
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Leaf => write!(f, "leaf"),
            ShapeKind::Step => write!(f, "step"),
            ShapeKind::Effect => write!(f, "effect"),
        }
    }
}

enum Forced<E: Event, R> {
    Shape(Shape<E, R>),
    /// The node was deferred; its shape is the shape of this tree.
    Alias(Tree<E, R>),
}

struct Node<E: Event, R> {
    id: NodeId,
    forced: OnceCell<Forced<E, R>>,
    thunk: Cell<Option<Thunk<E, R>>>,
}

impl<E: Event, R> Node<E, R> {
    /// Unforced and without a thunk: some observation is running its thunk.
    fn is_being_forced(&self) -> bool {
        if self.forced.get().is_some() {
            return false;
        }
        let thunk = self.thunk.take();
        let pending = thunk.is_some();
        self.thunk.set(thunk);
        !pending
    }
}

impl<E: Event, R> Forced<E, R> {
    /// The tree this node owns a handle to, if any.
    fn into_successor(self) -> Option<Tree<E, R>> {
        match self {
            Forced::Shape(Shape::Step(next)) | Forced::Alias(next) => Some(next),
            Forced::Shape(_) => None,
        }
    }
}

// Unlinks step and alias chains one node at a time. Trees captured by effect
// continuations or by thunks that never ran are dropped as usual.
impl<E: Event, R> Drop for Node<E, R> {
    fn drop(&mut self) {
        let mut pending: Vec<Tree<E, R>> = self
            .forced
            .take()
            .and_then(Forced::into_successor)
            .into_iter()
            .collect();
        while let Some(tree) = pending.pop() {
            if let Ok(mut node) = Rc::try_unwrap(tree.node) {
                if let Some(next) = node.forced.take().and_then(Forced::into_successor) {
                    pending.push(next);
                }
            }
        }
    }
}

/// A possibly infinite computation over events `E` producing an `R`.
///
/// Cloning is cheap and shares the node; trees are immutable once built.
pub struct Tree<E: Event, R> {
    node: Rc<Node<E, R>>,
}

impl<E: Event, R> Clone for Tree<E, R> {
    fn clone(&self) -> Self {
        Tree {
            node: Rc::clone(&self.node),
        }
    }
}

impl<E: Event, R: 'static> Tree<E, R> {
    fn with_forced(forced: Forced<E, R>) -> Self {
        Tree {
            node: Rc::new(Node {
                id: NodeId::fresh(),
                forced: OnceCell::with_value(forced),
                thunk: Cell::new(None),
            }),
        }
    }

    fn deferred(thunk: Option<Thunk<E, R>>) -> Self {
        Tree {
            node: Rc::new(Node {
                id: NodeId::fresh(),
                forced: OnceCell::new(),
                thunk: Cell::new(thunk),
            }),
        }
    }

    pub fn from_shape(shape: Shape<E, R>) -> Self {
        Self::with_forced(Forced::Shape(shape))
    }

    pub fn leaf(r: R) -> Self {
        Self::from_shape(Shape::Leaf(r))
    }

    pub fn step(next: Tree<E, R>) -> Self {
        Self::from_shape(Shape::Step(next))
    }

    pub fn effect(ev: E, resume: impl Fn(E::Response) -> Tree<E, R> + 'static) -> Self {
        Self::effect_rc(ev, Rc::new(resume))
    }

    pub fn effect_rc(ev: E, resume: Resume<E, R>) -> Self {
        Self::from_shape(Shape::Effect(ev, resume))
    }

    /// Defer construction until the tree is first observed.
    pub fn lazy(f: impl FnOnce() -> Tree<E, R> + 'static) -> Self {
        Self::deferred(Some(Box::new(f)))
    }

    /// Tie a knot: `f` receives the tree being defined.
    ///
    /// `f` runs on first observation. The body must be guarded, i.e. the
    /// handle passed to `f` may only appear below a `step` or inside an
    /// effect continuation; observing an unguarded self-reference panics.
    /// The knot is a reference cycle and is never reclaimed.
    pub fn fix(f: impl FnOnce(Tree<E, R>) -> Tree<E, R> + 'static) -> Self {
        let tree = Self::deferred(None);
        let this = tree.clone();
        tree.node.thunk.set(Some(Box::new(move || f(this))));
        tree
    }
}

impl<E: Event, R> Tree<E, R> {
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Last node of the alias chain already recorded from this handle.
    fn chain_end(&self) -> &Node<E, R> {
        let mut node: &Node<E, R> = &self.node;
        while let Some(Forced::Alias(tree)) = node.forced.get() {
            node = &tree.node;
        }
        node
    }

    /// Whether both handles share one node.
    pub fn same_node(&self, other: &Tree<E, R>) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Id of the node that holds this tree's shape, forcing it if needed.
    ///
    /// Deferred nodes adopt the shape of the tree their thunk returned, so a
    /// lazy wrapper and the tree it wraps resolve to the same id.
    pub fn resolved_id(&self) -> NodeId {
        self.observe();
        self.chain_end().id
    }

    /// Whether the outer shape has already been produced.
    pub fn is_forced(&self) -> bool {
        self.node.forced.get().is_some()
    }

    /// Produce the outermost shape, forcing exactly as much as needed.
    ///
    /// Repeated observation returns the same shape.
    ///
    /// # Panics
    ///
    /// Panics when a deferred node demands its own shape while it is being
    /// forced, which only an unguarded recursive definition can cause.
    pub fn observe(&self) -> &Shape<E, R> {
        let mut node: &Node<E, R> = &self.node;
        loop {
            match node.forced.get() {
                Some(Forced::Shape(shape)) => return shape,
                Some(Forced::Alias(tree)) => node = &tree.node,
                None => {
                    let Some(thunk) = node.thunk.take() else {
                        panic!(
                            "itree: node {} observed while being forced (unguarded recursive definition)",
                            node.id
                        );
                    };
                    let target = thunk();
                    if target.chain_end().is_being_forced() {
                        panic!(
                            "itree: node {} resolves to a node that is being forced (unguarded recursive definition)",
                            node.id
                        );
                    }
                    if node.forced.set(Forced::Alias(target)).is_err() {
                        unreachable!("deferred node forced twice");
                    }
                }
            }
        }
    }
}

impl<E: Event, R> fmt::Debug for Tree<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut node: &Node<E, R> = &self.node;
        let kind = loop {
            match node.forced.get() {
                Some(Forced::Shape(shape)) => break Some(shape.kind()),
                Some(Forced::Alias(tree)) => node = &tree.node,
                None => break None,
            }
        };
        match kind {
            Some(kind) => write!(f, "Tree({} {})", self.node.id, kind),
            None => write!(f, "Tree({} <unforced>)", self.node.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Clone, Debug, PartialEq)]
    struct Ask;

    impl Event for Ask {
        type Response = u8;

        fn responses(&self) -> Vec<u8> {
            vec![0, 1]
        }
    }

    type T = Tree<Ask, i32>;

    #[test]
    fn test_leaf_observation() {
        let t = T::leaf(5);
        assert!(matches!(t.observe(), Shape::Leaf(5)));
        assert!(t.is_forced());
    }

    #[test]
    fn test_lazy_forces_once() {
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let t = T::lazy(move || {
            *counter.borrow_mut() += 1;
            T::leaf(1)
        });
        assert!(!t.is_forced());
        assert!(matches!(t.observe(), Shape::Leaf(1)));
        assert!(matches!(t.observe(), Shape::Leaf(1)));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_lazy_chain_is_iterative() {
        let mut t = T::leaf(9);
        for _ in 0..100_000 {
            let inner = t;
            t = T::lazy(move || inner);
        }
        assert!(matches!(t.observe(), Shape::Leaf(9)));
    }

    #[test]
    fn test_dropping_long_step_chain() {
        let t = T::leaf(0).delay(1_000_000);
        assert!(t.observe().is_step());
        drop(t);

        let shared = T::leaf(1).delay(100_000);
        let longer = T::step(shared.clone());
        drop(longer);
        assert!(shared.observe().is_step());
    }

    #[test]
    fn test_fix_builds_a_cycle() {
        let spin = T::fix(|this| T::step(this));
        match spin.observe() {
            Shape::Step(next) => assert!(next.same_node(&spin)),
            other => panic!("expected step, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_lazy_wrapper_resolves_to_target() {
        let target = T::step(T::leaf(2));
        let inner = target.clone();
        let wrapper = T::lazy(move || inner);
        assert_ne!(wrapper.id(), target.id());
        assert_eq!(wrapper.resolved_id(), target.resolved_id());
    }

    #[test]
    fn test_effect_resume() {
        let t = T::effect(Ask, |v| T::leaf(v as i32 * 10));
        match t.observe() {
            Shape::Effect(ev, resume) => {
                assert_eq!(ev, &Ask);
                assert!(matches!(resume(1).observe(), Shape::Leaf(10)));
            }
            other => panic!("expected effect, got {:?}", other.kind()),
        }
    }

    #[test]
    #[should_panic(expected = "unguarded recursive definition")]
    fn test_unguarded_fix_panics() {
        let t = T::fix(|this| T::lazy(move || this));
        let _ = t.observe();
    }

    #[test]
    fn test_debug_does_not_force() {
        let t = T::lazy(|| T::leaf(3));
        assert!(format!("{:?}", t).contains("<unforced>"));
        t.observe();
        assert!(format!("{:?}", t).contains("leaf"));
    }
}
