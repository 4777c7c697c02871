//! Sequencing and the derived tree combinators.

use std::ops::ControlFlow;
use std::rc::Rc;

use crate::event::Event;
use crate::tree::{Shape, Tree};

/// Tree-producing function: `A -> Tree<E, B>`.
///
/// This is the continuation handed to `bind`, shared between every place the
/// bound tree resumes.
pub type Kleisli<E, A, B> = Rc<dyn Fn(A) -> Tree<E, B>>;

impl<E: Event, R: Clone + 'static> Tree<E, R> {
    /// Run `self`, then feed its result into `k`.
    ///
    /// Productive: observing the result forces one level of `self` and
    /// touches `k` only when that level is a leaf.
    pub fn bind<S: 'static>(&self, k: impl Fn(R) -> Tree<E, S> + 'static) -> Tree<E, S> {
        bind_rc(self.clone(), Rc::new(k))
    }

    pub fn bind_rc<S: 'static>(&self, k: Kleisli<E, R, S>) -> Tree<E, S> {
        bind_rc(self.clone(), k)
    }

    pub fn map<S: 'static>(&self, f: impl Fn(R) -> S + 'static) -> Tree<E, S> {
        self.bind(move |r| Tree::leaf(f(r)))
    }

    /// Strip up to `n` leading silent steps.
    pub fn burn(&self, n: usize) -> Tree<E, R> {
        let mut current = self.clone();
        for _ in 0..n {
            let next = match current.observe() {
                Shape::Step(next) => next.clone(),
                _ => break,
            };
            current = next;
        }
        current
    }

    /// Prefix `self` with `n` silent steps.
    pub fn delay(&self, n: usize) -> Tree<E, R> {
        (0..n).fold(self.clone(), |t, _| Tree::step(t))
    }
}

fn bind_rc<E: Event, R: Clone + 'static, S: 'static>(
    t: Tree<E, R>,
    k: Kleisli<E, R, S>,
) -> Tree<E, S> {
    Tree::lazy(move || match t.observe() {
        Shape::Leaf(r) => k(r.clone()),
        Shape::Step(next) => Tree::step(bind_rc(next.clone(), k)),
        Shape::Effect(ev, resume) => {
            let resume = Rc::clone(resume);
            Tree::effect(ev.clone(), move |x| bind_rc(resume(x), Rc::clone(&k)))
        }
    })
}

/// Emit `ev` and return the response.
pub fn trigger<E: Event>(ev: E) -> Tree<E, E::Response> {
    Tree::effect(ev, Tree::leaf)
}

/// The tree that takes silent steps forever.
///
/// All steps share one node, so the engine can close the loop.
pub fn spin<E: Event, R: 'static>() -> Tree<E, R> {
    Tree::fix(Tree::step)
}

/// Repeat `t` forever, each repetition behind a silent step.
pub fn forever<E: Event, R: Clone + 'static, S: 'static>(t: Tree<E, R>) -> Tree<E, S> {
    Tree::fix(move |this| t.bind(move |_| Tree::step(this.clone())))
}

/// Loop `body` from `init` until it breaks.
///
/// Each `Continue` re-enters the loop behind one silent step.
pub fn iter<E, I, R>(
    body: impl Fn(I) -> Tree<E, ControlFlow<R, I>> + 'static,
    init: I,
) -> Tree<E, R>
where
    E: Event,
    I: Clone + 'static,
    R: Clone + 'static,
{
    iter_rc(Rc::new(body), init)
}

fn iter_rc<E, I, R>(body: Kleisli<E, I, ControlFlow<R, I>>, init: I) -> Tree<E, R>
where
    E: Event,
    I: Clone + 'static,
    R: Clone + 'static,
{
    let again = Rc::clone(&body);
    body(init).bind(move |flow| match flow {
        ControlFlow::Continue(i) => Tree::step(iter_rc(Rc::clone(&again), i)),
        ControlFlow::Break(r) => Tree::leaf(r),
    })
}
