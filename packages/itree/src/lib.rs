//! Interaction trees and a guarded coinductive equivalence engine.
//!
//! A [`Tree`] describes an effectful computation one observation at a time:
//! it stops with a result, takes a silent step, or emits an event and waits
//! for a response. Trees are lazy and may be infinite.
//!
//! Trees are compared with [`strong_eq`], [`weak_eq`] and [`refines`], which
//! differ only in where unmatched silent steps are tolerated. The [`Engine`]
//! underneath can be extended with closures such as [`TransClosure`] and
//! [`BindClosure`], and can verify user-supplied candidate relations through
//! [`Engine::claim`] and [`Engine::prove`].

pub mod closure;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod hypotheses;
pub mod ids;
pub mod logging;
pub mod ops;
pub mod relations;
pub mod step_rel;
pub mod tree;
pub mod up_to_bind;
pub mod up_to_trans;
pub mod verdict;

#[doc(hidden)]
pub use log as __log;

pub use closure::Closure;
pub use config::{discover_config, find_config_file, load_config, EngineConfig, CONFIG_FILE_NAME};
pub use engine::{Certificate, Discharge, Engine, EngineStats, LeafRel};
pub use error::{ConfigError, ProofError};
pub use event::{Event, Void};
pub use hypotheses::Guard;
pub use ids::{ClaimId, NodeId};
pub use ops::{forever, iter, spin, trigger, Kleisli};
pub use relations::{
    refines, refines_by, refines_with, strong_eq, strong_eq_by, strong_eq_with, weak_eq, weak_eq_by,
    weak_eq_with,
};
pub use step_rel::{step_rel, Skip, StepContext};
pub use tree::{Resume, Shape, ShapeKind, Tree};
pub use up_to_bind::{bind_congruence, BindClosure, BindGoal};
pub use up_to_trans::TransClosure;
pub use verdict::{Exhaustion, Mismatch, MismatchKind, Side, Trail, TrailStep, Verdict};
