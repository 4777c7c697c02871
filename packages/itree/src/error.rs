//! Error types for proofs and configuration.
//!
//! A pair of trees failing to be related is a [`Verdict`](crate::Verdict),
//! not an error. Errors are reserved for proofs that cannot be accepted and
//! for configuration that cannot be loaded.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::{ClaimId, NodeId};
use crate::verdict::{Exhaustion, Mismatch};

#[derive(Debug, Clone, Error)]
pub enum ProofError {
    /// A claim was closed against the hypotheses before any step or effect
    /// had been matched since the hypothesis was introduced.
    #[error("{claim}: unguarded use of hypothesis ({left}, {right})")]
    Unguarded {
        claim: ClaimId,
        left: NodeId,
        right: NodeId,
    },
    /// The claimed relation is not closed under the step generator.
    #[error("{claim}: refuted: {mismatch}")]
    Refuted { claim: ClaimId, mismatch: Mismatch },
    /// The budget ran out before the claim could be checked.
    #[error("{claim}: inconclusive: {reason}")]
    Inconclusive { claim: ClaimId, reason: Exhaustion },
    #[error("no claims to prove")]
    NoClaims,
}

impl ProofError {
    pub fn unguarded(claim: ClaimId, left: NodeId, right: NodeId) -> Self {
        ProofError::Unguarded { claim, left, right }
    }

    pub fn refuted(claim: ClaimId, mismatch: Mismatch) -> Self {
        ProofError::Refuted { claim, mismatch }
    }

    pub fn inconclusive(claim: ClaimId, reason: Exhaustion) -> Self {
        ProofError::Inconclusive { claim, reason }
    }

    /// The claim the error is about, if any.
    pub fn claim(&self) -> Option<ClaimId> {
        match self {
            ProofError::Unguarded { claim, .. }
            | ProofError::Refuted { claim, .. }
            | ProofError::Inconclusive { claim, .. } => Some(*claim),
            ProofError::NoClaims => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("'{}' has no [package.metadata.itree] table", path.display())]
    MissingSection { path: PathBuf },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
