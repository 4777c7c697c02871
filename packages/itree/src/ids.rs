//! Identifier types for tree nodes and proof claims.
//!
//! All IDs are lightweight Copy types using the newtype pattern.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a tree node.
///
/// Every `Tree` handle points at a node carrying a NodeId. Clones of a handle
/// share the node and therefore the id; rebuilding an equal tree yields a new
/// id. The engine keys its hypothesis sets on pairs of NodeIds, so only shared
/// nodes close coinductive loops.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u64);

/// Identifier of a claim registered with an engine.
///
/// Claims are stored in a Vec and referenced by index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClaimId(u32);

static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    /// Create a fresh unique NodeId.
    pub fn fresh() -> Self {
        NodeId(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl ClaimId {
    pub fn from_index(index: usize) -> Self {
        ClaimId(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claim {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_fresh_is_unique() {
        let n1 = NodeId::fresh();
        let n2 = NodeId::fresh();
        assert_ne!(n1, n2);
        assert!(n2.raw() > n1.raw());
    }

    #[test]
    fn test_claim_id_index_roundtrip() {
        let id = ClaimId::from_index(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "claim 7");
    }
}
