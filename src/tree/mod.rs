//! The history-tree core: node arithmetic, fixed-depth subtrees and the
//! forest engine stitching them into an unbounded append-only tree.

pub mod merkle;
pub mod node;
pub mod subtree;

pub use merkle::{MerkleError, MerkleTree};
pub use node::{empty_hash, hash_children, Hash, Index, Node, TreeError};
pub use subtree::{
    SubTreeBinary, TreeEvent, INCOMPLETE_FRESHNESS_MS, SUB_TREE_DEPTH,
};
