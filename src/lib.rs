//! siglog - an append-only, publicly auditable signature log.
//!
//! Producers submit signed data objects; the logger records each submission
//! as a leaf of a history tree and publishes succinct cryptographic proofs
//! that let third parties verify, at any later time, that a submission is
//! in the log and that two published log states are consistent.
//!
//! ## Architecture
//!
//! The history tree is materialized as a forest of fixed-depth binary
//! subtrees:
//!
//! 1. **Tree core** ([`tree`]) - node indexing, depth-6 subtrees with hash
//!    propagation, and the forest engine growing the tree by cascading
//!    subtree completion.
//! 2. **Store** ([`storage`]) - embedded SQLite persistence for complete
//!    subtrees, pending subtrees and the leaf table.
//! 3. **Codecs** ([`tlv`], [`name`], [`record`], [`leaf`], [`response`]) -
//!    the TLV wire forms of subtree records, leaves and log responses.
//! 4. **Auditor** ([`auditor`]) - stateless existence and consistency
//!    verification from a bag of subtree records.
//! 5. **Logger** ([`logger`]) - submission and query orchestration under
//!    one naming prefix.
//!
//! The network face, the signature validator rules engine and key
//! management are host collaborators; this crate implements the core and
//! the contracts it states for them.

pub mod auditor;
pub mod common;
pub mod leaf;
pub mod logger;
pub mod name;
pub mod record;
pub mod response;
pub mod storage;
pub mod tlv;
pub mod tree;

// Re-exports: configuration, logging, errors
pub use common::{
    init_logging, ConfigError, LogLevel, LoggerConfig, LoggingError, PolicyConfig, Result,
    SigLogError,
};

// Re-exports: codecs
pub use leaf::{Leaf, LeafError};
pub use name::Name;
pub use record::Record;
pub use response::{LoggerResponse, ResponseCode};
pub use tlv::DecodeError;

// Re-exports: tree core and store
pub use storage::{Db, StorageError};
pub use tree::{
    empty_hash, Hash, Index, MerkleError, MerkleTree, Node, SubTreeBinary, TreeError,
    SUB_TREE_DEPTH,
};

// Re-exports: orchestration
pub use logger::{
    Logger, LoggerError, Policy, Submission, TimestampPolicy, DATA_FETCH_RETRIES,
};
