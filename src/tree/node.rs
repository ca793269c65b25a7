//! Tree cells and position arithmetic.

use std::fmt;
use std::sync::LazyLock;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// A SHA-256 digest.
pub type Hash = [u8; 32];

static EMPTY_HASH: LazyLock<Hash> = LazyLock::new(|| Sha256::digest(b"").into());

/// The digest of the empty string, used for absent right children.
pub fn empty_hash() -> Hash {
    *EMPTY_HASH
}

/// Hashes a parent node from its coordinates and child hashes.
///
/// The coordinates are fed to the digest as fixed-width little-endian words;
/// the published root-hash vectors depend on this exact byte order. Wire
/// encodings elsewhere stay big-endian.
pub fn hash_children(level: u64, seq_no: u64, left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(level.to_le_bytes());
    hasher.update(seq_no.to_le_bytes());
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("index ({seq_no}, {level}) is misaligned")]
    IndexMisaligned { seq_no: u64, level: u64 },

    #[error("leaf sequence number {leaf_seq_no} outside [{min}, {max}]")]
    OutOfRange {
        leaf_seq_no: u64,
        min: u64,
        max: u64,
    },

    #[error("peak level {0} does not match the subtree depth")]
    PeakLevel(u64),
}

/// A tree position: the lowest covered leaf sequence number and a level.
///
/// A node at `(s, L)` covers leaves `[s, s + 2^L)`, so `s` must be a multiple
/// of `2^L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index {
    seq_no: u64,
    level: u64,
}

impl Index {
    pub fn new(seq_no: u64, level: u64) -> Result<Self, TreeError> {
        if level >= 64 || seq_no % (1u64 << level) != 0 {
            return Err(TreeError::IndexMisaligned { seq_no, level });
        }
        Ok(Self { seq_no, level })
    }

    /// Constructor for positions that are aligned by construction; the
    /// sequence number is masked down to the level boundary.
    pub(crate) fn aligned(seq_no: u64, level: u64) -> Self {
        if level >= 64 {
            return Self { seq_no: 0, level };
        }
        Self {
            seq_no: (seq_no >> level) << level,
            level,
        }
    }

    pub fn seq_no(&self) -> u64 {
        self.seq_no
    }

    pub fn level(&self) -> u64 {
        self.level
    }

    /// The number of leaves this node covers.
    pub fn range(&self) -> u64 {
        1u64 << self.level
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.seq_no, self.level)
    }
}

/// An in-memory tree cell: a position, the exclusive upper bound of leaves
/// folded into it so far, and its hash once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    index: Index,
    leaf_seq_no: u64,
    hash: Option<Hash>,
}

impl Node {
    pub fn new(
        seq_no: u64,
        level: u64,
        leaf_seq_no: u64,
        hash: Option<Hash>,
    ) -> Result<Self, TreeError> {
        let index = Index::new(seq_no, level)?;
        let mut node = Self {
            index,
            leaf_seq_no: index.seq_no(),
            hash,
        };
        // leaf_seq_no 0 on a non-zero position means an empty slot
        if !(leaf_seq_no == 0 && index.seq_no() > 0) {
            node.set_leaf_seq_no(leaf_seq_no)?;
        }
        Ok(node)
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn leaf_seq_no(&self) -> u64 {
        self.leaf_seq_no
    }

    pub fn set_leaf_seq_no(&mut self, leaf_seq_no: u64) -> Result<(), TreeError> {
        let min = self.index.seq_no();
        let max = self.index.seq_no() + self.index.range();
        if leaf_seq_no < min || leaf_seq_no > max {
            return Err(TreeError::OutOfRange {
                leaf_seq_no,
                min,
                max,
            });
        }
        self.leaf_seq_no = leaf_seq_no;
        Ok(())
    }

    pub fn hash(&self) -> Option<Hash> {
        self.hash
    }

    pub fn set_hash(&mut self, hash: Hash) {
        self.hash = Some(hash);
    }

    /// Whether every leaf under this node has been folded in.
    pub fn is_full(&self) -> bool {
        self.index.seq_no() + self.index.range() == self.leaf_seq_no
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn empty_hash_is_sha256_of_nothing() {
        assert_eq!(
            empty_hash(),
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn index_alignment() {
        assert!(Index::new(0, 5).is_ok());
        assert!(Index::new(32, 5).is_ok());
        assert!(Index::new(96, 5).is_ok());
        assert_eq!(
            Index::new(33, 5),
            Err(TreeError::IndexMisaligned { seq_no: 33, level: 5 })
        );
        assert!(Index::new(1, 0).is_ok());
        assert!(Index::new(0, 64).is_err());
    }

    #[test]
    fn index_ordering() {
        let a = Index::new(0, 0).unwrap();
        let b = Index::new(0, 5).unwrap();
        let c = Index::new(32, 0).unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn empty_slot_defaults_leaf_seq_no() {
        let node = Node::new(32, 5, 0, None).unwrap();
        assert_eq!(node.leaf_seq_no(), 32);
        assert!(!node.is_full());

        let node = Node::new(0, 5, 0, None).unwrap();
        assert_eq!(node.leaf_seq_no(), 0);
    }

    #[test]
    fn leaf_seq_no_bounds() {
        let mut node = Node::new(32, 5, 33, None).unwrap();
        assert!(node.set_leaf_seq_no(64).is_ok());
        assert!(node.is_full());
        assert!(matches!(
            node.set_leaf_seq_no(65),
            Err(TreeError::OutOfRange { .. })
        ));
        assert!(matches!(
            node.set_leaf_seq_no(31),
            Err(TreeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn parent_hash_of_empty_children_matches_vector() {
        // first interior node over two empty leaves
        let h = hash_children(1, 0, &empty_hash(), &empty_hash());
        let again = hash_children(1, 0, &empty_hash(), &empty_hash());
        assert_eq!(h, again);
        assert_ne!(h, empty_hash());
        // position is part of the hash input
        assert_ne!(h, hash_children(1, 2, &empty_hash(), &empty_hash()));
        assert_ne!(h, hash_children(2, 0, &empty_hash(), &empty_hash()));
    }
}
