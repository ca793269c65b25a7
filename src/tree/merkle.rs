//! The forest engine.
//!
//! `MerkleTree` stitches fixed-depth subtrees into an unbounded history
//! tree. For every tier on the rightmost spine it keeps exactly one pending
//! subtree whose leaves are the completed subtrees one tier below. Subtree
//! events are dispatched here: root updates flow into the tier above via
//! `update_leaf`, completions persist the full subtree and install its
//! successor (a new root tier when the root filled, a sibling otherwise).

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::name::Name;
use crate::record::Record;
use crate::storage::{Db, StorageError};
use crate::tlv::DecodeError;
use crate::tree::node::{Hash, Index, Node, TreeError};
use crate::tree::subtree::{SubTreeBinary, TreeEvent, SUB_TREE_DEPTH};

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("no pending subtree at level {0}")]
    MissingTier(u64),

    #[error("completed subtree at level {0} has no root hash")]
    RootHashMissing(u64),

    #[error("no subtree record covering ({level}, {seq_no})")]
    MissingSubTree { level: u64, seq_no: u64 },

    #[error("pending subtree at level {found} does not follow level {expected}")]
    InconsistentLevel { expected: u64, found: u64 },

    #[error("pending subtree disagrees on the next leaf ({found} != {expected})")]
    InconsistentNextLeaf { expected: u64, found: u64 },
}

pub struct MerkleTree {
    logger_name: Name,
    db: Db,
    pending_trees: BTreeMap<u64, SubTreeBinary>,
    root_level: u64,
    next_leaf_seq_no: u64,
    root_hash: Option<Hash>,
}

impl MerkleTree {
    /// Opens the forest, restoring the pending spine from the store.
    pub fn new(logger_name: Name, db: Db) -> Result<Self, MerkleError> {
        let mut tree = Self {
            logger_name,
            db,
            pending_trees: BTreeMap::new(),
            root_level: SUB_TREE_DEPTH - 1,
            next_leaf_seq_no: 0,
            root_hash: None,
        };
        tree.load_pending_sub_trees()?;
        Ok(tree)
    }

    /// The number of leaves appended so far.
    pub fn next_leaf_seq_no(&self) -> u64 {
        self.next_leaf_seq_no
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.root_hash
    }

    /// Peak level of the root subtree.
    pub fn root_level(&self) -> u64 {
        self.root_level
    }

    /// Appends a leaf hash. Returns `Ok(false)` when the base subtree
    /// rejects the sequence number; storage failures propagate.
    pub fn add_leaf(&mut self, seq_no: u64, hash: Hash) -> Result<bool, MerkleError> {
        let leaf = Node::new(seq_no, 0, seq_no + 1, Some(hash))?;
        let base_level = SUB_TREE_DEPTH - 1;
        let mut events = Vec::new();
        let accepted = match self.pending_trees.get_mut(&base_level) {
            Some(base) => base.add_leaf(leaf, &mut events),
            None => return Err(MerkleError::MissingTier(base_level)),
        };
        if accepted {
            self.dispatch(base_level, events)?;
        }
        Ok(accepted)
    }

    /// Persists every pending subtree, root tier first.
    pub fn save_pending_tree(&mut self) -> Result<(), MerkleError> {
        let mut level = self.root_level;
        loop {
            let tree = self
                .pending_trees
                .get(&level)
                .ok_or(MerkleError::MissingTier(level))?;
            let record = tree.encode();
            self.db.insert_sub_tree_data(
                level,
                tree.peak_index().seq_no(),
                &record.encode(),
                false,
                tree.next_leaf_seq_no(),
            )?;
            if level <= SUB_TREE_DEPTH - 1 {
                return Ok(());
            }
            level -= SUB_TREE_DEPTH - 1;
        }
    }

    /// On-demand serialization of the pending subtree at `level`.
    pub fn pending_sub_tree_data(&self, level: u64) -> Option<Record> {
        self.pending_trees.get(&level).map(SubTreeBinary::encode)
    }

    /// Gathers the subtree records whose peaks cover the path from `seq_no`
    /// up to the root tier. Returns an empty set for leaves not in the log.
    pub fn get_existence_proof(&self, seq_no: u64) -> Result<Vec<Record>, MerkleError> {
        if seq_no >= self.next_leaf_seq_no {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        let mut idx = Index::aligned(seq_no, 0);
        loop {
            let peak = SubTreeBinary::to_sub_tree_peak_index(idx, true);
            records.push(self.sub_tree_record(peak)?);
            if peak.level() >= self.root_level {
                return Ok(records);
            }
            idx = peak;
        }
    }

    /// Gathers the records tying an older published root into the current
    /// tree: the existence path of the boundary leaf `old_next_seq_no - 1`.
    pub fn get_consistency_proof(&self, old_next_seq_no: u64) -> Result<Vec<Record>, MerkleError> {
        if old_next_seq_no == 0 || old_next_seq_no > self.next_leaf_seq_no {
            return Ok(Vec::new());
        }
        self.get_existence_proof(old_next_seq_no - 1)
    }

    fn sub_tree_record(&self, peak: Index) -> Result<Record, MerkleError> {
        if let Some(tree) = self.pending_trees.get(&peak.level()) {
            if tree.peak_index() == peak {
                return Ok(tree.encode());
            }
        }
        let bytes = self
            .db
            .get_sub_tree_data(peak.level(), peak.seq_no())?
            .ok_or(MerkleError::MissingSubTree {
                level: peak.level(),
                seq_no: peak.seq_no(),
            })?;
        Ok(Record::decode(&bytes)?)
    }

    fn dispatch(&mut self, level: u64, events: Vec<TreeEvent>) -> Result<(), MerkleError> {
        for event in events {
            match event {
                TreeEvent::RootUpdated {
                    next_leaf_seq_no,
                    hash,
                    ..
                } => {
                    if level == self.root_level {
                        self.next_leaf_seq_no = next_leaf_seq_no;
                        self.root_hash = Some(hash);
                    } else {
                        let parent_level = level + (SUB_TREE_DEPTH - 1);
                        let mut parent_events = Vec::new();
                        let parent = self
                            .pending_trees
                            .get_mut(&parent_level)
                            .ok_or(MerkleError::MissingTier(parent_level))?;
                        let updated = parent.update_leaf(next_leaf_seq_no, hash, &mut parent_events);
                        debug_assert!(updated, "parent tier rejected a child root update");
                        self.dispatch(parent_level, parent_events)?;
                    }
                }
                TreeEvent::Completed { index } => {
                    if index.level() == self.root_level {
                        self.grow_root(index)?;
                    } else {
                        self.install_sibling(index)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The root subtree filled: persist it, open the next tier above and
    /// seed it with the old root, then install the old root's sibling.
    fn grow_root(&mut self, idx: Index) -> Result<(), MerkleError> {
        let level = idx.level();
        let (record_bytes, old_root_hash) = {
            let old = self
                .pending_trees
                .get(&level)
                .ok_or(MerkleError::MissingTier(level))?;
            let hash = old.root_hash().ok_or(MerkleError::RootHashMissing(level))?;
            (old.encode().encode(), hash)
        };
        self.db
            .insert_sub_tree_data(level, idx.seq_no(), &record_bytes, true, 0)?;

        let new_peak = Index::aligned(0, level + (SUB_TREE_DEPTH - 1));
        let mut new_root = SubTreeBinary::new(self.logger_name.clone(), new_peak)?;
        self.root_level = new_peak.level();
        debug!(
            old_level = level,
            new_level = new_peak.level(),
            "root subtree complete, growing a new root tier"
        );

        let mut events = Vec::new();
        let seeded = new_root.update_leaf(idx.seq_no() + idx.range(), old_root_hash, &mut events);
        debug_assert!(seeded, "new root tier rejected the completed root");
        self.pending_trees.insert(new_peak.level(), new_root);
        self.dispatch(new_peak.level(), events)?;

        self.install_sibling(idx)
    }

    /// A non-root subtree filled: persist it and open its right sibling.
    fn install_sibling(&mut self, idx: Index) -> Result<(), MerkleError> {
        let level = idx.level();
        let record_bytes = self
            .pending_trees
            .get(&level)
            .ok_or(MerkleError::MissingTier(level))?
            .encode()
            .encode();
        // a duplicate insert after grow_root is benign
        self.db
            .insert_sub_tree_data(level, idx.seq_no(), &record_bytes, true, 0)?;

        let sibling_peak = Index::new(idx.seq_no() + idx.range(), level)?;
        let sibling = SubTreeBinary::new(self.logger_name.clone(), sibling_peak)?;
        debug!(
            level,
            seq_no = sibling_peak.seq_no(),
            "installed pending sibling subtree"
        );
        self.pending_trees.insert(level, sibling);
        Ok(())
    }

    /// Restores the pending spine from the store; with no rows, installs a
    /// fresh base subtree at `(0, 5)`.
    fn load_pending_sub_trees(&mut self) -> Result<(), MerkleError> {
        let rows = self.db.get_pending_sub_trees()?;

        if rows.is_empty() {
            let peak = Index::aligned(0, SUB_TREE_DEPTH - 1);
            let base = SubTreeBinary::new(self.logger_name.clone(), peak)?;
            self.root_level = peak.level();
            self.pending_trees.insert(peak.level(), base);
            return Ok(());
        }

        let mut parent: Option<(u64, u64)> = None; // (level, next_leaf_seq_no)
        for bytes in rows {
            let record = Record::decode(&bytes)?;
            let mut events = Vec::new();
            let tree = SubTreeBinary::decode(self.logger_name.clone(), &record, &mut events)?;
            let level = tree.peak_index().level();
            let next_leaf_seq_no = tree.next_leaf_seq_no();

            match parent {
                None => {
                    self.root_level = level;
                }
                Some((parent_level, parent_next)) => {
                    if parent_level != level + (SUB_TREE_DEPTH - 1) {
                        return Err(MerkleError::InconsistentLevel {
                            expected: parent_level - (SUB_TREE_DEPTH - 1),
                            found: level,
                        });
                    }
                    if parent_next != next_leaf_seq_no {
                        return Err(MerkleError::InconsistentNextLeaf {
                            expected: parent_next,
                            found: next_leaf_seq_no,
                        });
                    }
                }
            }

            self.pending_trees.insert(level, tree);
            self.dispatch(level, events)?;
            parent = Some((level, next_leaf_seq_no));
        }
        Ok(())
    }
}
