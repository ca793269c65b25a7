//! Fixed-depth binary subtrees.
//!
//! The log's history tree is materialized as a forest of subtrees of depth 6:
//! a peak node five levels above its 32 leaf slots. Leaves are either raw
//! submission hashes (base tier) or the current root hashes of the subtrees
//! one tier below. Each mutation recomputes the ancestor chain up to the
//! current actual root and reports what happened through [`TreeEvent`]s,
//! which the forest engine dispatches to the tier above.

use std::collections::BTreeMap;

use crate::name::Name;
use crate::record::Record;
use crate::tlv::{self, DecodeError};
use crate::tree::node::{empty_hash, hash_children, Hash, Index, Node, TreeError};

/// Depth of every subtree; the peak sits `SUB_TREE_DEPTH - 1` levels above
/// its leaves.
pub const SUB_TREE_DEPTH: u64 = 6;

/// Freshness period for records of subtrees that can still change.
pub const INCOMPLETE_FRESHNESS_MS: u64 = 60_000;

/// Name marker for records of full subtrees.
const COMPONENT_COMPLETE: &[u8] = b"complete";

/// Number of name components a subtree record appends to the logger prefix:
/// level, sequence number, completion marker and root hash.
const N_LOGGER_SUFFIX: usize = 4;

const OFFSET_ROOT_HASH: isize = -1;
const OFFSET_COMPLETE: isize = -2;
const OFFSET_SEQ_NO: isize = -3;
const OFFSET_LEVEL: isize = -4;

/// What a mutation did to the subtree, in firing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// The actual root advanced: moved up, gained a hash, or covers more
    /// leaves.
    RootUpdated {
        index: Index,
        next_leaf_seq_no: u64,
        hash: Hash,
    },
    /// The peak node became full.
    Completed { index: Index },
}

#[derive(Debug)]
pub struct SubTreeBinary {
    logger_name: Name,
    peak: Index,
    min_seq_no: u64,
    max_seq_no: u64,
    leaf_level: u64,
    actual_root: Option<Index>,
    nodes: BTreeMap<Index, Node>,
    pending_leaf_seq_no: u64,
    is_pending_leaf_empty: bool,
}

impl SubTreeBinary {
    /// Creates an empty subtree with the given peak.
    pub fn new(logger_name: Name, peak: Index) -> Result<Self, TreeError> {
        if peak.level() + 1 < SUB_TREE_DEPTH || peak.level() % (SUB_TREE_DEPTH - 1) != 0 {
            return Err(TreeError::PeakLevel(peak.level()));
        }
        let max_seq_no = peak
            .seq_no()
            .checked_add(peak.range())
            .ok_or(TreeError::PeakLevel(peak.level()))?;
        Ok(Self {
            logger_name,
            peak,
            min_seq_no: peak.seq_no(),
            max_seq_no,
            leaf_level: peak.level() + 1 - SUB_TREE_DEPTH,
            actual_root: None,
            nodes: BTreeMap::new(),
            pending_leaf_seq_no: peak.seq_no(),
            is_pending_leaf_empty: true,
        })
    }

    pub fn peak_index(&self) -> Index {
        self.peak
    }

    pub fn min_seq_no(&self) -> u64 {
        self.min_seq_no
    }

    pub fn max_seq_no(&self) -> u64 {
        self.max_seq_no
    }

    pub fn leaf_level(&self) -> u64 {
        self.leaf_level
    }

    /// The exclusive upper bound of leaves folded in so far.
    pub fn next_leaf_seq_no(&self) -> u64 {
        match self.actual_root.and_then(|idx| self.nodes.get(&idx)) {
            Some(root) => root.leaf_seq_no(),
            None => self.peak.seq_no(),
        }
    }

    /// The current actual root, `None` until the first leaf arrives.
    pub fn root(&self) -> Option<&Node> {
        self.actual_root.and_then(|idx| self.nodes.get(&idx))
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.root().and_then(Node::hash)
    }

    pub fn node(&self, index: &Index) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn is_full(&self) -> bool {
        match self.actual_root {
            Some(root_idx) => {
                root_idx == self.peak && self.nodes.get(&root_idx).is_some_and(Node::is_full)
            }
            None => false,
        }
    }

    /// Inserts the next expected leaf. Returns `false` when the leaf does
    /// not satisfy the subtree's invariants; events for accepted leaves are
    /// appended to `events`.
    pub fn add_leaf(&mut self, leaf: Node, events: &mut Vec<TreeEvent>) -> bool {
        let idx = leaf.index();
        if idx.level() != self.leaf_level
            || idx.seq_no() < self.min_seq_no
            || idx.seq_no() >= self.max_seq_no
        {
            return false;
        }
        if idx.seq_no() != self.pending_leaf_seq_no || !self.is_pending_leaf_empty {
            return false;
        }

        let leaf_is_full = leaf.is_full();
        let next_pending = idx.seq_no() + idx.range();
        self.nodes.insert(idx, leaf);

        self.update_actual_root(idx, events);
        self.update_parent_node(idx, events);

        if leaf_is_full {
            self.pending_leaf_seq_no = next_pending;
            self.is_pending_leaf_empty = true;
        } else {
            self.is_pending_leaf_empty = false;
        }
        true
    }

    /// Installs or overwrites the rightmost leaf with a child subtree's
    /// current root. `next_seq_no` is the child's leaf bound, which selects
    /// the slot.
    pub fn update_leaf(&mut self, next_seq_no: u64, hash: Hash, events: &mut Vec<TreeEvent>) -> bool {
        if next_seq_no <= self.min_seq_no || next_seq_no > self.max_seq_no {
            return false;
        }

        let leaf_seq_no = ((next_seq_no - 1) >> self.leaf_level) << self.leaf_level;
        if self.pending_leaf_seq_no != leaf_seq_no {
            return false;
        }

        let idx = Index::aligned(leaf_seq_no, self.leaf_level);
        match self.nodes.get_mut(&idx) {
            Some(node) => {
                if node.set_leaf_seq_no(next_seq_no).is_err() {
                    return false;
                }
                node.set_hash(hash);
            }
            None => {
                let Ok(node) = Node::new(leaf_seq_no, self.leaf_level, next_seq_no, Some(hash))
                else {
                    return false;
                };
                self.nodes.insert(idx, node);
                self.update_actual_root(idx, events);
            }
        }

        if next_seq_no == leaf_seq_no + (1u64 << self.leaf_level) {
            self.pending_leaf_seq_no = next_seq_no;
            self.is_pending_leaf_empty = true;
        }

        self.update_parent_node(idx, events);
        true
    }

    /// Determines the peak of the subtree enclosing `index`. With `not_root`
    /// unset, a node whose level is already a tier boundary is treated as the
    /// peak of its own subtree instead of a leaf of the tier above.
    pub fn to_sub_tree_peak_index(index: Index, not_root: bool) -> Index {
        let step = SUB_TREE_DEPTH - 1;
        let mut peak_level = ((index.level() + step) / step) * step;
        if index.level() % step == 0 && index.level() > 0 && !not_root {
            peak_level -= step;
        }
        Index::aligned(index.seq_no(), peak_level)
    }

    fn update_actual_root(&mut self, node_idx: Index, events: &mut Vec<TreeEvent>) {
        match self.actual_root {
            None => {
                if node_idx.seq_no() == 0 {
                    // root subtree: the first leaf is the actual root
                    self.actual_root = Some(node_idx);
                    if let Some(node) = self.nodes.get(&node_idx) {
                        if let Some(hash) = node.hash() {
                            events.push(TreeEvent::RootUpdated {
                                index: node_idx,
                                next_leaf_seq_no: node.leaf_seq_no(),
                                hash,
                            });
                        }
                    }
                } else {
                    // non-root subtree: hash-less placeholder at the peak
                    if let Ok(node) = Node::new(self.peak.seq_no(), self.peak.level(), 0, None) {
                        self.nodes.insert(self.peak, node);
                        self.actual_root = Some(self.peak);
                    }
                }
            }
            Some(root_idx) => {
                if root_idx == self.peak {
                    return;
                }
                if node_idx.seq_no() >> root_idx.level() != 0 {
                    // the new node falls outside the covered range
                    let promoted = Index::aligned(self.min_seq_no, root_idx.level() + 1);
                    if let Ok(node) =
                        Node::new(promoted.seq_no(), promoted.level(), 0, None)
                    {
                        self.nodes.insert(promoted, node);
                        self.actual_root = Some(promoted);
                    }
                }
            }
        }
    }

    fn update_parent_node(&mut self, start: Index, events: &mut Vec<TreeEvent>) {
        let mut idx = start;
        loop {
            let Some(root_idx) = self.actual_root else {
                return;
            };
            if idx == root_idx {
                return;
            }

            let (child_leaf_seq_no, child_hash) = match self.nodes.get(&idx) {
                Some(node) => match node.hash() {
                    Some(hash) => (node.leaf_seq_no(), hash),
                    None => return,
                },
                None => return,
            };

            let parent_level = idx.level() + 1;
            let parent_idx;
            let parent_hash;
            if (idx.seq_no() >> idx.level()) % 2 == 0 {
                // left child; an absent right sibling contributes EMPTY_HASH
                parent_idx = Index::aligned(idx.seq_no(), parent_level);
                parent_hash = hash_children(
                    parent_level,
                    parent_idx.seq_no(),
                    &child_hash,
                    &empty_hash(),
                );
            } else {
                let parent_seq_no = idx.seq_no() - idx.range();
                parent_idx = Index::aligned(parent_seq_no, parent_level);
                let sibling_idx = Index::aligned(parent_seq_no, idx.level());
                let Some(sibling_hash) = self.nodes.get(&sibling_idx).and_then(Node::hash)
                else {
                    return;
                };
                parent_hash =
                    hash_children(parent_level, parent_seq_no, &sibling_hash, &child_hash);
            }

            match self.nodes.get_mut(&parent_idx) {
                Some(parent) => {
                    parent.set_hash(parent_hash);
                    if parent.set_leaf_seq_no(child_leaf_seq_no).is_err() {
                        return;
                    }
                }
                None => {
                    let Ok(parent) = Node::new(
                        parent_idx.seq_no(),
                        parent_idx.level(),
                        child_leaf_seq_no,
                        Some(parent_hash),
                    ) else {
                        return;
                    };
                    self.nodes.insert(parent_idx, parent);
                }
            }

            if parent_idx == root_idx {
                events.push(TreeEvent::RootUpdated {
                    index: parent_idx,
                    next_leaf_seq_no: child_leaf_seq_no,
                    hash: parent_hash,
                });
                let completed = parent_idx == self.peak
                    && self.nodes.get(&parent_idx).is_some_and(Node::is_full);
                if completed {
                    events.push(TreeEvent::Completed { index: parent_idx });
                }
                return;
            }
            idx = parent_idx;
        }
    }

    /// Encodes the subtree as a signed record. A subtree without leaves
    /// yields the canonical empty record.
    pub fn encode(&self) -> Record {
        let Some(root_idx) = self.actual_root else {
            let mut name = self.logger_name.clone();
            name.append_number(self.peak.level())
                .append_number(self.peak.seq_no())
                .append_number(self.peak.seq_no())
                .append(empty_hash().to_vec());
            return Record::new(name, Some(0), Vec::new());
        };

        let (root_leaf_seq_no, root_hash) = match self.nodes.get(&root_idx) {
            Some(node) => (node.leaf_seq_no(), node.hash().unwrap_or_else(empty_hash)),
            None => (root_idx.seq_no(), empty_hash()),
        };

        let is_full = self.is_full();
        let mut name = self.logger_name.clone();
        name.append_number(root_idx.level())
            .append_number(root_idx.seq_no());
        if is_full {
            name.append(COMPONENT_COMPLETE.to_vec());
        } else {
            name.append_number(root_leaf_seq_no);
        }
        name.append(root_hash.to_vec());

        let freshness = if is_full {
            None
        } else {
            Some(INCOMPLETE_FRESHNESS_MS)
        };

        let mut content = Vec::new();
        let step = 1u64 << self.leaf_level;
        let mut seq_no = self.min_seq_no;
        while seq_no < self.max_seq_no {
            let idx = Index::aligned(seq_no, self.leaf_level);
            match self.nodes.get(&idx).and_then(Node::hash) {
                Some(hash) => content.extend_from_slice(&hash),
                None => break,
            }
            seq_no += step;
        }

        Record::new(name, freshness, content)
    }

    /// Reconstructs a subtree from a record, verifying the carried root hash
    /// against the recomputed one. Events fired while replaying the leaves
    /// are appended to `events`.
    pub fn decode(
        logger_name: Name,
        record: &Record,
        events: &mut Vec<TreeEvent>,
    ) -> Result<Self, DecodeError> {
        let name = record.name();
        if !logger_name.is_prefix_of(name) {
            return Err(DecodeError::LoggerPrefix);
        }
        if logger_name.len() + N_LOGGER_SUFFIX != name.len() {
            return Err(DecodeError::NamingConvention("subtree"));
        }

        let marker = name.get(OFFSET_COMPLETE).ok_or(DecodeError::Truncated)?;
        let is_complete = marker == COMPONENT_COMPLETE;
        let mut next_seq_no = if is_complete {
            0
        } else {
            tlv::nni_decode(marker)?
        };
        let root_hash = name
            .get(OFFSET_ROOT_HASH)
            .ok_or(DecodeError::Truncated)?
            .to_vec();
        let seq_no = name.get_number(OFFSET_SEQ_NO)?;
        let level = name.get_number(OFFSET_LEVEL)?;
        if level >= 64 {
            return Err(DecodeError::InvalidPeak);
        }

        let step = SUB_TREE_DEPTH - 1;
        let peak = if seq_no == 0 {
            let mut peak_level = if level % step != 0 {
                ((level + step) / step) * step
            } else {
                level
            };
            // a non-complete root record whose embedded root is itself full
            // belongs one tier up
            if !is_complete && peak_level < 64 && next_seq_no == 1u64 << peak_level {
                peak_level += step;
            }
            Index::new(0, peak_level).map_err(|_| DecodeError::InvalidPeak)?
        } else {
            Index::new(seq_no, level).map_err(|_| DecodeError::InvalidPeak)?
        };

        let mut tree = Self::new(logger_name, peak).map_err(|_| DecodeError::InvalidPeak)?;

        if is_complete {
            next_seq_no = seq_no + (1u64 << level);
        } else if next_seq_no == seq_no {
            return Ok(tree); // canonical empty record
        }

        if root_hash.len() != 32 {
            return Err(DecodeError::HashSize(root_hash.len()));
        }
        if next_seq_no <= seq_no || next_seq_no > seq_no + (1u64 << level) {
            return Err(DecodeError::SeqNoRange);
        }

        let leaf_step = 1u64 << tree.leaf_level;
        let n_leaves = ((next_seq_no - seq_no - 1) / leaf_step + 1) as usize;
        let content = record.content();
        if n_leaves * 32 != content.len() {
            return Err(DecodeError::InconsistentContent);
        }

        for i in 0..n_leaves {
            let leaf_seq_no = seq_no + i as u64 * leaf_step;
            let leaf_bound = if i + 1 == n_leaves {
                next_seq_no
            } else {
                leaf_seq_no + leaf_step
            };
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&content[i * 32..(i + 1) * 32]);
            let node = Node::new(leaf_seq_no, tree.leaf_level, leaf_bound, Some(hash))
                .map_err(|_| DecodeError::InconsistentContent)?;
            if !tree.add_leaf(node, events) {
                return Err(DecodeError::InconsistentContent);
            }
        }

        let mut expected = [0u8; 32];
        expected.copy_from_slice(&root_hash);
        if tree.root_hash() != Some(expected) {
            return Err(DecodeError::InconsistentHash);
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use sha2::{Digest, Sha256};

    fn logger_name() -> Name {
        Name::from_uri("/logger/name")
    }

    fn index(seq_no: u64, level: u64) -> Index {
        Index::new(seq_no, level).unwrap()
    }

    fn leaf(seq_no: u64, level: u64, bound: u64, hash: Hash) -> Node {
        Node::new(seq_no, level, bound, Some(hash)).unwrap()
    }

    /// Hash of a fully populated node, all base leaves being EMPTY_HASH.
    fn full_hash(seq_no: u64, level: u64) -> Hash {
        if level == 0 {
            return empty_hash();
        }
        let half = 1u64 << (level - 1);
        hash_children(
            level,
            seq_no,
            &full_hash(seq_no, level - 1),
            &full_hash(seq_no + half, level - 1),
        )
    }

    #[test]
    fn fill_base_subtree_at_origin() {
        let mut subtree = SubTreeBinary::new(logger_name(), index(0, 5)).unwrap();
        assert_eq!(subtree.min_seq_no(), 0);
        assert_eq!(subtree.max_seq_no(), 32);
        assert_eq!(subtree.leaf_level(), 0);
        assert_eq!(subtree.next_leaf_seq_no(), 0);

        let mut completions = 0;
        let mut updates = 0;
        for i in 0..32 {
            assert!(!subtree.is_full());
            let mut events = Vec::new();
            assert!(subtree.add_leaf(leaf(i, 0, i + 1, empty_hash()), &mut events));
            assert_eq!(subtree.next_leaf_seq_no(), i + 1);
            for event in events {
                match event {
                    TreeEvent::RootUpdated {
                        next_leaf_seq_no, ..
                    } => {
                        assert_eq!(next_leaf_seq_no, i + 1);
                        updates += 1;
                    }
                    TreeEvent::Completed { index } => {
                        assert_eq!(index, subtree.peak_index());
                        completions += 1;
                    }
                }
            }
        }

        assert!(subtree.is_full());
        assert_eq!(updates, 32);
        assert_eq!(completions, 1);
        assert_eq!(
            subtree.root_hash().unwrap(),
            hex!("989551ef13ce660c1c5ccdda770f4769966a6faf83722c91dfeac597c6fa2782")
        );
    }

    #[test]
    fn fill_base_subtree_at_offset() {
        let mut subtree = SubTreeBinary::new(logger_name(), index(32, 5)).unwrap();
        assert_eq!(subtree.min_seq_no(), 32);
        assert_eq!(subtree.max_seq_no(), 64);
        assert_eq!(subtree.next_leaf_seq_no(), 32);

        let mut events = Vec::new();
        for i in 32..64 {
            assert!(!subtree.is_full());
            assert!(subtree.add_leaf(leaf(i, 0, i + 1, empty_hash()), &mut events));
        }
        assert!(subtree.is_full());
        assert_eq!(
            subtree.root_hash().unwrap(),
            hex!("2657cd81c3acb8eb4489f0a2559d42532644ce737ae494f49f30452f47bcff53")
        );
    }

    #[test]
    fn fill_upper_tier_subtree() {
        let mut subtree = SubTreeBinary::new(logger_name(), index(0, 10)).unwrap();
        assert_eq!(subtree.leaf_level(), 5);
        assert_eq!(subtree.max_seq_no(), 1024);

        let mut events = Vec::new();
        for i in (0..1024).step_by(32) {
            assert!(!subtree.is_full());
            assert!(subtree.add_leaf(leaf(i, 5, i + 32, full_hash(i, 5)), &mut events));
            assert_eq!(subtree.next_leaf_seq_no(), i + 32);
        }
        assert!(subtree.is_full());
        assert_eq!(
            subtree.root_hash().unwrap(),
            hex!("dc138a319c197bc4ede89902ed9b46e4e17d732b5ace9fa3b8a398db5edb1e36")
        );
    }

    #[test]
    fn mix_add_and_update_leaf() {
        let mut events = Vec::new();
        let mut subtree = SubTreeBinary::new(logger_name(), index(0, 10)).unwrap();

        // grow a child subtree at (32, 5) to obtain its successive roots
        let mut child = SubTreeBinary::new(logger_name(), index(32, 5)).unwrap();
        assert!(child.add_leaf(leaf(32, 0, 33, empty_hash()), &mut events));
        let child_root_33 = child.root_hash().unwrap();
        assert!(child.add_leaf(leaf(33, 0, 34, empty_hash()), &mut events));
        let child_root_34 = child.root_hash().unwrap();
        assert!(child.add_leaf(leaf(34, 0, 35, empty_hash()), &mut events));
        let child_root_35 = child.root_hash().unwrap();

        let node_0_5 = leaf(0, 5, 32, full_hash(0, 5));
        let node_32_5 = leaf(32, 5, 64, full_hash(32, 5));
        let node_64_5 = leaf(64, 5, 96, full_hash(64, 5));

        // out of order leaves are rejected
        assert!(!subtree.add_leaf(node_32_5.clone(), &mut events));
        assert!(subtree.add_leaf(node_0_5, &mut events));
        assert!(subtree.add_leaf(leaf(32, 5, 33, child_root_33), &mut events));
        assert!(subtree.update_leaf(34, child_root_34, &mut events));
        assert!(subtree.update_leaf(35, child_root_35, &mut events));
        // the partially filled slot blocks new leaves until it completes
        assert!(!subtree.add_leaf(node_32_5.clone(), &mut events));
        assert!(!subtree.add_leaf(node_64_5.clone(), &mut events));
        assert!(subtree.update_leaf(64, node_32_5.hash().unwrap(), &mut events));
        assert!(subtree.add_leaf(node_64_5, &mut events));

        for i in (96..1024).step_by(32) {
            assert!(!subtree.is_full());
            assert!(subtree.add_leaf(leaf(i, 5, i + 32, full_hash(i, 5)), &mut events));
        }
        assert!(subtree.is_full());
        assert_eq!(
            subtree.root_hash().unwrap(),
            hex!("dc138a319c197bc4ede89902ed9b46e4e17d732b5ace9fa3b8a398db5edb1e36")
        );
    }

    #[test]
    fn encode_complete_subtree_record() {
        let mut events = Vec::new();
        let mut subtree = SubTreeBinary::new(logger_name(), index(0, 5)).unwrap();
        for i in 0..32 {
            assert!(subtree.add_leaf(leaf(i, 0, i + 1, empty_hash()), &mut events));
        }

        let record = subtree.encode();
        assert_eq!(record.name().get(-2), Some(&b"complete"[..]));
        assert_eq!(record.freshness_ms(), None);
        assert_eq!(record.content(), empty_hash().repeat(32));

        let wire = record.encode();
        assert_eq!(wire.len(), 1139);
        let digest: [u8; 32] = Sha256::digest(&wire).into();
        assert_eq!(
            digest,
            hex!("835a3f369be7e19877092b10f116ea21c3c378290e677e88018928e2ee01954d")
        );

        let mut replay = Vec::new();
        let decoded = SubTreeBinary::decode(logger_name(), &record, &mut replay).unwrap();
        assert!(decoded.is_full());
        assert_eq!(decoded.root_hash(), subtree.root_hash());
        assert_eq!(decoded.peak_index(), index(0, 5));
    }

    // pending root subtree of tier 10 whose actual root sits at level 6,
    // covering 35 leaves; recorded wire from the reference implementation
    const PENDING_ROOT_RECORD: [u8; 172] = hex!(
        "06aa073908066c6f6767657208046e616d65080106080100080123082044b225
         9579998cd7d956c5223253d07ff00912d217548179fcad402f860ea2ef140419
         02ea601540989551ef13ce660c1c5ccdda770f4769966a6faf83722c91dfeac5
         97c6fa2782f8305d94fa23e24908735ac22234a1fdc446ec077c6ca27e517068
         a9bbc6568916031b01001720ad00ce0b31069dee902803be3fcc0ad61b3ef626
         07639bdfb95e82d4b0cec09f"
    );

    #[test]
    fn encode_pending_root_record() {
        let mut events = Vec::new();
        let mut subtree = SubTreeBinary::new(logger_name(), index(0, 10)).unwrap();

        let mut child = SubTreeBinary::new(logger_name(), index(32, 5)).unwrap();
        assert!(child.add_leaf(leaf(32, 0, 33, empty_hash()), &mut events));
        let child_root_33 = child.root_hash().unwrap();
        assert!(child.add_leaf(leaf(33, 0, 34, empty_hash()), &mut events));
        let child_root_34 = child.root_hash().unwrap();
        assert!(child.add_leaf(leaf(34, 0, 35, empty_hash()), &mut events));
        let child_root_35 = child.root_hash().unwrap();

        assert!(subtree.add_leaf(leaf(0, 5, 32, full_hash(0, 5)), &mut events));
        assert!(subtree.add_leaf(leaf(32, 5, 33, child_root_33), &mut events));
        assert!(subtree.update_leaf(34, child_root_34, &mut events));
        assert!(subtree.update_leaf(35, child_root_35, &mut events));

        let record = subtree.encode();
        assert_eq!(record.name().get_number(-2).unwrap(), 35);
        assert_eq!(record.freshness_ms(), Some(INCOMPLETE_FRESHNESS_MS));
        assert_eq!(record.content().len(), 64);
        assert_eq!(record.encode(), PENDING_ROOT_RECORD);
    }

    #[test]
    fn decode_pending_root_record() {
        let record = Record::decode(&PENDING_ROOT_RECORD).unwrap();
        let mut events = Vec::new();
        let mut subtree = SubTreeBinary::decode(logger_name(), &record, &mut events).unwrap();

        // the name says level 6; the enclosing peak is one tier up
        assert_eq!(subtree.peak_index(), index(0, 10));
        assert_eq!(subtree.next_leaf_seq_no(), 35);

        assert!(subtree.update_leaf(64, full_hash(32, 5), &mut events));
        for i in (64..1024).step_by(32) {
            assert!(!subtree.is_full());
            assert!(subtree.add_leaf(leaf(i, 5, i + 32, full_hash(i, 5)), &mut events));
        }
        assert!(subtree.is_full());
        assert_eq!(
            subtree.root_hash().unwrap(),
            hex!("dc138a319c197bc4ede89902ed9b46e4e17d732b5ace9fa3b8a398db5edb1e36")
        );
    }

    // canonical empty record for peak (0, 5)
    const EMPTY_RECORD: [u8; 107] = hex!(
        "0669073908066c6f6767657208046e616d650801050801000801000820e3b0c4
         4298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855140319
         0100150016031b01001720423d4bb2e824d3f6b720698f70b39ffbdf7105ddcf
         dc4d08bb222e891a81efce"
    );

    #[test]
    fn encode_empty_record() {
        let subtree = SubTreeBinary::new(logger_name(), index(0, 5)).unwrap();
        let record = subtree.encode();
        assert_eq!(record.name().get_number(-2).unwrap(), 0);
        assert_eq!(record.freshness_ms(), Some(0));
        assert!(record.content().is_empty());
        assert_eq!(record.encode(), EMPTY_RECORD);
    }

    #[test]
    fn decode_empty_record() {
        let record = Record::decode(&EMPTY_RECORD).unwrap();
        let mut events = Vec::new();
        let mut subtree = SubTreeBinary::decode(logger_name(), &record, &mut events).unwrap();
        assert!(subtree.root().is_none());
        assert_eq!(subtree.peak_index(), index(0, 5));
        assert_eq!(subtree.leaf_level(), 0);
        assert!(!subtree.is_full());

        for i in 0..32 {
            assert!(subtree.add_leaf(leaf(i, 0, i + 1, empty_hash()), &mut events));
        }
        assert!(subtree.is_full());
        assert_eq!(
            subtree.root_hash().unwrap(),
            hex!("989551ef13ce660c1c5ccdda770f4769966a6faf83722c91dfeac597c6fa2782")
        );
    }

    #[test]
    fn decode_rejects_foreign_logger() {
        let record = Record::decode(&EMPTY_RECORD).unwrap();
        let mut events = Vec::new();
        assert!(matches!(
            SubTreeBinary::decode(Name::from_uri("/other"), &record, &mut events),
            Err(DecodeError::LoggerPrefix)
        ));
    }

    #[test]
    fn decode_rejects_tampered_root_hash() {
        let mut events = Vec::new();
        let mut subtree = SubTreeBinary::new(logger_name(), index(0, 5)).unwrap();
        for i in 0..3 {
            assert!(subtree.add_leaf(leaf(i, 0, i + 1, empty_hash()), &mut events));
        }
        let good = subtree.encode();

        // corrupt the last leaf hash in the content
        let mut content = good.content().to_vec();
        let last = content.len() - 1;
        content[last] ^= 0xff;
        let bad = Record::new(good.name().clone(), good.freshness_ms(), content);
        assert!(matches!(
            SubTreeBinary::decode(logger_name(), &bad, &mut events),
            Err(DecodeError::InconsistentHash)
        ));
    }

    #[test]
    fn peak_index_conversion() {
        let cases = [
            ((0, 0), true, (0, 5)),
            ((0, 1), true, (0, 5)),
            ((0, 5), false, (0, 5)),
            ((0, 5), true, (0, 10)),
            ((1, 0), true, (0, 5)),
            ((2, 1), true, (0, 5)),
            ((32, 0), true, (32, 5)),
            ((32, 1), true, (32, 5)),
            ((32, 5), false, (32, 5)),
            ((32, 5), true, (0, 10)),
            ((33, 0), true, (32, 5)),
            ((34, 1), true, (32, 5)),
        ];
        for ((seq_no, level), not_root, (peak_seq, peak_level)) in cases {
            assert_eq!(
                SubTreeBinary::to_sub_tree_peak_index(index(seq_no, level), not_root),
                index(peak_seq, peak_level),
                "peak of ({seq_no}, {level}) not_root={not_root}"
            );
        }
    }

    use crate::tree::testing::partial_hash;

    #[test]
    fn partial_hash_matches_incremental_fill() {
        let mut events = Vec::new();
        let mut subtree = SubTreeBinary::new(logger_name(), index(0, 5)).unwrap();
        for i in 0..5 {
            assert!(subtree.add_leaf(leaf(i, 0, i + 1, empty_hash()), &mut events));
        }
        // actual root sits at level 3 and covers the five leaves
        assert_eq!(subtree.root().unwrap().index(), index(0, 3));
        assert_eq!(subtree.root_hash(), partial_hash(0, 3, 5));
    }
}
