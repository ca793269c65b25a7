//! Stateless proof verification.
//!
//! An auditor receives a bag of subtree records and checks, with no access
//! to the logger's store, that a leaf exists under a published root
//! (`does_exist`) or that a newer root extends an older one
//! (`is_consistent`). Every failure mode, from malformed records to missing
//! nodes, yields a negative result; these functions never panic.

use std::collections::BTreeMap;

use crate::name::Name;
use crate::record::Record;
use crate::tree::node::{empty_hash, hash_children, Hash, Index};
use crate::tree::subtree::{SubTreeBinary, SUB_TREE_DEPTH};

/// Parses proof records into subtrees keyed by peak index. Returns `None`
/// when any record is malformed or two records claim the same peak.
pub fn load_proof(proofs: &[Record], logger_name: &Name) -> Option<BTreeMap<Index, SubTreeBinary>> {
    let mut trees = BTreeMap::new();
    for proof in proofs {
        let mut events = Vec::new();
        let subtree = SubTreeBinary::decode(logger_name.clone(), proof, &mut events).ok()?;
        let peak = subtree.peak_index();
        if trees.insert(peak, subtree).is_some() {
            return None;
        }
    }
    Some(trees)
}

/// Checks that the leaf at `leaf_seq_no` with `leaf_hash` is covered by the
/// root hash published for a log of `root_next_seq_no` leaves, using only
/// nodes found in `proofs`.
pub fn does_exist(
    leaf_seq_no: u64,
    leaf_hash: &Hash,
    root_next_seq_no: u64,
    root_hash: &Hash,
    proofs: &[Record],
    logger_name: &Name,
) -> bool {
    let Some(trees) = load_proof(proofs, logger_name) else {
        return false;
    };
    if root_next_seq_no == 0 || leaf_seq_no >= root_next_seq_no {
        return false;
    }

    // smallest root level covering the published population
    let mut root_level = 0u64;
    let mut remaining = root_next_seq_no - 1;
    while remaining != 0 {
        root_level += 1;
        remaining >>= 1;
    }

    if root_level == 0 {
        // single-node log: the leaf is the root
        if leaf_seq_no != 0 {
            return false;
        }
        let base_peak = Index::aligned(0, SUB_TREE_DEPTH - 1);
        let Some(subtree) = trees.get(&base_peak) else {
            return false;
        };
        return match subtree.node(&Index::aligned(0, 0)).and_then(|n| n.hash()) {
            Some(hash) => hash == *leaf_hash && leaf_hash == root_hash,
            None => false,
        };
    }

    let mut child_seq_mask = 1u64;
    let mut child_seq_no = leaf_seq_no;
    let mut child_level = 0u64;
    let mut child_hash = *leaf_hash;

    let mut parent_seq_mask = !0u64 << 1;
    let mut parent_seq_no = child_seq_no & parent_seq_mask;
    let mut parent_level = 1u64;

    let mut tree_peak: Option<Index> = None;
    let mut subtree: Option<&SubTreeBinary> = None;

    loop {
        let peak =
            SubTreeBinary::to_sub_tree_peak_index(Index::aligned(child_seq_no, child_level), true);
        if tree_peak != Some(peak) {
            tree_peak = Some(peak);
            subtree = trees.get(&peak);
            if subtree.is_none() {
                return false;
            }
        }
        let Some(tree) = subtree else {
            return false;
        };

        if child_seq_mask & leaf_seq_no != 0 {
            // right child: the left sibling must be in the proofs
            let left_idx = Index::aligned(parent_seq_no, child_level);
            let Some(left_hash) = tree.node(&left_idx).and_then(|n| n.hash()) else {
                return false;
            };
            child_hash = hash_children(parent_level, parent_seq_no, &left_hash, &child_hash);
        } else {
            // left child: the right sibling is EMPTY_HASH past the
            // published population
            let sibling_bound = child_seq_no.checked_add(1u64 << child_level);
            let right_hash = match sibling_bound {
                Some(bound) if root_next_seq_no > bound => {
                    let right_idx = Index::aligned(bound, child_level);
                    match tree.node(&right_idx).and_then(|n| n.hash()) {
                        Some(hash) => hash,
                        None => return false,
                    }
                }
                _ => empty_hash(),
            };
            child_hash = hash_children(parent_level, parent_seq_no, &child_hash, &right_hash);
        }

        child_seq_mask <<= 1;
        child_seq_no = parent_seq_no;
        child_level = parent_level;

        parent_seq_mask <<= 1;
        parent_seq_no = child_seq_no & parent_seq_mask;
        parent_level += 1;

        if child_level >= root_level {
            break;
        }
    }

    child_hash == *root_hash
}

/// Checks that the log state published as `(new_next_seq_no, new_hash)`
/// extends the older state `(old_next_seq_no, old_hash)` without rewriting
/// history. The proofs must cover the boundary leaf `old_next_seq_no - 1`
/// under both roots.
pub fn is_consistent(
    old_next_seq_no: u64,
    old_hash: &Hash,
    new_next_seq_no: u64,
    new_hash: &Hash,
    proofs: &[Record],
    logger_name: &Name,
) -> bool {
    if old_next_seq_no > new_next_seq_no || old_next_seq_no == 0 {
        return false;
    }

    let Some(trees) = load_proof(proofs, logger_name) else {
        return false;
    };

    // locate the boundary leaf in its base subtree
    let leaf_seq_no = old_next_seq_no - 1;
    let base_peak = Index::aligned(leaf_seq_no, SUB_TREE_DEPTH - 1);
    let Some(base) = trees.get(&base_peak) else {
        return false;
    };
    let Some(leaf_hash) = base
        .node(&Index::aligned(leaf_seq_no, 0))
        .and_then(|n| n.hash())
    else {
        return false;
    };

    if !does_exist(
        leaf_seq_no,
        &leaf_hash,
        old_next_seq_no,
        old_hash,
        proofs,
        logger_name,
    ) {
        return false;
    }

    if old_next_seq_no == new_next_seq_no {
        return old_hash == new_hash;
    }

    does_exist(
        leaf_seq_no,
        &leaf_hash,
        new_next_seq_no,
        new_hash,
        proofs,
        logger_name,
    )
}
