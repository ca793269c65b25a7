//! Submission and query orchestration.
//!
//! `Logger` ties the forest engine, the store and the submission policy
//! together under one naming prefix. The network face, the signature
//! validator and key management live in the host; this module implements
//! the contracts the core states for them: validated submissions come in,
//! log responses and signed records go out.

use thiserror::Error;
use tracing::{info, warn};

use crate::common::config::{LoggerConfig, PolicyConfig};
use crate::leaf::{Leaf, LeafError};
use crate::name::Name;
use crate::record::Record;
use crate::response::{LoggerResponse, ResponseCode};
use crate::storage::{Db, StorageError};
use crate::tlv::DecodeError;
use crate::tree::merkle::{MerkleError, MerkleTree};
use crate::tree::node::{Hash, Index};
use crate::tree::subtree::SubTreeBinary;

/// Retry budget for the host's data fetch on the submission path: two
/// retries after the original attempt, then the submission is dropped
/// without a response.
pub const DATA_FETCH_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Leaf(#[from] LeafError),

    #[error("cannot append signer entry at sequence number {0}")]
    SignerEntryRejected(u64),
}

/// Submission-policy seam. The rules engine itself is a collaborator; the
/// core only requires a verdict for the fetched data object against the
/// signer's log entry.
pub trait Policy {
    fn check(&self, data_timestamp: u64, data_name: &Name, signer: &Leaf) -> bool;
}

/// Default policy: the submission must not predate the signer's entry, and
/// the data name must fall under one of the allowed prefixes (any, when the
/// list is empty).
pub struct TimestampPolicy {
    allowed_prefixes: Vec<Name>,
}

impl TimestampPolicy {
    pub fn new(allowed_prefixes: Vec<Name>) -> Self {
        Self { allowed_prefixes }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(
            config
                .allowed_prefixes
                .iter()
                .map(|uri| Name::from_uri(uri))
                .collect(),
        )
    }
}

impl Policy for TimestampPolicy {
    fn check(&self, data_timestamp: u64, data_name: &Name, signer: &Leaf) -> bool {
        if data_timestamp < signer.timestamp() {
            return false;
        }
        self.allowed_prefixes.is_empty()
            || self
                .allowed_prefixes
                .iter()
                .any(|prefix| prefix.is_prefix_of(data_name))
    }
}

/// A validated log request, as handed over by the host after it fetched the
/// named data object. `payload` carries the object's record bytes when the
/// object is a signer certificate.
#[derive(Debug, Clone)]
pub struct Submission {
    pub data_name: Name,
    pub signer_seq_no: u64,
    pub timestamp: u64,
    pub payload: Option<Vec<u8>>,
}

impl Submission {
    /// Stamps the submission with the time of arrival.
    pub fn new(data_name: Name, signer_seq_no: u64) -> Self {
        Self {
            data_name,
            signer_seq_no,
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            payload: None,
        }
    }
}

pub struct Logger {
    tree_prefix: Name,
    leaf_prefix: Name,
    log_prefix: Name,
    db: Db,
    merkle_tree: MerkleTree,
    policy: Box<dyn Policy>,
}

impl Logger {
    /// Opens the store under the configured directory and restores the
    /// forest.
    pub fn new(config: &LoggerConfig, policy: Box<dyn Policy>) -> Result<Self, LoggerError> {
        let db = Db::open(&config.db_dir)?;
        Self::with_db(Name::from_uri(&config.logger_name), db, policy)
    }

    /// Builds a logger on an already opened store.
    pub fn with_db(logger_name: Name, db: Db, policy: Box<dyn Policy>) -> Result<Self, LoggerError> {
        let tree_prefix = logger_name.child("tree");
        let leaf_prefix = logger_name.child("leaf");
        let log_prefix = logger_name.child("log");
        let merkle_tree = MerkleTree::new(tree_prefix.clone(), db.clone())?;
        Ok(Self {
            tree_prefix,
            leaf_prefix,
            log_prefix,
            db,
            merkle_tree,
            policy,
        })
    }

    pub fn tree_prefix(&self) -> &Name {
        &self.tree_prefix
    }

    pub fn leaf_prefix(&self) -> &Name {
        &self.leaf_prefix
    }

    /// Prefix under which the host accepts log-submission requests.
    pub fn log_prefix(&self) -> &Name {
        &self.log_prefix
    }

    pub fn next_leaf_seq_no(&self) -> u64 {
        self.merkle_tree.next_leaf_seq_no()
    }

    pub fn root_hash(&self) -> Option<Hash> {
        self.merkle_tree.root_hash()
    }

    /// Logs a self-signed signer certificate, bootstrapping a signing chain
    /// (`signer_seq_no == data_seq_no`). The host verifies the self
    /// signature before calling.
    pub fn add_signer_entry(
        &mut self,
        data_name: Name,
        timestamp: u64,
        cert: &[u8],
    ) -> Result<u64, LoggerError> {
        let data_seq_no = self.merkle_tree.next_leaf_seq_no();
        let mut leaf = Leaf::new(data_name, timestamp, data_seq_no, data_seq_no)?;
        leaf.set_logger_name(self.leaf_prefix.clone());

        if !self.merkle_tree.add_leaf(data_seq_no, leaf.hash())? {
            return Err(LoggerError::SignerEntryRejected(data_seq_no));
        }
        self.db.insert_leaf_data(&leaf, Some(cert))?;
        info!(data_seq_no, name = %leaf.data_name(), "logged signer entry");
        Ok(data_seq_no)
    }

    /// Handles a validated submission. Returns `Ok(None)` when the request
    /// names an unusable signer entry (no response is sent, matching the
    /// silent drop on fetch timeout); otherwise the response to publish.
    pub fn log_submission(
        &mut self,
        submission: &Submission,
    ) -> Result<Option<LoggerResponse>, LoggerError> {
        let Some((signer_leaf, signer_cert)) = self.db.get_leaf(submission.signer_seq_no)? else {
            return Ok(None);
        };
        let Some(signer_cert) = signer_cert else {
            return Ok(None);
        };

        if Record::decode(&signer_cert).is_err() {
            warn!(
                signer_seq_no = submission.signer_seq_no,
                "stored signer certificate does not parse"
            );
            return Ok(Some(LoggerResponse::reject(
                ResponseCode::SignerError,
                "signer is wrong",
            )));
        }

        if !self
            .policy
            .check(submission.timestamp, &submission.data_name, &signer_leaf)
        {
            warn!(name = %submission.data_name, "submission failed policy checking");
            return Ok(Some(LoggerResponse::reject(
                ResponseCode::PolicyError,
                "cannot pass policy checking",
            )));
        }

        let data_seq_no = self.merkle_tree.next_leaf_seq_no();
        let mut leaf = match Leaf::new(
            submission.data_name.clone(),
            submission.timestamp,
            data_seq_no,
            submission.signer_seq_no,
        ) {
            Ok(leaf) => leaf,
            Err(_) => {
                return Ok(Some(LoggerResponse::reject(
                    ResponseCode::TreeError,
                    "cannot add leaf",
                )))
            }
        };
        leaf.set_logger_name(self.leaf_prefix.clone());

        if !self.merkle_tree.add_leaf(data_seq_no, leaf.hash())? {
            return Ok(Some(LoggerResponse::reject(
                ResponseCode::TreeError,
                "cannot add leaf",
            )));
        }
        self.db
            .insert_leaf_data(&leaf, submission.payload.as_deref())?;
        info!(data_seq_no, name = %leaf.data_name(), "logged submission");
        Ok(Some(LoggerResponse::accept(data_seq_no)))
    }

    /// Answers a subtree query `<logger>/tree/<level>/<seq_no>`: the pending
    /// record if it matches, else the stored one. Malformed queries are
    /// dropped.
    pub fn on_tree_request(&self, request: &Name) -> Result<Option<Record>, LoggerError> {
        if !self.tree_prefix.is_prefix_of(request)
            || request.len() < self.tree_prefix.len() + 2
        {
            return Ok(None);
        }
        let level_offset = self.tree_prefix.len() as isize;
        let Ok(level) = request.get_number(level_offset) else {
            return Ok(None);
        };
        let Ok(seq_no) = request.get_number(level_offset + 1) else {
            return Ok(None);
        };
        let Ok(node_index) = Index::new(seq_no, level) else {
            return Ok(None);
        };
        let peak = SubTreeBinary::to_sub_tree_peak_index(node_index, false);

        if let Some(record) = self.merkle_tree.pending_sub_tree_data(peak.level()) {
            if request.is_prefix_of(record.name()) {
                return Ok(Some(record));
            }
        }

        if let Some(bytes) = self.db.get_sub_tree_data(peak.level(), peak.seq_no())? {
            let record = Record::decode(&bytes)?;
            if request.is_prefix_of(record.name()) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Answers a leaf query `<logger>/leaf/<seq_no>[/<hash>]`. A present
    /// hash component must match the stored leaf.
    pub fn on_leaf_request(&self, request: &Name) -> Result<Option<Record>, LoggerError> {
        if !self.leaf_prefix.is_prefix_of(request)
            || request.len() < self.leaf_prefix.len() + 1
        {
            return Ok(None);
        }
        let seq_no_offset = self.leaf_prefix.len() as isize;
        let Ok(seq_no) = request.get_number(seq_no_offset) else {
            return Ok(None);
        };

        let Some((mut leaf, _)) = self.db.get_leaf(seq_no)? else {
            return Ok(None);
        };

        if request.len() > self.leaf_prefix.len() + 1 {
            match request.get(seq_no_offset + 1) {
                Some(requested_hash) if requested_hash == leaf.hash() => {}
                _ => return Ok(None),
            }
        }

        leaf.set_logger_name(self.leaf_prefix.clone());
        Ok(Some(leaf.to_record()))
    }

    /// Wraps a response into a record named by the request, ready for the
    /// host to publish.
    pub fn make_log_response(&self, request_name: Name, response: &LoggerResponse) -> Record {
        Record::new(request_name, None, response.to_wire())
    }

    /// Subtree records proving the existence of leaf `seq_no` under the
    /// current root.
    pub fn get_existence_proof(&self, seq_no: u64) -> Result<Vec<Record>, LoggerError> {
        Ok(self.merkle_tree.get_existence_proof(seq_no)?)
    }

    /// Subtree records tying the root published at `old_next_seq_no` leaves
    /// into the current tree.
    pub fn get_consistency_proof(&self, old_next_seq_no: u64) -> Result<Vec<Record>, LoggerError> {
        Ok(self.merkle_tree.get_consistency_proof(old_next_seq_no)?)
    }

    /// Persists the pending spine, for shutdown or on demand.
    pub fn save_pending_tree(&mut self) -> Result<(), LoggerError> {
        Ok(self.merkle_tree.save_pending_tree()?)
    }
}
