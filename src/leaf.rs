//! Log leaves.
//!
//! A leaf records one accepted submission: the data name, the submission
//! timestamp, the assigned sequence number and the sequence number of the
//! signer's own log entry. Its SHA-256 hash over the canonical TLV form is
//! what enters the history tree.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::name::Name;
use crate::record::Record;
use crate::tlv::{self, DecodeError, Reader};
use crate::tree::node::Hash;

/// Number of name components a logger-leaf record appends to the leaf
/// prefix: sequence number and leaf hash.
const N_LOGGER_LEAF_SUFFIX: usize = 2;

const OFFSET_LEAF_HASH: isize = -1;
const OFFSET_LEAF_SEQ_NO: isize = -2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeafError {
    #[error("signer sequence number {signer_seq_no} exceeds data sequence number {data_seq_no}")]
    SignerAfterData {
        signer_seq_no: u64,
        data_seq_no: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    data_name: Name,
    timestamp: u64,
    data_seq_no: u64,
    signer_seq_no: u64,
    logger_name: Name,
}

impl Leaf {
    /// A submission can only be signed by a prior or self entry, so
    /// `signer_seq_no` must not exceed `data_seq_no` (equality marks a
    /// self-signed bootstrap entry).
    pub fn new(
        data_name: Name,
        timestamp: u64,
        data_seq_no: u64,
        signer_seq_no: u64,
    ) -> Result<Self, LeafError> {
        if data_seq_no < signer_seq_no {
            return Err(LeafError::SignerAfterData {
                signer_seq_no,
                data_seq_no,
            });
        }
        Ok(Self {
            data_name,
            timestamp,
            data_seq_no,
            signer_seq_no,
            logger_name: Name::new(),
        })
    }

    pub fn data_name(&self) -> &Name {
        &self.data_name
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn data_seq_no(&self) -> u64 {
        self.data_seq_no
    }

    pub fn signer_seq_no(&self) -> u64 {
        self.signer_seq_no
    }

    pub fn logger_name(&self) -> &Name {
        &self.logger_name
    }

    pub fn set_logger_name(&mut self, logger_name: Name) {
        self.logger_name = logger_name;
    }

    pub fn set_data_name(&mut self, data_name: Name) {
        self.data_name = data_name;
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Same bound as the constructor: the new sequence number must not fall
    /// behind the signer's.
    pub fn set_data_seq_no(&mut self, data_seq_no: u64) -> Result<(), LeafError> {
        if data_seq_no < self.signer_seq_no {
            return Err(LeafError::SignerAfterData {
                signer_seq_no: self.signer_seq_no,
                data_seq_no,
            });
        }
        self.data_seq_no = data_seq_no;
        Ok(())
    }

    pub fn set_signer_seq_no(&mut self, signer_seq_no: u64) -> Result<(), LeafError> {
        if self.data_seq_no < signer_seq_no {
            return Err(LeafError::SignerAfterData {
                signer_seq_no,
                data_seq_no: self.data_seq_no,
            });
        }
        self.signer_seq_no = signer_seq_no;
        Ok(())
    }

    /// Canonical TLV form: name, timestamp, data and signer sequence
    /// numbers inside a logger-leaf envelope.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut inner = Vec::new();
        self.data_name.encode(&mut inner);
        tlv::write_nni_tlv(&mut inner, tlv::TIMESTAMP, self.timestamp);
        tlv::write_nni_tlv(&mut inner, tlv::DATA_SEQ_NO, self.data_seq_no);
        tlv::write_nni_tlv(&mut inner, tlv::SIGNER_SEQ_NO, self.signer_seq_no);

        let mut out = Vec::new();
        tlv::write_tlv(&mut out, tlv::LOGGER_LEAF, &inner);
        out
    }

    /// Parses the canonical TLV form. The logger name is not part of the
    /// wire form and starts out empty.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut outer = Reader::new(bytes);
        let value = outer.expect_tlv(tlv::LOGGER_LEAF)?;
        if !outer.is_empty() {
            return Err(DecodeError::TrailingBytes("leaf"));
        }

        let mut reader = Reader::new(value);
        let data_name = Name::decode_from(&mut reader)?;
        let timestamp = tlv::nni_decode(reader.expect_tlv(tlv::TIMESTAMP)?)?;
        let data_seq_no = tlv::nni_decode(reader.expect_tlv(tlv::DATA_SEQ_NO)?)?;
        let signer_seq_no = tlv::nni_decode(reader.expect_tlv(tlv::SIGNER_SEQ_NO)?)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes("leaf"));
        }

        Self::new(data_name, timestamp, data_seq_no, signer_seq_no)
            .map_err(|_| DecodeError::SignerSeqNo)
    }

    /// The leaf hash entering the history tree.
    pub fn hash(&self) -> Hash {
        Sha256::digest(self.to_wire()).into()
    }

    /// Publishes the leaf as a signed record named
    /// `<logger>/<data_seq_no>/<leaf_hash>`.
    pub fn to_record(&self) -> Record {
        let hash = self.hash();
        let mut name = self.logger_name.clone();
        name.append_number(self.data_seq_no).append(hash.to_vec());
        Record::new(name, None, self.to_wire())
    }

    /// Parses a logger-leaf record, checking the name against the carried
    /// content.
    pub fn from_record(logger_name: &Name, record: &Record) -> Result<Self, DecodeError> {
        let name = record.name();
        if !logger_name.is_prefix_of(name) {
            return Err(DecodeError::LoggerPrefix);
        }
        if logger_name.len() + N_LOGGER_LEAF_SUFFIX != name.len() {
            return Err(DecodeError::NamingConvention("logger-leaf"));
        }

        let leaf_hash = name.get(OFFSET_LEAF_HASH).ok_or(DecodeError::Truncated)?;
        let data_seq_no = name.get_number(OFFSET_LEAF_SEQ_NO)?;

        let mut leaf = Self::from_wire(record.content())?;
        if leaf_hash != leaf.hash() {
            return Err(DecodeError::InconsistentHash);
        }
        if leaf.data_seq_no != data_seq_no {
            return Err(DecodeError::SeqNoRange);
        }
        leaf.logger_name = logger_name.clone();
        Ok(leaf)
    }
}
