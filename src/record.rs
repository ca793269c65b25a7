//! Signed records.
//!
//! A record is the unit served to and parsed by log clients: a named,
//! optionally freshness-bounded payload carrying a SHA-256 digest signature
//! over everything before the signature value.

use sha2::{Digest, Sha256};

use crate::name::Name;
use crate::tlv::{self, DecodeError, Reader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    name: Name,
    freshness_ms: Option<u64>,
    content: Vec<u8>,
    signature: [u8; 32],
}

impl Record {
    /// Builds a record and signs it with a SHA-256 digest.
    pub fn new(name: Name, freshness_ms: Option<u64>, content: Vec<u8>) -> Self {
        let mut record = Self {
            name,
            freshness_ms,
            content,
            signature: [0; 32],
        };
        record.signature = Sha256::digest(record.signed_portion()).into();
        record
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn freshness_ms(&self) -> Option<u64> {
        self.freshness_ms
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn signature(&self) -> &[u8; 32] {
        &self.signature
    }

    /// The bytes covered by the signature: name, meta info, content and
    /// signature info, in wire order.
    fn signed_portion(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.name.encode(&mut out);

        let mut meta = Vec::new();
        if let Some(ms) = self.freshness_ms {
            tlv::write_nni_tlv(&mut meta, tlv::FRESHNESS_PERIOD, ms);
        }
        tlv::write_tlv(&mut out, tlv::META_INFO, &meta);

        tlv::write_tlv(&mut out, tlv::CONTENT, &self.content);

        let mut sig_info = Vec::new();
        tlv::write_nni_tlv(&mut sig_info, tlv::SIGNATURE_TYPE, tlv::SIG_TYPE_DIGEST_SHA256);
        tlv::write_tlv(&mut out, tlv::SIGNATURE_INFO, &sig_info);

        out
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut inner = self.signed_portion();
        tlv::write_tlv(&mut inner, tlv::SIGNATURE_VALUE, &self.signature);

        let mut out = Vec::new();
        tlv::write_tlv(&mut out, tlv::RECORD, &inner);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut outer = Reader::new(bytes);
        let value = outer.expect_tlv(tlv::RECORD)?;
        if !outer.is_empty() {
            return Err(DecodeError::TrailingBytes("record"));
        }

        let mut reader = Reader::new(value);
        let name = Name::decode_from(&mut reader)?;

        let mut freshness_ms = None;
        if reader.peek_type() == Some(tlv::META_INFO) {
            let meta = reader.expect_tlv(tlv::META_INFO)?;
            let mut meta_reader = Reader::new(meta);
            while !meta_reader.is_empty() {
                let (typ, field) = meta_reader.read_tlv()?;
                if typ == tlv::FRESHNESS_PERIOD {
                    freshness_ms = Some(tlv::nni_decode(field)?);
                }
            }
        }

        let mut content = Vec::new();
        if reader.peek_type() == Some(tlv::CONTENT) {
            content = reader.expect_tlv(tlv::CONTENT)?.to_vec();
        }

        let sig_info = reader.expect_tlv(tlv::SIGNATURE_INFO)?;
        let mut sig_reader = Reader::new(sig_info);
        let sig_type = tlv::nni_decode(sig_reader.expect_tlv(tlv::SIGNATURE_TYPE)?)?;
        if sig_type != tlv::SIG_TYPE_DIGEST_SHA256 {
            return Err(DecodeError::UnexpectedType {
                expected: tlv::SIG_TYPE_DIGEST_SHA256,
                found: sig_type,
            });
        }

        let sig_value = reader.expect_tlv(tlv::SIGNATURE_VALUE)?;
        if sig_value.len() != 32 {
            return Err(DecodeError::HashSize(sig_value.len()));
        }
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes("record"));
        }

        let mut signature = [0u8; 32];
        signature.copy_from_slice(sig_value);

        Ok(Self {
            name,
            freshness_ms,
            content,
            signature,
        })
    }

    /// Checks the digest signature against the signed portion.
    pub fn verify_digest(&self) -> bool {
        let digest: [u8; 32] = Sha256::digest(self.signed_portion()).into();
        digest == self.signature
    }
}
