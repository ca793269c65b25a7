//! Hierarchical names.
//!
//! A name is an ordered list of opaque byte components, written `/a/b/c`.
//! Record names interleave text components with encoded sequence numbers and
//! raw hash bytes.

use std::fmt;

use crate::tlv::{self, DecodeError, Reader};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<Vec<u8>>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `/`-separated URI; empty segments are skipped.
    pub fn from_uri(uri: &str) -> Self {
        let components = uri
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.as_bytes().to_vec())
            .collect();
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns a component by position; negative positions count from the
    /// end, so `get(-1)` is the last component.
    pub fn get(&self, pos: isize) -> Option<&[u8]> {
        let index = if pos < 0 {
            self.components.len().checked_sub(pos.unsigned_abs())?
        } else {
            pos as usize
        };
        self.components.get(index).map(Vec::as_slice)
    }

    /// Decodes the component at `pos` as a non-negative integer.
    pub fn get_number(&self, pos: isize) -> Result<u64, DecodeError> {
        let component = self.get(pos).ok_or(DecodeError::Truncated)?;
        tlv::nni_decode(component)
    }

    pub fn append(&mut self, component: impl Into<Vec<u8>>) -> &mut Self {
        self.components.push(component.into());
        self
    }

    /// Appends a component holding the canonical integer encoding.
    pub fn append_number(&mut self, value: u64) -> &mut Self {
        self.components.push(tlv::nni_encode(value));
        self
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        other.components.len() >= self.components.len()
            && self.components == other.components[..self.components.len()]
    }

    /// Returns a copy of this name with one more text component.
    pub fn child(&self, component: &str) -> Name {
        let mut name = self.clone();
        name.append(component.as_bytes().to_vec());
        name
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut inner = Vec::new();
        for component in &self.components {
            tlv::write_tlv(&mut inner, tlv::NAME_COMPONENT, component);
        }
        tlv::write_tlv(out, tlv::NAME, &inner);
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let name = Self::decode_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes("name"));
        }
        Ok(name)
    }

    pub fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let value = reader.expect_tlv(tlv::NAME)?;
        let mut inner = Reader::new(value);
        let mut components = Vec::new();
        while !inner.is_empty() {
            components.push(inner.expect_tlv(tlv::NAME_COMPONENT)?.to_vec());
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/")?;
            let printable = component
                .iter()
                .all(|&b| b.is_ascii_alphanumeric() || b"-._~".contains(&b));
            if printable && !component.is_empty() {
                // Safe to render directly; every byte is printable ASCII.
                write!(f, "{}", String::from_utf8_lossy(component))?;
            } else {
                write!(f, "%{}", hex::encode(component))?;
            }
        }
        Ok(())
    }
}
