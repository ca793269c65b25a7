//! Submission results.

use std::fmt;

use crate::tlv::{self, DecodeError, Reader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Accept = 0,
    TreeError = 1,
    PolicyError = 2,
    SignerError = 3,
}

impl ResponseCode {
    pub fn from_u64(code: u64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(Self::Accept),
            1 => Ok(Self::TreeError),
            2 => Ok(Self::PolicyError),
            3 => Ok(Self::SignerError),
            other => Err(DecodeError::UnexpectedType {
                expected: 0,
                found: other,
            }),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Accept => "accept",
            Self::TreeError => "tree error",
            Self::PolicyError => "policy error",
            Self::SignerError => "signer error",
        };
        write!(f, "{text}")
    }
}

/// The answer to a log submission: the assigned sequence number on accept,
/// a code and message on reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerResponse {
    code: ResponseCode,
    data_seq_no: u64,
    msg: String,
}

impl LoggerResponse {
    pub fn accept(data_seq_no: u64) -> Self {
        Self {
            code: ResponseCode::Accept,
            data_seq_no,
            msg: String::new(),
        }
    }

    pub fn reject(code: ResponseCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            data_seq_no: 0,
            msg: msg.into(),
        }
    }

    pub fn code(&self) -> ResponseCode {
        self.code
    }

    pub fn is_accept(&self) -> bool {
        self.code == ResponseCode::Accept
    }

    pub fn data_seq_no(&self) -> u64 {
        self.data_seq_no
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut inner = Vec::new();
        tlv::write_nni_tlv(&mut inner, tlv::RESULT_CODE, self.code as u64);
        if self.code == ResponseCode::Accept {
            tlv::write_nni_tlv(&mut inner, tlv::DATA_SEQ_NO, self.data_seq_no);
        } else {
            tlv::write_tlv(&mut inner, tlv::RESULT_MSG, self.msg.as_bytes());
        }

        let mut out = Vec::new();
        tlv::write_tlv(&mut out, tlv::LOG_RESPONSE, &inner);
        out
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut outer = Reader::new(bytes);
        let value = outer.expect_tlv(tlv::LOG_RESPONSE)?;
        if !outer.is_empty() {
            return Err(DecodeError::TrailingBytes("log response"));
        }

        let mut reader = Reader::new(value);
        let code = ResponseCode::from_u64(tlv::nni_decode(reader.expect_tlv(tlv::RESULT_CODE)?)?)?;

        let mut response = Self {
            code,
            data_seq_no: 0,
            msg: String::new(),
        };
        if reader.is_empty() {
            return Ok(response);
        }

        let (typ, field) = reader.read_tlv()?;
        match typ {
            tlv::DATA_SEQ_NO => response.data_seq_no = tlv::nni_decode(field)?,
            tlv::RESULT_MSG => response.msg = String::from_utf8_lossy(field).into_owned(),
            other => {
                return Err(DecodeError::UnexpectedType {
                    expected: tlv::RESULT_MSG,
                    found: other,
                })
            }
        }
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes("log response"));
        }
        Ok(response)
    }
}
