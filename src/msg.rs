//! Software bus record layout.
//!
//! Every record starts with a 6-byte CCSDS primary header (big endian):
//!
//! ```text
//! ┌────────────────────┬─────────────────────┬─────────────────────┐
//! │ Stream id (2)      │ Sequence (2)        │ Length (2)          │
//! │ ver:3 type:1 sh:1  │ flags:2 count:14    │ total size - 7      │
//! │ apid:11            │                     │                     │
//! └────────────────────┴─────────────────────┴─────────────────────┘
//! ```
//!
//! Commands follow it with a 2-byte secondary header (function code, checksum),
//! telemetry with a 6-byte time stamp (seconds, 1/65536 subseconds).

use core::fmt;
use core::str::FromStr;

use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use thiserror::Error;

pub const PRIMARY_HEADER_LEN: usize = 6;
pub const CMD_SEC_HEADER_LEN: usize = 2;
pub const TLM_SEC_HEADER_LEN: usize = 6;
pub const CMD_HEADER_LEN: usize = PRIMARY_HEADER_LEN + CMD_SEC_HEADER_LEN;
pub const TLM_HEADER_LEN: usize = PRIMARY_HEADER_LEN + TLM_SEC_HEADER_LEN;
pub const MAX_RECORD_LEN: usize = 1024;

const_assert_eq!(CMD_HEADER_LEN, 8);
const_assert_eq!(TLM_HEADER_LEN, 12);

const LENGTH_FIELD_BIAS: usize = 7;
const MSG_ID_MASK: u16 = 0x1FFF;
const TYPE_CMD_BIT: u16 = 0x1000;
const SEC_HEADER_BIT: u16 = 0x0800;
const SEQ_FLAGS_UNSEGMENTED: u16 = 0xC000;
const SEQ_COUNT_MASK: u16 = 0x3FFF;
const FCN_CODE_MASK: u8 = 0x7F;
const FCN_CODE_OFFSET: usize = PRIMARY_HEADER_LEN;
const CHECKSUM_OFFSET: usize = PRIMARY_HEADER_LEN + 1;

/// Command function code, the low 7 bits of the command secondary header.
pub type FcnCode = u8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("record too short: {len} bytes, header needs 6")]
    TooShort { len: usize },
    #[error("record truncated: header declares {declared} bytes, buffer holds {actual}")]
    Truncated { declared: usize, actual: usize },
    #[error("record of {len} bytes exceeds the 1024 byte limit")]
    TooLarge { len: usize },
    #[error("not a telemetry record: 0x{0:04X}")]
    NotTelemetry(u32),
    #[error("invalid message id: {0}")]
    InvalidMsgId(String),
}

/// Bus message identifier, the stream id without the CCSDS version bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "MsgIdRepr", into = "u32")]
pub struct MsgId(u32);

impl MsgId {
    pub const INVALID: MsgId = MsgId(u32::MAX);
    pub const HIGHEST_VALID: u32 = MSG_ID_MASK as u32;

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 <= Self::HIGHEST_VALID
    }

    pub const fn is_command(self) -> bool {
        self.0 & TYPE_CMD_BIT as u32 != 0
    }

    /// Stream id word: the identifier bits unchanged, version bits zero.
    fn stream_id(self) -> Result<u16, MessageError> {
        if !self.is_valid() {
            return Err(MessageError::InvalidMsgId(self.to_string()));
        }
        Ok((self.0 & MSG_ID_MASK as u32) as u16)
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl From<MsgId> for u32 {
    fn from(id: MsgId) -> Self {
        id.0
    }
}

impl FromStr for MsgId {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => trimmed.parse::<u32>(),
        };
        parsed
            .map(MsgId)
            .map_err(|_| MessageError::InvalidMsgId(s.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MsgIdRepr {
    Number(u32),
    Text(String),
}

impl TryFrom<MsgIdRepr> for MsgId {
    type Error = MessageError;

    fn try_from(repr: MsgIdRepr) -> Result<Self, Self::Error> {
        match repr {
            MsgIdRepr::Number(value) => Ok(MsgId(value)),
            MsgIdRepr::Text(text) => text.parse(),
        }
    }
}

/// Telemetry secondary header time stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TlmTime {
    pub seconds: u32,
    pub subseconds: u16,
}

impl TlmTime {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            seconds: (ms / 1000) as u32,
            subseconds: ((ms % 1000) * 65536 / 1000) as u16,
        }
    }

    pub fn as_millis(&self) -> u64 {
        u64::from(self.seconds) * 1000 + u64::from(self.subseconds) * 1000 / 65536
    }

    fn to_bytes(self) -> [u8; TLM_SEC_HEADER_LEN] {
        let s = self.seconds.to_be_bytes();
        let ss = self.subseconds.to_be_bytes();
        [s[0], s[1], s[2], s[3], ss[0], ss[1]]
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn xor_all(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Borrowed view of one bus record, sliced to its declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    bytes: &'a [u8],
}

impl<'a> Record<'a> {
    /// Validates the primary header. Bytes past the declared size are ignored.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, MessageError> {
        if bytes.len() < PRIMARY_HEADER_LEN {
            return Err(MessageError::TooShort { len: bytes.len() });
        }

        let declared = usize::from(read_u16(bytes, 4)) + LENGTH_FIELD_BIAS;
        if bytes.len() < declared {
            return Err(MessageError::Truncated {
                declared,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            bytes: &bytes[..declared],
        })
    }

    pub fn msg_id(&self) -> MsgId {
        MsgId(u32::from(read_u16(self.bytes, 0) & MSG_ID_MASK))
    }

    /// Declared total size, header included.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn sequence_count(&self) -> u16 {
        read_u16(self.bytes, 2) & SEQ_COUNT_MASK
    }

    pub fn has_secondary_header(&self) -> bool {
        read_u16(self.bytes, 0) & SEC_HEADER_BIT != 0
    }

    pub fn is_command(&self) -> bool {
        read_u16(self.bytes, 0) & TYPE_CMD_BIT != 0
    }

    /// `None` unless this is a command carrying a secondary header.
    pub fn function_code(&self) -> Option<FcnCode> {
        if !self.is_command() || !self.has_secondary_header() || self.size() < CMD_HEADER_LEN {
            return None;
        }
        Some(self.bytes[FCN_CODE_OFFSET] & FCN_CODE_MASK)
    }

    pub fn checksum_valid(&self) -> bool {
        self.function_code().is_some() && xor_all(self.bytes) == 0xFF
    }

    pub fn time(&self) -> Option<TlmTime> {
        if self.is_command() || !self.has_secondary_header() || self.size() < TLM_HEADER_LEN {
            return None;
        }
        Some(TlmTime {
            seconds: u32::from_be_bytes([self.bytes[6], self.bytes[7], self.bytes[8], self.bytes[9]]),
            subseconds: read_u16(self.bytes, 10),
        })
    }

    /// Bytes following the telemetry header; empty for shorter records.
    pub fn tlm_payload(&self) -> &'a [u8] {
        self.bytes.get(TLM_HEADER_LEN..).unwrap_or(&[])
    }
}

/// Owned, bounded copy of a record, as held by bus pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBuf {
    bytes: Vec<u8, MAX_RECORD_LEN>,
}

impl RecordBuf {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MessageError> {
        let record = Record::parse(bytes)?;
        let bytes = Vec::from_slice(record.as_bytes())
            .map_err(|_| MessageError::TooLarge { len: record.size() })?;
        Ok(Self { bytes })
    }

    /// Builds a command with a valid checksum. The identifier is written as
    /// given, so its type and secondary header bits decide how it parses back.
    pub fn command(msg_id: MsgId, fcn_code: FcnCode, payload: &[u8]) -> Result<Self, MessageError> {
        let stream_id = msg_id.stream_id()?;
        let mut buf = Self::build(stream_id, &[fcn_code & FCN_CODE_MASK, 0], payload)?;
        let checksum = 0xFF ^ xor_all(&buf.bytes);
        buf.bytes[CHECKSUM_OFFSET] = checksum;
        Ok(buf)
    }

    pub fn telemetry(msg_id: MsgId, time: TlmTime, payload: &[u8]) -> Result<Self, MessageError> {
        let stream_id = msg_id.stream_id()?;
        Self::build(stream_id, &time.to_bytes(), payload)
    }

    fn build(stream_id: u16, sec_header: &[u8], payload: &[u8]) -> Result<Self, MessageError> {
        let total = PRIMARY_HEADER_LEN + sec_header.len() + payload.len();
        if total > MAX_RECORD_LEN {
            return Err(MessageError::TooLarge { len: total });
        }
        let length_field = total
            .checked_sub(LENGTH_FIELD_BIAS)
            .and_then(|n| u16::try_from(n).ok())
            .ok_or(MessageError::TooShort { len: total })?;

        let mut bytes: Vec<u8, MAX_RECORD_LEN> = Vec::new();
        let overflow = |_| MessageError::TooLarge { len: total };
        bytes.extend_from_slice(&stream_id.to_be_bytes()).map_err(overflow)?;
        bytes.extend_from_slice(&SEQ_FLAGS_UNSEGMENTED.to_be_bytes()).map_err(overflow)?;
        bytes.extend_from_slice(&length_field.to_be_bytes()).map_err(overflow)?;
        bytes.extend_from_slice(sec_header).map_err(overflow)?;
        bytes.extend_from_slice(payload).map_err(overflow)?;
        Ok(Self { bytes })
    }

    pub fn record(&self) -> Record<'_> {
        Record { bytes: &self.bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Rewrites the telemetry time stamp in place.
    pub fn set_time(&mut self, time: TlmTime) -> Result<(), MessageError> {
        let record = self.record();
        if record.time().is_none() {
            return Err(MessageError::NotTelemetry(record.msg_id().value()));
        }
        self.bytes[PRIMARY_HEADER_LEN..TLM_HEADER_LEN].copy_from_slice(&time.to_bytes());
        Ok(())
    }
}
