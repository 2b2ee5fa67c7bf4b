//! Message id to display name and payload decoder mapping.
//!
//! The set of telemetry kinds is closed: each [`TelemetryKind`] carries its
//! display name and, for result telemetry, a decoder together with the exact
//! record length that decoder requires. Result kinds of optional companion
//! applications only exist when their cargo feature is enabled.

use arrayvec::ArrayString;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

use crate::bounded::write_bounded;
use crate::mids;
use crate::msg::{MsgId, Record, TLM_HEADER_LEN};

pub const MAX_NAME_LEN: usize = 31;
pub const MAX_PAYLOAD_TEXT_LEN: usize = 127;
pub const MAX_DECODE_ENTRIES: usize = 32;
pub const UNKNOWN_NAME: &str = "unknown";

#[cfg(feature = "mxm")]
pub const MXM_RESULT_STR_LEN: usize = 64;
#[cfg(feature = "mxm")]
pub const MXM_RESULT_TLM_LEN: usize = TLM_HEADER_LEN + MXM_RESULT_STR_LEN;

#[cfg(feature = "huff")]
pub const HUFF_RESULT_STR_LEN: usize = 128;
#[cfg(feature = "huff")]
pub const HUFF_RESULT_TLM_LEN: usize = TLM_HEADER_LEN + HUFF_RESULT_STR_LEN;

pub type PayloadText = ArrayString<MAX_PAYLOAD_TEXT_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("result text is not valid UTF-8 after {valid_up_to} bytes")]
    InvalidText { valid_up_to: usize },
    #[error("record is {len} bytes, decoder reads exactly {expected}")]
    Length { len: usize, expected: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeTableError {
    #[error("duplicate decode entry for {0}")]
    Duplicate(MsgId),
    #[error("decode entry has invalid message id {0}")]
    InvalidMsgId(MsgId),
    #[error("display name for {msg_id} longer than 31 bytes: {name}")]
    NameTooLong { msg_id: MsgId, name: &'static str },
    #[error("decode table holds at most 32 entries")]
    Full,
}

type DecodeFn = fn(&Record<'_>, &mut PayloadText) -> Result<(), DecodeError>;

/// Payload decoder bound to the exact record length it can read.
#[derive(Clone, Copy)]
pub struct PayloadDecoder {
    expected_len: usize,
    decode: DecodeFn,
}

impl core::fmt::Debug for PayloadDecoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PayloadDecoder")
            .field("expected_len", &self.expected_len)
            .finish_non_exhaustive()
    }
}

impl PayloadDecoder {
    pub const fn new(expected_len: usize, decode: DecodeFn) -> Self {
        Self { expected_len, decode }
    }

    pub fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Writes whatever text could be extracted into `out`, even on error.
    /// A record of any other length than [`expected_len`](Self::expected_len)
    /// is not read and leaves `out` empty.
    pub fn decode(&self, record: &Record<'_>, out: &mut PayloadText) -> Result<(), DecodeError> {
        out.clear();
        if record.size() != self.expected_len {
            return Err(DecodeError::Length {
                len: record.size(),
                expected: self.expected_len,
            });
        }
        (self.decode)(record, out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetryKind {
    ToHk,
    EsHk,
    EvsHk,
    SbHk,
    TblHk,
    TimeHk,
    TimeDiag,
    SbStats,
    TblReg,
    EvsLongEvent,
    EsApp,
    EsMemStats,
    #[cfg(feature = "mxm")]
    MxmHk,
    #[cfg(feature = "mxm")]
    MxmRes,
    #[cfg(feature = "huff")]
    HuffHk,
    #[cfg(feature = "huff")]
    HuffRes,
}

impl TelemetryKind {
    pub const ALL: &'static [TelemetryKind] = &[
        TelemetryKind::ToHk,
        TelemetryKind::EsHk,
        TelemetryKind::EvsHk,
        TelemetryKind::SbHk,
        TelemetryKind::TblHk,
        TelemetryKind::TimeHk,
        TelemetryKind::TimeDiag,
        TelemetryKind::SbStats,
        TelemetryKind::TblReg,
        TelemetryKind::EvsLongEvent,
        TelemetryKind::EsApp,
        TelemetryKind::EsMemStats,
        #[cfg(feature = "mxm")]
        TelemetryKind::MxmHk,
        #[cfg(feature = "mxm")]
        TelemetryKind::MxmRes,
        #[cfg(feature = "huff")]
        TelemetryKind::HuffHk,
        #[cfg(feature = "huff")]
        TelemetryKind::HuffRes,
    ];

    pub fn from_msg_id(msg_id: MsgId) -> Option<Self> {
        match msg_id {
            mids::TO_HK_TLM_MID => Some(Self::ToHk),
            mids::ES_HK_TLM_MID => Some(Self::EsHk),
            mids::EVS_HK_TLM_MID => Some(Self::EvsHk),
            mids::SB_HK_TLM_MID => Some(Self::SbHk),
            mids::TBL_HK_TLM_MID => Some(Self::TblHk),
            mids::TIME_HK_TLM_MID => Some(Self::TimeHk),
            mids::TIME_DIAG_TLM_MID => Some(Self::TimeDiag),
            mids::SB_STATS_TLM_MID => Some(Self::SbStats),
            mids::TBL_REG_TLM_MID => Some(Self::TblReg),
            mids::EVS_LONG_EVENT_MSG_MID => Some(Self::EvsLongEvent),
            mids::ES_APP_TLM_MID => Some(Self::EsApp),
            mids::ES_MEMSTATS_TLM_MID => Some(Self::EsMemStats),
            #[cfg(feature = "mxm")]
            mids::MXM_HK_TLM_MID => Some(Self::MxmHk),
            #[cfg(feature = "mxm")]
            mids::MXM_RES_TLM_MID => Some(Self::MxmRes),
            #[cfg(feature = "huff")]
            mids::HUFF_HK_TLM_MID => Some(Self::HuffHk),
            #[cfg(feature = "huff")]
            mids::HUFF_RES_TLM_MID => Some(Self::HuffRes),
            _ => None,
        }
    }

    pub fn msg_id(self) -> MsgId {
        match self {
            Self::ToHk => mids::TO_HK_TLM_MID,
            Self::EsHk => mids::ES_HK_TLM_MID,
            Self::EvsHk => mids::EVS_HK_TLM_MID,
            Self::SbHk => mids::SB_HK_TLM_MID,
            Self::TblHk => mids::TBL_HK_TLM_MID,
            Self::TimeHk => mids::TIME_HK_TLM_MID,
            Self::TimeDiag => mids::TIME_DIAG_TLM_MID,
            Self::SbStats => mids::SB_STATS_TLM_MID,
            Self::TblReg => mids::TBL_REG_TLM_MID,
            Self::EvsLongEvent => mids::EVS_LONG_EVENT_MSG_MID,
            Self::EsApp => mids::ES_APP_TLM_MID,
            Self::EsMemStats => mids::ES_MEMSTATS_TLM_MID,
            #[cfg(feature = "mxm")]
            Self::MxmHk => mids::MXM_HK_TLM_MID,
            #[cfg(feature = "mxm")]
            Self::MxmRes => mids::MXM_RES_TLM_MID,
            #[cfg(feature = "huff")]
            Self::HuffHk => mids::HUFF_HK_TLM_MID,
            #[cfg(feature = "huff")]
            Self::HuffRes => mids::HUFF_RES_TLM_MID,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::ToHk => "TO_HK",
            Self::EsHk => "ES_HK",
            Self::EvsHk => "EVS_HK",
            Self::SbHk => "SB_HK",
            Self::TblHk => "TBL_HK",
            Self::TimeHk => "TIME_HK",
            Self::TimeDiag => "TIME_DIAG",
            Self::SbStats => "SB_STATS",
            Self::TblReg => "TBL_REG",
            Self::EvsLongEvent => "EVS_LONG_EVENT",
            Self::EsApp => "ES_APP",
            Self::EsMemStats => "ES_MEMSTATS",
            #[cfg(feature = "mxm")]
            Self::MxmHk => "MXM_HK",
            #[cfg(feature = "mxm")]
            Self::MxmRes => "MXM_RES",
            #[cfg(feature = "huff")]
            Self::HuffHk => "HUFF_HK",
            #[cfg(feature = "huff")]
            Self::HuffRes => "HUFF_RES",
        }
    }

    pub fn decoder(self) -> Option<PayloadDecoder> {
        match self {
            #[cfg(feature = "mxm")]
            Self::MxmRes => Some(PayloadDecoder::new(
                MXM_RESULT_TLM_LEN,
                decode_result_string::<MXM_RESULT_STR_LEN>,
            )),
            #[cfg(feature = "huff")]
            Self::HuffRes => Some(PayloadDecoder::new(
                HUFF_RESULT_TLM_LEN,
                decode_result_string::<HUFF_RESULT_STR_LEN>,
            )),
            _ => None,
        }
    }

    pub fn entry(self) -> DecodeEntry {
        DecodeEntry {
            msg_id: self.msg_id(),
            name: self.display_name(),
            decoder: self.decoder(),
        }
    }
}

const_assert!(TelemetryKind::ALL.len() <= MAX_DECODE_ENTRIES);

/// Result string embedded right after the telemetry header, `FIELD` bytes wide.
fn decode_result_string<const FIELD: usize>(
    record: &Record<'_>,
    out: &mut PayloadText,
) -> Result<(), DecodeError> {
    let payload = record.tlm_payload();
    message_string(&payload[..payload.len().min(FIELD)], out)
}

/// Copies a NUL- or length-delimited string field, at most
/// [`MAX_PAYLOAD_TEXT_LEN`] bytes. A multi-byte character cut by that cap is
/// dropped silently; any other invalid UTF-8 keeps the valid prefix and errors.
pub fn message_string(field: &[u8], out: &mut PayloadText) -> Result<(), DecodeError> {
    let end = field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(field.len())
        .min(MAX_PAYLOAD_TEXT_LEN);
    let bytes = &field[..end];

    let (text, result) = match core::str::from_utf8(bytes) {
        Ok(text) => (text, Ok(())),
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            let prefix = core::str::from_utf8(&bytes[..valid_up_to]).unwrap_or("");
            match e.error_len() {
                None => (prefix, Ok(())),
                Some(_) => (prefix, Err(DecodeError::InvalidText { valid_up_to })),
            }
        }
    };

    write_bounded(out, MAX_PAYLOAD_TEXT_LEN, format_args!("{}", text));
    result
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeEntry {
    pub msg_id: MsgId,
    pub name: &'static str,
    pub decoder: Option<PayloadDecoder>,
}

static UNKNOWN_ENTRY: DecodeEntry = DecodeEntry {
    msg_id: MsgId::INVALID,
    name: UNKNOWN_NAME,
    decoder: None,
};

/// Immutable lookup table, at most one entry per message id.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    entries: Vec<DecodeEntry, MAX_DECODE_ENTRIES>,
}

impl DecodeTable {
    /// Every telemetry kind compiled into this build.
    pub fn standard() -> Self {
        let mut entries = Vec::new();
        for kind in TelemetryKind::ALL {
            // Capacity is checked at compile time above.
            let _ = entries.push(kind.entry());
        }
        Self { entries }
    }

    pub fn with_entries<I>(entries: I) -> Result<Self, DecodeTableError>
    where
        I: IntoIterator<Item = DecodeEntry>,
    {
        let mut table = Vec::<DecodeEntry, MAX_DECODE_ENTRIES>::new();
        for entry in entries {
            if !entry.msg_id.is_valid() {
                return Err(DecodeTableError::InvalidMsgId(entry.msg_id));
            }
            if entry.name.len() > MAX_NAME_LEN {
                return Err(DecodeTableError::NameTooLong {
                    msg_id: entry.msg_id,
                    name: entry.name,
                });
            }
            if table.iter().any(|e| e.msg_id == entry.msg_id) {
                return Err(DecodeTableError::Duplicate(entry.msg_id));
            }
            table.push(entry).map_err(|_| DecodeTableError::Full)?;
        }
        Ok(Self { entries: table })
    }

    pub fn lookup(&self, msg_id: MsgId) -> Option<&DecodeEntry> {
        self.entries.iter().find(|e| e.msg_id == msg_id)
    }

    /// Like [`lookup`](Self::lookup), falling back to the "unknown" entry.
    pub fn resolve(&self, msg_id: MsgId) -> &DecodeEntry {
        self.lookup(msg_id).unwrap_or(&UNKNOWN_ENTRY)
    }

    pub fn entries(&self) -> &[DecodeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DecodeTable {
    fn default() -> Self {
        Self::standard()
    }
}
