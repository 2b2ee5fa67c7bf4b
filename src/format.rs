//! Record to text line rendering.
//!
//! A line reads `<now_ms> <msgid, 4 hex digits> <name> <payload text>` and
//! never exceeds [`MAX_LINE_LEN`] bytes, leaving room for a terminator in
//! [`LINE_CAPACITY`]. Formatting cannot fail: a payload that cannot be
//! decoded is reported as an event and rendered empty.

use arrayvec::ArrayString;
use core::fmt;

use crate::bounded::{floor_char_boundary, write_bounded};
use crate::clock::TimeSource;
use crate::decode::{DecodeTable, PayloadText, MAX_NAME_LEN};
use crate::events::{EventId, EventSink};
use crate::msg::Record;

pub const LINE_CAPACITY: usize = 128;
pub const MAX_LINE_LEN: usize = LINE_CAPACITY - 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedLine {
    text: ArrayString<MAX_LINE_LEN>,
}

impl FormattedLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// NUL-terminated copy for sinks that want a C string.
    pub fn to_terminated(&self) -> [u8; LINE_CAPACITY] {
        let mut out = [0u8; LINE_CAPACITY];
        out[..self.text.len()].copy_from_slice(self.text.as_bytes());
        out
    }
}

impl fmt::Display for FormattedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for FormattedLine {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    /// Text length, terminator excluded.
    pub len: usize,
    pub truncated: bool,
    /// A decoder existed but its payload text could not be produced in full.
    pub payload_degraded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFormatter {
    table: DecodeTable,
}

impl RecordFormatter {
    pub fn new(table: DecodeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &DecodeTable {
        &self.table
    }

    /// Renders `record` into `line`, replacing its previous contents.
    pub fn format_into<C, E>(
        &self,
        record: &Record<'_>,
        clock: &C,
        events: &mut E,
        line: &mut FormattedLine,
    ) -> LineInfo
    where
        C: TimeSource + ?Sized,
        E: EventSink + ?Sized,
    {
        let msg_id = record.msg_id();
        let entry = self.table.resolve(msg_id);

        let mut payload = PayloadText::new();
        let mut payload_degraded = false;

        if let Some(decoder) = entry.decoder {
            if record.size() == decoder.expected_len() {
                if let Err(e) = decoder.decode(record, &mut payload) {
                    events.error(
                        EventId::Encode,
                        format_args!("Failed to retrieve message content: ID = 0x{:X}, {}", msg_id.value(), e),
                    );
                    payload_degraded = true;
                }
            } else {
                events.error(
                    EventId::Encode,
                    format_args!(
                        "Invalid Msg length: ID = 0x{:X},  Len = {}, Expected = {}",
                        msg_id.value(),
                        record.size(),
                        decoder.expected_len()
                    ),
                );
                payload_degraded = true;
            }
        }

        let name = &entry.name[..floor_char_boundary(entry.name, MAX_NAME_LEN)];
        let now_ms = clock.now_ms();

        line.clear();
        let truncated = write_bounded(
            &mut line.text,
            MAX_LINE_LEN,
            format_args!("{} {:04x} {} {}", now_ms, msg_id.value(), name, payload),
        );

        LineInfo {
            len: line.len(),
            truncated,
            payload_degraded,
        }
    }

    /// Owned-result variant of [`format_into`](Self::format_into).
    pub fn format<C, E>(&self, record: &Record<'_>, clock: &C, events: &mut E) -> FormattedLine
    where
        C: TimeSource + ?Sized,
        E: EventSink + ?Sized,
    {
        let mut line = FormattedLine::new();
        self.format_into(record, clock, events, &mut line);
        line
    }
}
