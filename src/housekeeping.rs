use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

use crate::mids;
use crate::msg::{MessageError, Record, RecordBuf, TlmTime, TLM_HEADER_LEN};

pub const HK_PAYLOAD_LEN: usize = 4;
pub const HK_REPORT_LEN: usize = TLM_HEADER_LEN + HK_PAYLOAD_LEN;

const_assert_eq!(HK_REPORT_LEN, 16);

/// Command counters. Both wrap at 255 and only reset-counters zeroes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HkCounters {
    pub command_counter: u8,
    pub command_error_counter: u8,
}

impl HkCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&mut self) {
        self.command_counter = self.command_counter.wrapping_add(1);
    }

    pub fn record_error(&mut self) {
        self.command_error_counter = self.command_error_counter.wrapping_add(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Builds the housekeeping report carrying these counters, stamped with `time`.
    pub fn to_report(&self, time: TlmTime) -> Result<RecordBuf, MessageError> {
        let payload = [self.command_counter, self.command_error_counter, 0, 0];
        RecordBuf::telemetry(mids::TO_HK_TLM_MID, time, &payload)
    }

    /// Reads the counters back out of a housekeeping report.
    pub fn from_report(record: &Record<'_>) -> Option<Self> {
        if record.msg_id() != mids::TO_HK_TLM_MID || record.size() != HK_REPORT_LEN {
            return None;
        }
        match record.tlm_payload() {
            [command_counter, command_error_counter, ..] => Some(Self {
                command_counter: *command_counter,
                command_error_counter: *command_error_counter,
            }),
            _ => None,
        }
    }
}
