//! Command pipe dispatch.
//!
//! Outer dispatch is keyed by message id, inner dispatch by function code.
//! Nothing here returns an error: every failure becomes an event and, for
//! ground commands, an error counter increment.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus::SoftwareBus;
use crate::clock::TimeSource;
use crate::events::{EventId, EventSink};
use crate::housekeeping::HkCounters;
use crate::mids;
use crate::msg::{FcnCode, MsgId, Record, TlmTime};

pub const NOOP_CC: FcnCode = 0;
pub const RESET_COUNTERS_CC: FcnCode = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Command,
    SendHousekeeping,
}

impl Channel {
    pub fn from_msg_id(msg_id: MsgId) -> Option<Self> {
        match msg_id {
            mids::TO_CMD_MID => Some(Channel::Command),
            mids::TO_SEND_HK_MID => Some(Channel::SendHousekeeping),
            _ => None,
        }
    }

    pub fn msg_id(self) -> MsgId {
        match self {
            Channel::Command => mids::TO_CMD_MID,
            Channel::SendHousekeeping => mids::TO_SEND_HK_MID,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCode {
    Noop,
    ResetCounters,
}

impl CommandCode {
    pub fn from_fcn_code(code: FcnCode) -> Option<Self> {
        match code {
            NOOP_CC => Some(CommandCode::Noop),
            RESET_COUNTERS_CC => Some(CommandCode::ResetCounters),
            _ => None,
        }
    }

    pub fn fcn_code(self) -> FcnCode {
        match self {
            CommandCode::Noop => NOOP_CC,
            CommandCode::ResetCounters => RESET_COUNTERS_CC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted(CommandCode),
    /// Unrecognized or missing function code.
    Rejected(Option<FcnCode>),
    HousekeepingSent,
    HousekeepingFailed,
    InvalidMsgId(MsgId),
}

/// Routes one record received on the command pipe.
pub fn dispatch<B, E, C>(
    record: &Record<'_>,
    hk: &mut HkCounters,
    bus: &mut B,
    events: &mut E,
    clock: &C,
) -> DispatchOutcome
where
    B: SoftwareBus + ?Sized,
    E: EventSink + ?Sized,
    C: TimeSource + ?Sized,
{
    let msg_id = record.msg_id();
    match Channel::from_msg_id(msg_id) {
        Some(Channel::Command) => process_ground_command(record, hk, events),
        Some(Channel::SendHousekeeping) => send_housekeeping(hk, bus, events, clock),
        None => {
            events.error(
                EventId::InvalidMsgId,
                format_args!("TO: Invalid Msg ID Rcvd 0x{:x}", msg_id.value()),
            );
            DispatchOutcome::InvalidMsgId(msg_id)
        }
    }
}

pub fn process_ground_command<E>(record: &Record<'_>, hk: &mut HkCounters, events: &mut E) -> DispatchOutcome
where
    E: EventSink + ?Sized,
{
    let fcn_code = record.function_code();
    match fcn_code.and_then(CommandCode::from_fcn_code) {
        Some(CommandCode::Noop) => {
            events.info(EventId::Noop, format_args!("No-op command"));
            hk.record_accepted();
            DispatchOutcome::Accepted(CommandCode::Noop)
        }
        Some(CommandCode::ResetCounters) => {
            hk.reset();
            debug!("counters reset");
            DispatchOutcome::Accepted(CommandCode::ResetCounters)
        }
        None => {
            match fcn_code {
                Some(code) => events.error(
                    EventId::InvalidFcnCode,
                    format_args!("TO: Invalid Function Code Rcvd In Ground Command 0x{:x}", code),
                ),
                None => events.error(
                    EventId::InvalidFcnCode,
                    format_args!("TO: Ground Command without function code, len {}", record.size()),
                ),
            }
            hk.record_error();
            DispatchOutcome::Rejected(fcn_code)
        }
    }
}

/// Stamps and transmits the counters as they stand. Never touches them.
pub fn send_housekeeping<B, E, C>(hk: &HkCounters, bus: &mut B, events: &mut E, clock: &C) -> DispatchOutcome
where
    B: SoftwareBus + ?Sized,
    E: EventSink + ?Sized,
    C: TimeSource + ?Sized,
{
    let sent = hk
        .to_report(TlmTime::from_millis(clock.now_ms()))
        .map_err(|e| e.to_string())
        .and_then(|report| bus.transmit(&report.record()).map_err(|e| e.to_string()));

    match sent {
        Ok(()) => DispatchOutcome::HousekeepingSent,
        Err(reason) => {
            events.error(EventId::HkSend, format_args!("TO: HK transmit failed: {}", reason));
            DispatchOutcome::HousekeepingFailed
        }
    }
}
