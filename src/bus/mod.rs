//! Software bus collaborator: pipes, subscriptions and transmit.
//!
//! The console never owns the bus. It creates its two pipes, subscribes them
//! once at start-up and from then on only receives and transmits.

pub mod memory;

pub use memory::{BusStats, MemoryBus};

use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use crate::msg::{MsgId, Record, RecordBuf};

/// Per-subscription limit used when a subscriber does not choose one.
pub const DEFAULT_MSG_LIMIT: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PipeId(pub u16);

impl core::fmt::Display for PipeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "pipe#{}", self.0)
    }
}

/// Quality of service requested for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Qos {
    pub priority: u8,
    pub reliability: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Return immediately if nothing is queued.
    Poll,
    /// Wait until a record arrives.
    Pend,
    /// Wait at most this long.
    Timeout(Duration),
}

impl ReceiveMode {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            ReceiveMode::Poll
        } else {
            ReceiveMode::Timeout(Duration::from_millis(ms))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("no message available")]
    NoMessage,
    #[error("receive timed out")]
    TimedOut,
    #[error("bad pipe: {0}")]
    BadPipe(PipeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("pipe name already in use: {0}")]
    PipeNameTaken(String),
    #[error("invalid pipe depth {0}")]
    BadDepth(usize),
    #[error("no more pipes available")]
    MaxPipes,
    #[error("bad pipe: {0}")]
    BadPipe(PipeId),
    #[error("invalid message id {0}")]
    InvalidMsgId(MsgId),
    #[error("transmit failed: {0}")]
    Transmit(String),
}

pub trait SoftwareBus {
    fn create_pipe(&mut self, name: &str, depth: usize) -> Result<PipeId, BusError>;

    fn subscribe_ex(&mut self, msg_id: MsgId, pipe: PipeId, qos: Qos, msg_limit: u16) -> Result<(), BusError>;

    fn subscribe(&mut self, msg_id: MsgId, pipe: PipeId) -> Result<(), BusError> {
        self.subscribe_ex(msg_id, pipe, Qos::default(), DEFAULT_MSG_LIMIT)
    }

    fn receive(&mut self, pipe: PipeId, mode: ReceiveMode) -> Result<RecordBuf, ReceiveError>;

    fn transmit(&mut self, record: &Record<'_>) -> Result<(), BusError>;
}

/// A single queue of records, the view the drain loop works against.
pub trait RecordSource {
    fn receive(&mut self, mode: ReceiveMode) -> Result<RecordBuf, ReceiveError>;
}

/// Binds one pipe of a bus as a [`RecordSource`].
pub struct PipeReader<'b, B: ?Sized> {
    bus: &'b mut B,
    pipe: PipeId,
}

impl<'b, B: SoftwareBus + ?Sized> PipeReader<'b, B> {
    pub fn new(bus: &'b mut B, pipe: PipeId) -> Self {
        Self { bus, pipe }
    }
}

impl<B: SoftwareBus + ?Sized> RecordSource for PipeReader<'_, B> {
    fn receive(&mut self, mode: ReceiveMode) -> Result<RecordBuf, ReceiveError> {
        self.bus.receive(self.pipe, mode)
    }
}

/// Plain FIFO; never waits.
impl RecordSource for VecDeque<RecordBuf> {
    fn receive(&mut self, mode: ReceiveMode) -> Result<RecordBuf, ReceiveError> {
        self.pop_front().ok_or(match mode {
            ReceiveMode::Poll => ReceiveError::NoMessage,
            ReceiveMode::Pend | ReceiveMode::Timeout(_) => ReceiveError::TimedOut,
        })
    }
}
