use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use super::{BusError, PipeId, Qos, ReceiveError, ReceiveMode, SoftwareBus};
use crate::msg::{MsgId, Record, RecordBuf};

pub const MAX_PIPES: usize = 64;
pub const MAX_PIPE_DEPTH: usize = 1024;

/// Delivery counters, the in-memory analogue of the bus housekeeping report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub no_subscribers: u64,
    pub msg_limit_drops: u64,
    pub pipe_overflow_drops: u64,
}

#[derive(Debug)]
struct Pipe {
    name: String,
    depth: usize,
    queue: VecDeque<RecordBuf>,
}

#[derive(Debug, Clone, Copy)]
struct Route {
    msg_id: MsgId,
    pipe: PipeId,
    msg_limit: u16,
}

#[derive(Debug, Default)]
struct BusState {
    pipes: Vec<Pipe>,
    routes: Vec<Route>,
    stats: BusStats,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<BusState>,
    arrived: Condvar,
}

/// In-process software bus. Clones share the same pipes, so one handle can
/// publish from an ingest thread while another is owned by the console.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    shared: Arc<Shared>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Routes `record` to every subscribed pipe and returns how many accepted it.
    pub fn publish(&self, record: &Record<'_>) -> Result<usize, BusError> {
        let buf = RecordBuf::from_slice(record.as_bytes()).map_err(|e| BusError::Transmit(e.to_string()))?;
        let msg_id = record.msg_id();

        let mut guard = self.lock();
        let state = &mut *guard;
        state.stats.published += 1;

        let mut accepted = 0;
        let mut routed = false;
        for route in state.routes.iter().filter(|r| r.msg_id == msg_id) {
            routed = true;
            let Some(pipe) = state.pipes.get_mut(usize::from(route.pipe.0)) else {
                continue;
            };

            let pending = pipe.queue.iter().filter(|b| b.record().msg_id() == msg_id).count();
            if pending >= usize::from(route.msg_limit) {
                state.stats.msg_limit_drops += 1;
                debug!("{} limit {} reached on {}", msg_id, route.msg_limit, pipe.name);
                continue;
            }
            if pipe.queue.len() >= pipe.depth {
                state.stats.pipe_overflow_drops += 1;
                warn!("{} overflow dropping {}", pipe.name, msg_id);
                continue;
            }

            pipe.queue.push_back(buf.clone());
            accepted += 1;
        }

        if routed {
            state.stats.delivered += accepted as u64;
        } else {
            state.stats.no_subscribers += 1;
        }
        drop(guard);

        if accepted > 0 {
            self.shared.arrived.notify_all();
        }
        Ok(accepted)
    }

    /// Parses raw bytes and publishes them.
    pub fn publish_bytes(&self, bytes: &[u8]) -> Result<usize, BusError> {
        let record = Record::parse(bytes).map_err(|e| BusError::Transmit(e.to_string()))?;
        self.publish(&record)
    }

    pub fn queued(&self, pipe: PipeId) -> usize {
        self.lock()
            .pipes
            .get(usize::from(pipe.0))
            .map_or(0, |p| p.queue.len())
    }

    pub fn pipe_name(&self, pipe: PipeId) -> Option<String> {
        self.lock().pipes.get(usize::from(pipe.0)).map(|p| p.name.clone())
    }

    pub fn subscribers(&self, msg_id: MsgId) -> Vec<PipeId> {
        self.lock()
            .routes
            .iter()
            .filter(|r| r.msg_id == msg_id)
            .map(|r| r.pipe)
            .collect()
    }

    pub fn stats(&self) -> BusStats {
        self.lock().stats
    }
}

impl SoftwareBus for MemoryBus {
    fn create_pipe(&mut self, name: &str, depth: usize) -> Result<PipeId, BusError> {
        if depth == 0 || depth > MAX_PIPE_DEPTH {
            return Err(BusError::BadDepth(depth));
        }

        let mut state = self.lock();
        if state.pipes.iter().any(|p| p.name == name) {
            return Err(BusError::PipeNameTaken(name.to_string()));
        }
        if state.pipes.len() >= MAX_PIPES {
            return Err(BusError::MaxPipes);
        }

        let id = PipeId(state.pipes.len() as u16);
        state.pipes.push(Pipe {
            name: name.to_string(),
            depth,
            queue: VecDeque::with_capacity(depth),
        });
        debug!("created {} ({}) depth {}", name, id, depth);
        Ok(id)
    }

    fn subscribe_ex(&mut self, msg_id: MsgId, pipe: PipeId, _qos: Qos, msg_limit: u16) -> Result<(), BusError> {
        if !msg_id.is_valid() {
            return Err(BusError::InvalidMsgId(msg_id));
        }

        let mut state = self.lock();
        if usize::from(pipe.0) >= state.pipes.len() {
            return Err(BusError::BadPipe(pipe));
        }

        // QoS has no meaning in process. Re-subscribing updates the limit in place
        if let Some(route) = state.routes.iter_mut().find(|r| r.msg_id == msg_id && r.pipe == pipe) {
            route.msg_limit = msg_limit;
            return Ok(());
        }

        state.routes.push(Route {
            msg_id,
            pipe,
            msg_limit,
        });
        Ok(())
    }

    fn receive(&mut self, pipe: PipeId, mode: ReceiveMode) -> Result<RecordBuf, ReceiveError> {
        let deadline = match mode {
            ReceiveMode::Timeout(d) => Some(Instant::now() + d),
            ReceiveMode::Poll | ReceiveMode::Pend => None,
        };

        let mut state = self.lock();
        loop {
            let queue = &mut state
                .pipes
                .get_mut(usize::from(pipe.0))
                .ok_or(ReceiveError::BadPipe(pipe))?
                .queue;
            if let Some(buf) = queue.pop_front() {
                return Ok(buf);
            }

            state = match (mode, deadline) {
                (ReceiveMode::Poll, _) => return Err(ReceiveError::NoMessage),
                (ReceiveMode::Pend, _) | (ReceiveMode::Timeout(_), None) => self
                    .shared
                    .arrived
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                (ReceiveMode::Timeout(_), Some(deadline)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ReceiveError::TimedOut);
                    }
                    self.shared
                        .arrived
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn transmit(&mut self, record: &Record<'_>) -> Result<(), BusError> {
        self.publish(record).map(|_| ())
    }
}
