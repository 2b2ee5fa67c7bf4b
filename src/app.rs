//! The console application context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use heapless::Vec;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::bus::{BusError, PipeId, PipeReader, ReceiveMode, SoftwareBus};
use crate::clock::{SystemClock, TimeSource};
use crate::config::{ConfigError, GatewayConfig};
use crate::decode::DecodeTable;
use crate::dispatch::{self, DispatchOutcome};
use crate::drain::{self, DrainReport};
use crate::events::{EventId, EventSink, TracingEvents};
use crate::format::RecordFormatter;
use crate::housekeeping::HkCounters;
use crate::mids;
use crate::msg::{MsgId, Record};
use crate::sink::TextSink;
use crate::subscriptions::{TableError, TableService, MAX_SUBSCRIPTIONS};
use crate::version::version_string;

pub const CMD_PIPE_NAME: &str = "TO_CON_CMD_PIPE";
pub const TLM_PIPE_NAME: &str = "TO_CON_TLM_PIPE";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("subscription table: {0}")]
    Table(#[from] TableError),
    #[error("command pipe: {0}")]
    CmdPipe(BusError),
    #[error("telemetry pipe: {0}")]
    TlmPipe(BusError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub telemetry: DrainReport,
    pub commands: usize,
}

pub struct Gateway<B, S, E = TracingEvents, C = SystemClock> {
    config: GatewayConfig,
    bus: B,
    sink: S,
    events: E,
    clock: C,
    formatter: RecordFormatter,
    hk: HkCounters,
    cmd_pipe: PipeId,
    tlm_pipe: PipeId,
    subscribed: Vec<MsgId, MAX_SUBSCRIPTIONS>,
}

impl<B, S, E, C> Gateway<B, S, E, C>
where
    B: SoftwareBus,
    S: TextSink,
    E: EventSink,
    C: TimeSource,
{
    /// Loads the subscription table, creates both pipes and subscribes them.
    ///
    /// Table and pipe failures abort start-up after emitting their event. A
    /// single telemetry subscription that fails is reported and skipped.
    pub fn init<T>(
        config: GatewayConfig,
        mut bus: B,
        tables: &mut T,
        sink: S,
        mut events: E,
        clock: C,
    ) -> Result<Self, InitError>
    where
        T: TableService + ?Sized,
    {
        config.validate()?;

        let table = tables.load_subscriptions().map_err(|e| {
            events.error(EventId::Table, format_args!("TO Can't load table: {}", e));
            e
        })?;

        let cmd_pipe = bus
            .create_pipe(CMD_PIPE_NAME, config.cmd_pipe_depth)
            .and_then(|pipe| {
                bus.subscribe(mids::TO_CMD_MID, pipe)?;
                bus.subscribe(mids::TO_SEND_HK_MID, pipe)?;
                Ok(pipe)
            })
            .map_err(|e| {
                events.error(EventId::CmdPipe, format_args!("TO Can't create cmd pipe: {}", e));
                InitError::CmdPipe(e)
            })?;

        let tlm_pipe = bus.create_pipe(TLM_PIPE_NAME, config.tlm_pipe_depth).map_err(|e| {
            events.error(EventId::TlmPipe, format_args!("TO Can't create Tlm pipe: {}", e));
            InitError::TlmPipe(e)
        })?;

        let mut subscribed = Vec::new();
        for sub in table.iter() {
            match bus.subscribe_ex(sub.msg_id, tlm_pipe, sub.qos, u16::from(sub.buf_limit)) {
                Ok(()) => {
                    // Bounded by the table size
                    let _ = subscribed.push(sub.msg_id);
                }
                Err(e) => events.error(
                    EventId::Subscribe,
                    format_args!("TO Can't subscribe to stream 0x{:x}: {}", sub.msg_id.value(), e),
                ),
            }
        }
        debug!("subscribed {} of {} streams", subscribed.len(), table.len());

        events.info(
            EventId::Init,
            format_args!("TO Console Initialized. {}.", version_string()),
        );

        Ok(Self {
            config,
            bus,
            sink,
            events,
            clock,
            formatter: RecordFormatter::default(),
            hk: HkCounters::new(),
            cmd_pipe,
            tlm_pipe,
            subscribed,
        })
    }

    /// Replaces the built-in decode table.
    pub fn with_decode_table(mut self, table: DecodeTable) -> Self {
        self.formatter = RecordFormatter::new(table);
        self
    }

    /// One bounded burst from the telemetry pipe to the text sink.
    pub fn forward_telemetry(&mut self) -> DrainReport {
        let mode = ReceiveMode::from_millis(self.config.tlm_pipe_timeout_ms);
        let mut source = PipeReader::new(&mut self.bus, self.tlm_pipe);
        drain::drain(
            &mut source,
            &self.formatter,
            &self.clock,
            &mut self.events,
            &mut self.sink,
            self.config.max_tlm_pkts,
            mode,
        )
    }

    /// Polls the command pipe until it is empty. Returns how many records ran.
    pub fn process_commands(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(buf) = self.bus.receive(self.cmd_pipe, ReceiveMode::Poll) {
            self.handle_command(&buf.record());
            processed += 1;
        }
        processed
    }

    pub fn handle_command(&mut self, record: &Record<'_>) -> DispatchOutcome {
        dispatch::dispatch(record, &mut self.hk, &mut self.bus, &mut self.events, &self.clock)
    }

    pub fn run_cycle(&mut self) -> CycleReport {
        let telemetry = self.forward_telemetry();
        let commands = self.process_commands();
        CycleReport { telemetry, commands }
    }

    /// Runs cycles until `stop` is set. The flag is checked between cycles only.
    pub fn run(&mut self, stop: &AtomicBool) -> u64 {
        let period = Duration::from_millis(self.config.task_msec);
        let mut cycles = 0u64;
        info!("console running, period {:?}", period);

        while !stop.load(Ordering::Relaxed) {
            thread::sleep(period);
            let report = self.run_cycle();
            if report.telemetry.drained > 0 || report.commands > 0 {
                debug!(
                    drained = report.telemetry.drained,
                    commands = report.commands,
                    "cycle {}",
                    cycles
                );
            }
            cycles += 1;
        }

        info!("console stopped after {} cycles", cycles);
        cycles
    }

    pub fn counters(&self) -> HkCounters {
        self.hk
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cmd_pipe(&self) -> PipeId {
        self.cmd_pipe
    }

    pub fn tlm_pipe(&self) -> PipeId {
        self.tlm_pipe
    }

    /// Telemetry streams subscribed at start-up, in table order.
    pub fn subscribed(&self) -> &[MsgId] {
        &self.subscribed
    }

    pub fn formatter(&self) -> &RecordFormatter {
        &self.formatter
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
