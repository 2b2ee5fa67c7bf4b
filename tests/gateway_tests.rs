use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tocon::app::{CMD_PIPE_NAME, TLM_PIPE_NAME};
use tocon::bus::{BusError, PipeId, Qos, ReceiveError, ReceiveMode};
use tocon::decode::DecodeEntry;
use tocon::subscriptions::UnavailableTable;
use tocon::*;

type TestGateway<'a> = Gateway<MemoryBus, Vec<String>, &'a mut EventRecorder, ManualClock>;

fn test_config() -> GatewayConfig {
    GatewayConfig {
        task_msec: 1,
        tlm_pipe_timeout_ms: 0,
        ..GatewayConfig::default()
    }
}

fn start<'a, T: TableService>(
    config: GatewayConfig,
    bus: &MemoryBus,
    tables: &mut T,
    events: &'a mut EventRecorder,
) -> Result<TestGateway<'a>, InitError> {
    Gateway::init(config, bus.clone(), tables, Vec::new(), events, ManualClock::new(1000))
}

fn table(ids: &[MsgId], buf_limit: u8) -> StaticTableService {
    let entries = ids.iter().map(|&id| Subscription::new(id, buf_limit));
    StaticTableService::new(SubscriptionTable::from_entries(entries).unwrap())
}

fn tlm(id: MsgId, payload: &[u8]) -> RecordBuf {
    RecordBuf::telemetry(id, TlmTime::default(), payload).unwrap()
}

#[test]
fn test_init_creates_pipes_and_reports_version() {
    let bus = MemoryBus::new();
    let mut events = EventRecorder::new();
    let gateway = start(test_config(), &bus, &mut StaticTableService::default(), &mut events).unwrap();

    assert_eq!(bus.pipe_name(gateway.cmd_pipe()).as_deref(), Some(CMD_PIPE_NAME));
    assert_eq!(bus.pipe_name(gateway.tlm_pipe()).as_deref(), Some(TLM_PIPE_NAME));
    assert_eq!(bus.subscribers(mids::TO_CMD_MID), vec![gateway.cmd_pipe()]);
    assert_eq!(bus.subscribers(mids::TO_SEND_HK_MID), vec![gateway.cmd_pipe()]);
    assert_eq!(gateway.counters(), HkCounters::new());
    assert_eq!(gateway.subscribed().len(), SubscriptionTable::default().len());
    drop(gateway);

    assert_eq!(events.count(EventId::Init), 1);
    let message = events.last().unwrap().message.to_string();
    assert!(message.starts_with("TO Console Initialized. TO Console DEVELOPMENT BUILD"));
}

#[test]
fn test_table_failure_is_fatal() {
    let bus = MemoryBus::new();
    let mut events = EventRecorder::new();
    let result = start(test_config(), &bus, &mut UnavailableTable("missing".into()), &mut events);

    assert!(matches!(result, Err(InitError::Table(_))));
    assert_eq!(events.count(EventId::Table), 1);
    assert_eq!(events.count(EventId::Init), 0);
}

#[test]
fn test_pipe_failures_are_fatal() {
    let mut bus = MemoryBus::new();
    bus.create_pipe(CMD_PIPE_NAME, 1).unwrap();
    let mut events = EventRecorder::new();
    let result = start(test_config(), &bus, &mut StaticTableService::default(), &mut events);
    assert!(matches!(result, Err(InitError::CmdPipe(BusError::PipeNameTaken(_)))));
    assert_eq!(events.count(EventId::CmdPipe), 1);

    let mut bus = MemoryBus::new();
    bus.create_pipe(TLM_PIPE_NAME, 1).unwrap();
    let mut events = EventRecorder::new();
    let result = start(test_config(), &bus, &mut StaticTableService::default(), &mut events);
    assert!(matches!(result, Err(InitError::TlmPipe(_))));
    assert_eq!(events.count(EventId::TlmPipe), 1);
}

#[test]
fn test_invalid_config_is_rejected_before_touching_the_bus() {
    let bus = MemoryBus::new();
    let mut events = EventRecorder::new();
    let config = GatewayConfig {
        max_tlm_pkts: 0,
        ..test_config()
    };
    let result = start(config, &bus, &mut StaticTableService::default(), &mut events);
    assert!(matches!(result, Err(InitError::Config(_))));
    assert!(bus.pipe_name(PipeId(0)).is_none());
}

#[test]
fn test_subscriptions_stop_at_first_invalid_id() {
    let mut subs = SubscriptionTable::empty();
    subs.slots_mut()[0] = Subscription::new(mids::ES_HK_TLM_MID, 4);
    subs.slots_mut()[1] = Subscription::new(mids::SB_HK_TLM_MID, 4);
    subs.slots_mut()[3] = Subscription::new(mids::TIME_HK_TLM_MID, 4);

    let bus = MemoryBus::new();
    let mut events = EventRecorder::new();
    let gateway = start(test_config(), &bus, &mut StaticTableService::new(subs), &mut events).unwrap();

    assert_eq!(gateway.subscribed(), &[mids::ES_HK_TLM_MID, mids::SB_HK_TLM_MID]);
    assert!(bus.subscribers(mids::TIME_HK_TLM_MID).is_empty());
}

/// Memory bus that refuses one telemetry stream.
struct RefusingBus {
    inner: MemoryBus,
    refuse: MsgId,
}

impl SoftwareBus for RefusingBus {
    fn create_pipe(&mut self, name: &str, depth: usize) -> Result<PipeId, BusError> {
        self.inner.create_pipe(name, depth)
    }

    fn subscribe_ex(&mut self, msg_id: MsgId, pipe: PipeId, qos: Qos, limit: u16) -> Result<(), BusError> {
        if msg_id == self.refuse {
            return Err(BusError::InvalidMsgId(msg_id));
        }
        self.inner.subscribe_ex(msg_id, pipe, qos, limit)
    }

    fn receive(&mut self, pipe: PipeId, mode: ReceiveMode) -> Result<RecordBuf, ReceiveError> {
        self.inner.receive(pipe, mode)
    }

    fn transmit(&mut self, record: &Record<'_>) -> Result<(), BusError> {
        self.inner.transmit(record)
    }
}

#[test]
fn test_single_subscribe_failure_continues() {
    let bus = RefusingBus {
        inner: MemoryBus::new(),
        refuse: mids::SB_HK_TLM_MID,
    };
    let mut tables = table(&[mids::ES_HK_TLM_MID, mids::SB_HK_TLM_MID, mids::TIME_HK_TLM_MID], 4);
    let mut events = EventRecorder::new();
    let gateway = Gateway::init(test_config(), bus, &mut tables, Vec::<String>::new(), &mut events, ManualClock::new(0))
        .unwrap();

    assert_eq!(gateway.subscribed(), &[mids::ES_HK_TLM_MID, mids::TIME_HK_TLM_MID]);
    drop(gateway);
    assert_eq!(events.count(EventId::Subscribe), 1);
    assert_eq!(events.count(EventId::Init), 1);
}

#[test]
fn test_cycle_forwards_telemetry_then_runs_commands() {
    let bus = MemoryBus::new();
    let mut events = EventRecorder::new();
    let mut gateway = start(test_config(), &bus, &mut StaticTableService::default(), &mut events).unwrap();

    assert_eq!(bus.publish(&tlm(MsgId::new(0x0abc), &[1]).record()).unwrap(), 0);
    bus.publish(&RecordBuf::command(mids::TO_CMD_MID, 0, &[]).unwrap().record()).unwrap();

    let report = gateway.run_cycle();
    assert_eq!(report.telemetry.drained, 0, "unsubscribed id is never queued");
    assert_eq!(report.commands, 1);

    bus.publish(&tlm(mids::ES_HK_TLM_MID, &[0; 8]).record()).unwrap();
    gateway.clock().advance(500);
    let report = gateway.run_cycle();
    assert_eq!(report.telemetry.drained, 1);
    assert_eq!(gateway.sink().last().map(String::as_str), Some("1500 0800 ES_HK "));
    assert_eq!(gateway.counters().command_counter, 1);
}

#[test]
fn test_replacement_decode_table_renames_streams() {
    let bus = MemoryBus::new();
    let mut tables = table(&[mids::ES_HK_TLM_MID, mids::SB_HK_TLM_MID], 4);
    let mut events = EventRecorder::new();
    let names = DecodeTable::with_entries([DecodeEntry {
        msg_id: mids::ES_HK_TLM_MID,
        name: "EXEC",
        decoder: None,
    }])
    .unwrap();
    let mut gateway = start(test_config(), &bus, &mut tables, &mut events)
        .unwrap()
        .with_decode_table(names);

    bus.publish(&tlm(mids::ES_HK_TLM_MID, &[]).record()).unwrap();
    bus.publish(&tlm(mids::SB_HK_TLM_MID, &[]).record()).unwrap();
    gateway.forward_telemetry();

    assert_eq!(gateway.sink(), &["1000 0800 EXEC ", "1000 0803 unknown "]);
}

#[test]
fn test_housekeeping_report_is_rendered_as_telemetry() {
    let mut bus = MemoryBus::new();
    let monitor = bus.create_pipe("MONITOR", 4).unwrap();
    bus.subscribe(mids::TO_HK_TLM_MID, monitor).unwrap();

    let mut events = EventRecorder::new();
    let mut gateway = start(test_config(), &bus, &mut StaticTableService::default(), &mut events).unwrap();

    for _ in 0..3 {
        bus.publish(&RecordBuf::command(mids::TO_CMD_MID, 0, &[]).unwrap().record()).unwrap();
    }
    bus.publish(&RecordBuf::command(mids::TO_CMD_MID, 9, &[]).unwrap().record()).unwrap();
    bus.publish(&RecordBuf::command(mids::TO_SEND_HK_MID, 0, &[]).unwrap().record()).unwrap();
    assert_eq!(gateway.run_cycle().commands, 5);

    let report = bus.receive(monitor, ReceiveMode::Poll).unwrap();
    let counters = HkCounters::from_report(&report.record()).unwrap();
    assert_eq!(counters.command_counter, 3);
    assert_eq!(counters.command_error_counter, 1);
    assert_eq!(gateway.counters(), counters);

    let report = gateway.run_cycle();
    assert_eq!(report.telemetry.drained, 1);
    assert_eq!(gateway.sink().last().map(String::as_str), Some("1000 0880 TO_HK "));
}

#[test]
fn test_drain_cap_leaves_backlog_for_next_cycle() {
    let bus = MemoryBus::new();
    let config = GatewayConfig {
        tlm_pipe_depth: 256,
        max_tlm_pkts: 100,
        ..test_config()
    };
    let mut tables = table(&[mids::ES_HK_TLM_MID], 255);
    let mut events = EventRecorder::new();
    let mut gateway = start(config, &bus, &mut tables, &mut events).unwrap();

    for _ in 0..130 {
        assert_eq!(bus.publish(&tlm(mids::ES_HK_TLM_MID, &[0; 4]).record()).unwrap(), 1);
    }

    let first = gateway.forward_telemetry();
    assert_eq!(first.drained, 100);
    assert_eq!(bus.queued(gateway.tlm_pipe()), 30);

    let second = gateway.forward_telemetry();
    assert_eq!(second.drained, 30);
    assert!(second.emptied);
    assert_eq!(gateway.sink().len(), 130);
}

#[test]
fn test_run_stops_when_flag_is_set() {
    let bus = MemoryBus::new();
    let mut events = EventRecorder::new();
    let mut gateway = start(test_config(), &bus, &mut StaticTableService::default(), &mut events).unwrap();

    let stop = AtomicBool::new(true);
    assert_eq!(gateway.run(&stop), 0);

    let stop = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        setter.store(true, Ordering::Relaxed);
    });
    assert!(gateway.run(&stop) > 0);
    handle.join().unwrap();
}
