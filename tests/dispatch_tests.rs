use tocon::bus::ReceiveMode;
use tocon::dispatch::{dispatch, CommandCode, DispatchOutcome, NOOP_CC, RESET_COUNTERS_CC};
use tocon::events::EventType;
use tocon::*;

struct Fixture {
    bus: MemoryBus,
    hk: HkCounters,
    events: EventRecorder,
    clock: ManualClock,
}

impl Fixture {
    fn new() -> Self {
        Self {
            bus: MemoryBus::new(),
            hk: HkCounters::new(),
            events: EventRecorder::new(),
            clock: ManualClock::new(2000),
        }
    }

    fn send(&mut self, record: RecordBuf) -> DispatchOutcome {
        dispatch(&record.record(), &mut self.hk, &mut self.bus, &mut self.events, &self.clock)
    }
}

fn command(fcn: u8) -> RecordBuf {
    RecordBuf::command(mids::TO_CMD_MID, fcn, &[]).unwrap()
}

#[test]
fn test_noop_increments_accepted_only() {
    let mut f = Fixture::new();
    assert_eq!(f.send(command(NOOP_CC)), DispatchOutcome::Accepted(CommandCode::Noop));

    assert_eq!(f.hk.command_counter, 1);
    assert_eq!(f.hk.command_error_counter, 0);
    assert_eq!(f.events.count(EventId::Noop), 1);
    assert_eq!(f.events.last().unwrap().event_type, EventType::Information);
    assert_eq!(f.events.last().unwrap().message.as_str(), "No-op command");
}

#[test]
fn test_unknown_function_code_increments_error_only() {
    let mut f = Fixture::new();
    assert_eq!(f.send(command(0x42)), DispatchOutcome::Rejected(Some(0x42)));

    assert_eq!(f.hk.command_counter, 0);
    assert_eq!(f.hk.command_error_counter, 1);
    assert_eq!(f.events.count(EventId::InvalidFcnCode), 1);
    assert!(f.events.last().unwrap().message.ends_with("0x42"));
}

#[test]
fn test_reset_zeroes_saturated_counters() {
    let mut f = Fixture::new();
    f.hk = HkCounters {
        command_counter: 255,
        command_error_counter: 255,
    };
    assert_eq!(
        f.send(command(RESET_COUNTERS_CC)),
        DispatchOutcome::Accepted(CommandCode::ResetCounters)
    );
    assert_eq!(f.hk, HkCounters::new());
}

#[test]
fn test_counters_wrap_after_255_noops() {
    let mut f = Fixture::new();
    for _ in 0..256 {
        f.send(command(NOOP_CC));
    }
    assert_eq!(f.hk.command_counter, 0);
}

#[test]
fn test_housekeeping_request_sends_counters_without_event() {
    let mut f = Fixture::new();
    let pipe = f.bus.create_pipe("GROUND", 4).unwrap();
    f.bus.subscribe(mids::TO_HK_TLM_MID, pipe).unwrap();
    f.hk = HkCounters {
        command_counter: 12,
        command_error_counter: 3,
    };

    let request = RecordBuf::command(mids::TO_SEND_HK_MID, 0, &[]).unwrap();
    assert_eq!(f.send(request), DispatchOutcome::HousekeepingSent);
    assert!(f.events.is_empty());
    assert_eq!(f.hk.command_counter, 12);
    assert_eq!(f.hk.command_error_counter, 3);

    let report = f.bus.receive(pipe, ReceiveMode::Poll).unwrap();
    let record = report.record();
    assert_eq!(HkCounters::from_report(&record), Some(f.hk));
    assert_eq!(record.time().map(|t| t.as_millis()), Some(2000));
}

#[test]
fn test_invalid_msg_id_changes_no_counter() {
    let mut f = Fixture::new();
    let stray = RecordBuf::command(MsgId::new(0x1899), NOOP_CC, &[]).unwrap();
    assert_eq!(f.send(stray), DispatchOutcome::InvalidMsgId(MsgId::new(0x1899)));

    assert_eq!(f.hk, HkCounters::new());
    assert_eq!(f.events.count(EventId::InvalidMsgId), 1);
    assert_eq!(f.events.last().unwrap().message.as_str(), "TO: Invalid Msg ID Rcvd 0x1899");
}
