use tocon::decode::{DecodeEntry, DecodeTableError, UNKNOWN_NAME};
use tocon::format::{LINE_CAPACITY, MAX_LINE_LEN};
use tocon::*;

fn tlm(id: MsgId, payload: &[u8]) -> RecordBuf {
    RecordBuf::telemetry(id, TlmTime::default(), payload).unwrap()
}

#[test]
fn test_every_known_kind_renders_its_display_name() {
    let formatter = RecordFormatter::default();
    let clock = ManualClock::new(1);
    let mut events = EventRecorder::new();

    for kind in TelemetryKind::ALL {
        if kind.decoder().is_some() {
            continue;
        }
        let buf = tlm(kind.msg_id(), &[0; 6]);
        let line = formatter.format(&buf.record(), &clock, &mut events);
        let expected = format!("1 {:04x} {} ", kind.msg_id().value(), kind.display_name());
        assert_eq!(line.as_str(), expected);
        assert_eq!(TelemetryKind::from_msg_id(kind.msg_id()), Some(*kind));
    }
    assert!(events.is_empty());
}

#[test]
fn test_absent_entry_differs_from_entry_without_decoder() {
    let table = DecodeTable::standard();
    assert!(table.lookup(MsgId::new(0x0abc)).is_none());
    assert_eq!(table.resolve(MsgId::new(0x0abc)).name, UNKNOWN_NAME);

    let entry = table.lookup(mids::TO_HK_TLM_MID).unwrap();
    assert_eq!(entry.name, "TO_HK");
    assert!(entry.decoder.is_none());
}

#[test]
fn test_custom_table_rejects_duplicates() {
    let entry = DecodeEntry {
        msg_id: MsgId::new(0x0900),
        name: "X",
        decoder: None,
    };
    assert_eq!(
        DecodeTable::with_entries([entry, entry]).unwrap_err(),
        DecodeTableError::Duplicate(MsgId::new(0x0900))
    );
}

#[test]
fn test_line_never_exceeds_capacity() {
    let formatter = RecordFormatter::default();
    let clock = ManualClock::new(u64::MAX);
    let mut events = EventRecorder::new();
    let mut line = FormattedLine::new();

    for kind in TelemetryKind::ALL {
        let buf = tlm(kind.msg_id(), &[b'z'; 300]);
        formatter.format_into(&buf.record(), &clock, &mut events, &mut line);
        assert!(line.len() <= MAX_LINE_LEN);
        assert_eq!(line.to_terminated().len(), LINE_CAPACITY);
        assert_eq!(line.to_terminated()[line.len()], 0);
    }
}

#[cfg(feature = "huff")]
mod huff {
    use super::*;
    use tocon::decode::{HUFF_RESULT_STR_LEN, HUFF_RESULT_TLM_LEN};

    fn result(text: &[u8]) -> RecordBuf {
        let mut field = [0u8; HUFF_RESULT_STR_LEN];
        field[..text.len()].copy_from_slice(text);
        tlm(mids::HUFF_RES_TLM_MID, &field)
    }

    #[test]
    fn test_result_string_stops_at_nul() {
        let formatter = RecordFormatter::default();
        let clock = ManualClock::new(77);
        let mut events = EventRecorder::new();

        let buf = result(b"10110\0ignored");
        assert_eq!(buf.record().size(), HUFF_RESULT_TLM_LEN);
        let line = formatter.format(&buf.record(), &clock, &mut events);
        assert_eq!(line.as_str(), "77 0893 HUFF_RES 10110");
        assert!(events.is_empty());
    }

    #[test]
    fn test_full_width_result_is_truncated_to_line() {
        let formatter = RecordFormatter::default();
        let clock = ManualClock::new(77);
        let mut events = EventRecorder::new();

        let buf = result(&[b'1'; HUFF_RESULT_STR_LEN]);
        let mut line = FormattedLine::new();
        let info = formatter.format_into(&buf.record(), &clock, &mut events, &mut line);
        assert!(info.truncated);
        assert!(!info.payload_degraded);
        assert_eq!(line.len(), MAX_LINE_LEN);
        assert!(line.as_str().starts_with("77 0893 HUFF_RES 111"));
    }

    #[test]
    fn test_invalid_utf8_keeps_prefix_and_reports() {
        let formatter = RecordFormatter::default();
        let clock = ManualClock::new(5);
        let mut events = EventRecorder::new();

        let buf = result(b"ok\xff\xfebad");
        let mut line = FormattedLine::new();
        let info = formatter.format_into(&buf.record(), &clock, &mut events, &mut line);
        assert!(info.payload_degraded);
        assert_eq!(line.as_str(), "5 0893 HUFF_RES ok");
        assert_eq!(events.count(EventId::Encode), 1);
    }

    #[test]
    fn test_short_result_is_never_decoded() {
        let formatter = RecordFormatter::default();
        let clock = ManualClock::new(5);
        let mut events = EventRecorder::new();

        let buf = tlm(mids::HUFF_RES_TLM_MID, b"1011");
        let line = formatter.format(&buf.record(), &clock, &mut events);
        assert_eq!(line.as_str(), "5 0893 HUFF_RES ");
        assert_eq!(events.count(EventId::Encode), 1);
        assert!(events.last().unwrap().message.contains("Expected = 140"));
    }
}
