use serde::Serialize;
use tracing::trace;

use crate::bus::{ReceiveError, ReceiveMode, RecordSource};
use crate::clock::TimeSource;
use crate::events::EventSink;
use crate::format::{FormattedLine, RecordFormatter};
use crate::sink::TextSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Records taken off the queue.
    pub drained: usize,
    pub truncated: usize,
    pub degraded: usize,
    /// `true` when the burst ended on an empty queue rather than the cap.
    pub emptied: bool,
}

/// Forwards at most `max_count` records from `source` to `sink`.
///
/// Each receive waits up to `mode`; the first failed receive ends the burst.
/// One line is written per record received, degraded or not.
pub fn drain<Q, C, E, S>(
    source: &mut Q,
    formatter: &RecordFormatter,
    clock: &C,
    events: &mut E,
    sink: &mut S,
    max_count: usize,
    mode: ReceiveMode,
) -> DrainReport
where
    Q: RecordSource + ?Sized,
    C: TimeSource + ?Sized,
    E: EventSink + ?Sized,
    S: TextSink + ?Sized,
{
    let mut report = DrainReport::default();
    let mut line = FormattedLine::new();

    while report.drained < max_count {
        let buf = match source.receive(mode) {
            Ok(buf) => buf,
            Err(e) => {
                if let ReceiveError::BadPipe(pipe) = e {
                    trace!("drain stopped on {}", pipe);
                }
                report.emptied = true;
                break;
            }
        };
        report.drained += 1;

        let info = formatter.format_into(&buf.record(), clock, events, &mut line);
        if info.truncated {
            report.truncated += 1;
        }
        if info.payload_degraded {
            report.degraded += 1;
        }
        sink.write_line(line.as_str());
    }

    report
}
