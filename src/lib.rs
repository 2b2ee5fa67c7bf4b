//! # TO Console
//!
//! Telemetry output console for a software-bus based flight system: receives
//! subscribed telemetry records, renders each one as a bounded text line and
//! answers its own small command set (no-op, reset counters, housekeeping).
//!
//! ## Features
//!
//! - **Bounded formatting**: every line fits in 128 bytes terminator included
//! - **Closed decode table**: display names per message id, result-string
//!   decoders for companion apps behind the `mxm` and `huff` features
//! - **Per-cycle drain cap**: at most `max_tlm_pkts` records per cycle
//! - **Command dispatch** with wrapping command/error counters
//! - **In-process bus** for hosting and tests
//!
//! ## Quick Start
//!
//! ```rust
//! use tocon::{mids, EventRecorder, Gateway, GatewayConfig, ManualClock, MemoryBus};
//! use tocon::{RecordBuf, StaticTableService, TlmTime};
//!
//! let bus = MemoryBus::new();
//! let config = GatewayConfig { tlm_pipe_timeout_ms: 0, ..GatewayConfig::default() };
//! let mut gateway = Gateway::init(
//!     config,
//!     bus.clone(),
//!     &mut StaticTableService::default(),
//!     Vec::<String>::new(),
//!     EventRecorder::new(),
//!     ManualClock::new(1000),
//! )
//! .unwrap();
//!
//! let hk = RecordBuf::telemetry(mids::TO_HK_TLM_MID, TlmTime::default(), &[0; 4]).unwrap();
//! bus.publish(&hk.record()).unwrap();
//!
//! gateway.run_cycle();
//! assert_eq!(gateway.sink()[0], "1000 0880 TO_HK ");
//! ```
//!
//! ## Architecture
//!
//! - [`app`] - Gateway context, start-up and main loop
//! - [`drain`] - Bounded telemetry burst
//! - [`format`] / [`decode`] - Record to line rendering
//! - [`dispatch`] / [`housekeeping`] - Commands and counters
//! - [`bus`] - Bus collaborator traits and the in-memory bus

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod app;
pub mod bounded;
pub mod bus;
pub mod clock;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod drain;
pub mod events;
pub mod format;
pub mod housekeeping;
pub mod mids;
pub mod msg;
pub mod sink;
pub mod subscriptions;
pub mod version;

// Re-export main public types for convenience
pub use app::{CycleReport, Gateway, InitError};
pub use bus::{MemoryBus, ReceiveMode, SoftwareBus};
pub use clock::{ManualClock, MonotonicClock, SystemClock, TimeSource};
pub use config::{ConfigError, GatewayConfig};
pub use decode::{DecodeTable, TelemetryKind};
pub use events::{EventId, EventRecorder, EventSink, TracingEvents};
pub use format::{FormattedLine, RecordFormatter};
pub use housekeeping::HkCounters;
pub use msg::{MsgId, Record, RecordBuf, TlmTime};
pub use sink::TextSink;
pub use subscriptions::{StaticTableService, Subscription, SubscriptionTable, TableService};
