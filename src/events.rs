//! Event reporting.
//!
//! Events are the console's only failure channel below start-up: decode
//! mismatches, bad message ids and bad function codes are reported here and
//! never propagated to the caller.

use arrayvec::ArrayString;
use core::fmt;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::bounded::write_bounded;

pub const MAX_EVENT_MESSAGE_LEN: usize = 122;

pub type EventMessage = ArrayString<MAX_EVENT_MESSAGE_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventId {
    Init = 1,
    Noop = 2,
    Table = 4,
    CmdPipe = 5,
    TlmPipe = 6,
    Subscribe = 7,
    Encode = 8,
    InvalidMsgId = 9,
    InvalidFcnCode = 10,
    HkSend = 11,
}

impl EventId {
    pub fn code(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Information,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub message: EventMessage,
}

impl Event {
    pub fn new(id: EventId, event_type: EventType, args: fmt::Arguments<'_>) -> Self {
        let mut message = EventMessage::new();
        write_bounded(&mut message, MAX_EVENT_MESSAGE_LEN, args);
        Self {
            id,
            event_type,
            message,
        }
    }
}

/// Fire-and-forget event collaborator.
pub trait EventSink {
    fn emit(&mut self, event: Event);

    fn info(&mut self, id: EventId, args: fmt::Arguments<'_>) {
        self.emit(Event::new(id, EventType::Information, args));
    }

    fn error(&mut self, id: EventId, args: fmt::Arguments<'_>) {
        self.emit(Event::new(id, EventType::Error, args));
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: Event) {
        (**self).emit(event);
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn emit(&mut self, event: Event) {
        let eid = event.id.code();
        match event.event_type {
            EventType::Information => info!(eid, "{}", event.message),
            EventType::Error => error!(eid, "{}", event.message),
        }
    }
}

/// Keeps every event it receives, then forwards it to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    events: Vec<Event>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn count(&self, id: EventId) -> usize {
        self.events.iter().filter(|e| e.id == id).count()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events.iter().filter(|e| e.event_type == event_type).count()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for EventRecorder {
    fn emit(&mut self, event: Event) {
        TracingEvents.emit(event.clone());
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_message_is_bounded() {
        let long = "x".repeat(300);
        let event = Event::new(EventId::Encode, EventType::Error, format_args!("{}", long));
        assert_eq!(event.message.len(), MAX_EVENT_MESSAGE_LEN);
    }

    #[test]
    fn test_recorder_counts_by_id_and_type() {
        let mut recorder = EventRecorder::new();
        recorder.info(EventId::Noop, format_args!("No-op command"));
        recorder.error(EventId::InvalidFcnCode, format_args!("bad code 0x{:x}", 7));
        recorder.error(EventId::InvalidFcnCode, format_args!("bad code 0x{:x}", 8));

        assert_eq!(recorder.count(EventId::InvalidFcnCode), 2);
        assert_eq!(recorder.count_type(EventType::Information), 1);
        assert_eq!(recorder.last().unwrap().message.as_str(), "bad code 0x8");
    }

    #[test]
    fn test_event_codes_are_stable() {
        assert_eq!(EventId::Init.code(), 1);
        assert_eq!(EventId::Encode.code(), 8);
        assert_eq!(EventId::HkSend.code(), 11);
    }
}
