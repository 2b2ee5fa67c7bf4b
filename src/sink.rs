//! Text sinks receiving formatted lines.

use std::io::{self, Write};

use tokio::sync::broadcast;
use tracing::trace;

/// Line consumer. Writes are fire-and-forget; a sink that fails drops the line.
pub trait TextSink {
    fn write_line(&mut self, line: &str);
}

impl<T: TextSink + ?Sized> TextSink for &mut T {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }
}

impl<T: TextSink + ?Sized> TextSink for Box<T> {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }
}

/// `None` discards.
impl<T: TextSink> TextSink for Option<T> {
    fn write_line(&mut self, line: &str) {
        if let Some(sink) = self {
            sink.write_line(line);
        }
    }
}

/// Collects lines, mainly for tests.
impl TextSink for Vec<String> {
    fn write_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl TextSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        let mut out = io::stdout().lock();
        if writeln!(out, "{line}").is_err() {
            trace!("stdout closed, line dropped");
        }
    }
}

/// Publishes lines to every connected client of a text stream.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<String>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl TextSink for BroadcastSink {
    fn write_line(&mut self, line: &str) {
        // No receivers is not an error for a console
        let _ = self.tx.send(line.to_string());
    }
}

/// Writes every line to both sinks.
#[derive(Debug, Clone, Default)]
pub struct Tee<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: TextSink, B: TextSink> TextSink for Tee<A, B> {
    fn write_line(&mut self, line: &str) {
        self.first.write_line(line);
        self.second.write_line(line);
    }
}
