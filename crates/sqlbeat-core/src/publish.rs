//! Event sinks.
//!
//! Publishing is fire and forget: a sink that fails to deliver an event logs
//! the failure itself and the poll carries on.

use std::io::Write;

use tracing::warn;

use crate::event::Event;

/// Destination for finished events.
pub trait Publisher {
    fn publish(&mut self, event: &Event);
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&mut self, event: &Event) {
        (**self).publish(event)
    }
}

/// Writes each event as one JSON object per line.
pub struct JsonLinesPublisher<W: Write> {
    writer: W,
    failures: u64,
}

impl<W: Write> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failures: 0,
        }
    }

    /// Number of events that could not be written.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &Event) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> Publisher for JsonLinesPublisher<W> {
    fn publish(&mut self, event: &Event) {
        if let Err(e) = self.write_event(event) {
            self.failures += 1;
            warn!(error = %e, "failed to write event");
        }
    }
}

/// Keeps published events in memory.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Vec<Event>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;
    use chrono::{TimeZone, Utc};

    fn event(n: i64) -> Event {
        let mut e = Event::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(), "postgres");
        e.insert("n", TypedValue::Integer(n));
        e
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_lines_one_event_per_line() {
        let mut publisher = JsonLinesPublisher::new(Vec::new());
        publisher.publish(&event(1));
        publisher.publish(&event(2));

        let out = String::from_utf8(publisher.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"@timestamp":"2026-01-01T00:00:00.000Z","type":"postgres","n":1}"#
        );
    }

    #[test]
    fn write_failures_are_counted_not_raised() {
        let mut publisher = JsonLinesPublisher::new(BrokenWriter);
        publisher.publish(&event(1));
        publisher.publish(&event(2));
        assert_eq!(publisher.failures(), 2);
    }

    #[test]
    fn memory_publisher_collects() {
        let mut memory = MemoryPublisher::new();
        memory.publish(&event(1));
        memory.publish(&event(2));
        assert_eq!(memory.events().len(), 2);
        assert_eq!(memory.take().len(), 2);
        assert!(memory.events().is_empty());
    }
}
