//! Telemetry events built from query results.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::value::TypedValue;

/// Field carrying the observation time.
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Field carrying the source type tag.
pub const TYPE_FIELD: &str = "type";

/// One telemetry event: the mandatory timestamp/type pair plus an ordered
/// list of business fields.
///
/// Serializes as a flat JSON object:
/// `{"@timestamp":"2026-01-01T00:00:00.000Z","type":"postgres","connections":12}`
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    timestamp: DateTime<Utc>,
    source_type: String,
    fields: Vec<(String, TypedValue)>,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, source_type: impl Into<String>) -> Self {
        Self {
            timestamp,
            source_type: source_type.into(),
            fields: Vec::new(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// Sets a business field, replacing the value in place if the name is
    /// already present.
    ///
    /// Returns `false` (and stores nothing) for the reserved names
    /// [`TIMESTAMP_FIELD`] and [`TYPE_FIELD`].
    pub fn insert(&mut self, name: impl Into<String>, value: TypedValue) -> bool {
        let name = name.into();
        if is_reserved(&name) {
            return false;
        }
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of business fields (the mandatory pair is not counted).
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the event has no business fields and should not be sent.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn is_reserved(name: &str) -> bool {
    name == TIMESTAMP_FIELD || name == TYPE_FIELD
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 2))?;
        map.serialize_entry(
            TIMESTAMP_FIELD,
            &self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;
        map.serialize_entry(TYPE_FIELD, &self.source_type)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 7, 17, 0, 0).unwrap()
    }

    #[test]
    fn insert_keeps_order_and_replaces_in_place() {
        let mut event = Event::new(ts(), "postgres");
        assert!(event.is_empty());

        event.insert("b", TypedValue::Integer(1));
        event.insert("a", TypedValue::Integer(2));
        event.insert("b", TypedValue::Integer(3));

        let names: Vec<&str> = event.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(event.get("b"), Some(&TypedValue::Integer(3)));
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut event = Event::new(ts(), "postgres");
        assert!(!event.insert("type", TypedValue::String("x".into())));
        assert!(!event.insert("@timestamp", TypedValue::Integer(0)));
        assert!(event.is_empty());
        assert_eq!(event.source_type(), "postgres");
    }

    #[test]
    fn serializes_flat_object() {
        let mut event = Event::new(ts(), "postgres");
        event.insert("connections", TypedValue::Integer(12));
        event.insert("ratio", TypedValue::Float(0.5));
        event.insert("role", TypedValue::String("primary".into()));

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"@timestamp":"2026-02-07T17:00:00.000Z","type":"postgres","connections":12,"ratio":0.5,"role":"primary"}"#
        );
    }

    #[test]
    fn non_finite_floats_serialize_as_text() {
        let mut event = Event::new(ts(), "postgres");
        event.insert("x", crate::value::classify("NaN"));
        event.insert("y", TypedValue::Float(f64::INFINITY));
        event.insert("z", crate::value::classify("-infinity"));

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"@timestamp":"2026-02-07T17:00:00.000Z","type":"postgres","x":"NaN","y":"inf","z":"-inf"}"#
        );
    }
}
