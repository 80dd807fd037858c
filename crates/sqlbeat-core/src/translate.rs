//! Row to event translation.
//!
//! | Query type | Columns kept | Delta columns |
//! |------------|--------------|---------------|
//! | `single-row` | all | rate computed |
//! | `multiple-rows` | all | emitted raw |
//! | `show-slave-delay` | `Seconds_Behind_Master` | emitted raw |
//! | `two-columns` | `(name, value)` per row | rate computed |
//!
//! `multiple-rows` does not compute rates because several rows may carry the
//! same column name within one poll.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::delta::{DeltaStore, compute_delta, elapsed_secs};
use crate::event::Event;
use crate::query::{QueryType, SLAVE_DELAY_COLUMN};
use crate::value::{TypedValue, classify};

/// Default suffix marking delta columns.
pub const DEFAULT_DELTA_WILDCARD: &str = "__DELTA";

/// Shapes rows into events for one source.
#[derive(Debug, Clone)]
pub struct RowTranslator {
    delta_wildcard: String,
    source_type: String,
}

impl RowTranslator {
    /// `source_type` is the tag carried in every event's `type` field.
    pub fn new(delta_wildcard: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            delta_wildcard: delta_wildcard.into(),
            source_type: source_type.into(),
        }
    }

    pub fn delta_wildcard(&self) -> &str {
        &self.delta_wildcard
    }

    pub fn is_delta_column(&self, name: &str) -> bool {
        name.ends_with(&self.delta_wildcard)
    }

    /// Creates an event with only the mandatory fields.
    pub fn new_event(&self, now: DateTime<Utc>) -> Event {
        Event::new(now, self.source_type.as_str())
    }

    /// Translates one row of a single-row, multiple-rows or slave-delay query.
    ///
    /// Returns `None` when the row produces no business fields (for example
    /// its only column is a delta column seen for the first time), and for
    /// two-columns queries, which go through [`append_pair`] instead.
    ///
    /// [`append_pair`]: RowTranslator::append_pair
    pub fn translate_row(
        &self,
        store: &mut DeltaStore,
        query_type: QueryType,
        columns: &[String],
        cells: &[String],
        now: DateTime<Utc>,
    ) -> Option<Event> {
        if query_type == QueryType::TwoColumns {
            return None;
        }

        let mut event = self.new_event(now);

        for (name, raw) in columns.iter().zip(cells) {
            if query_type == QueryType::SlaveDelay && name != SLAVE_DELAY_COLUMN {
                continue;
            }

            let value = classify(raw);

            let field = if query_type == QueryType::SingleRow && self.is_delta_column(name) {
                self.delta_field(store, name, value, now)
            } else {
                Some(value)
            };

            if let Some(field) = field {
                insert_field(&mut event, name, field);
            }
        }

        (!event.is_empty()).then_some(event)
    }

    /// Adds one `(name, value)` row of a two-columns query to `event`.
    ///
    /// Delta columns are rate-computed here regardless of query type.
    pub fn append_pair(
        &self,
        store: &mut DeltaStore,
        event: &mut Event,
        name: &str,
        raw_value: &str,
        now: DateTime<Utc>,
    ) {
        let value = classify(raw_value);

        let field = if self.is_delta_column(name) {
            self.delta_field(store, name, value, now)
        } else {
            Some(value)
        };

        if let Some(field) = field {
            insert_field(event, name, field);
        }
    }

    /// Records `value` for a delta column and returns the field to emit, if
    /// any. The first sighting emits nothing.
    fn delta_field(
        &self,
        store: &mut DeltaStore,
        name: &str,
        value: TypedValue,
        now: DateTime<Utc>,
    ) -> Option<TypedValue> {
        let previous = store.replace(name, value.clone(), now)?;

        if previous.last_value.kind() != value.kind() {
            debug!(
                column = name,
                was = previous.last_value.kind(),
                now = value.kind(),
                "delta column changed type, treating as reset"
            );
        }

        let elapsed = elapsed_secs(previous.observed_at, now);
        Some(compute_delta(&previous.last_value, &value, elapsed))
    }
}

fn insert_field(event: &mut Event, name: &str, value: TypedValue) {
    if !event.insert(name, value) {
        debug!(column = name, "column name is reserved, skipped");
    }
}
