//! Rate-of-change tracking for counter-style columns.
//!
//! Columns whose name ends with the delta wildcard are not emitted as raw
//! values. Instead the previous observation is kept in a [`DeltaStore`] and
//! the event carries the per-second rate between the two observations.
//!
//! Rules:
//! - the first sighting of a column only seeds the store
//! - a counter that did not advance (flat or reset) yields zero, never a
//!   negative rate
//! - integer rates are rounded half-up (see [`round_half_up_from_below`]),
//!   float rates are not rounded
//! - string values pass through unchanged
//! - a value whose type differs from the stored one is treated as a reset

use std::collections::HashMap;
use std::collections::hash_map::Iter;

use chrono::{DateTime, Utc};

use crate::value::TypedValue;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Last observation of a delta column.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRecord {
    pub last_value: TypedValue,
    pub observed_at: DateTime<Utc>,
}

/// Last observed value per delta column, keyed by column name.
///
/// Records are never evicted. Keys are column names exactly as they appear in
/// result sets, so two queries reporting the same column name share a
/// record.
///
/// All mutation goes through `&mut self`; a host sharing a store between
/// threads must wrap it in a `Mutex` and hold the lock across [`replace`].
///
/// [`replace`]: DeltaStore::replace
#[derive(Debug, Default)]
pub struct DeltaStore {
    records: HashMap<String, DeltaRecord>,
}

impl DeltaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&DeltaRecord> {
        self.records.get(column)
    }

    pub fn set(&mut self, column: &str, value: TypedValue, observed_at: DateTime<Utc>) {
        self.replace(column, value, observed_at);
    }

    /// Stores a new observation and returns the one it replaced.
    pub fn replace(
        &mut self,
        column: &str,
        value: TypedValue,
        observed_at: DateTime<Utc>,
    ) -> Option<DeltaRecord> {
        let record = DeltaRecord {
            last_value: value,
            observed_at,
        };
        match self.records.get_mut(column) {
            Some(existing) => Some(std::mem::replace(existing, record)),
            None => {
                self.records.insert(column.to_string(), record);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, DeltaRecord> {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Rounds to an integer: up when the fractional part is at least 0.5,
/// down otherwise.
///
/// The fractional part keeps the sign of `x`, so negative halves round
/// down (`-2.5` gives `-3`).
pub fn round_half_up_from_below(x: f64) -> i64 {
    let rounded = if x.fract() >= 0.5 { x.ceil() } else { x.floor() };
    rounded as i64
}

/// Seconds between two observations, with sub-second precision.
pub fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(from);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Computes the per-second rate between two observations of a column.
///
/// Returns zero of the new value's type when the counter did not advance,
/// when `elapsed_secs` is not positive, or when the stored value has a
/// different type. Strings pass through.
pub fn compute_delta(old: &TypedValue, new: &TypedValue, elapsed_secs: f64) -> TypedValue {
    let degenerate = !(elapsed_secs.is_finite() && elapsed_secs > 0.0);

    match (old, new) {
        (TypedValue::Integer(old), TypedValue::Integer(new)) => {
            if degenerate || new <= old {
                return TypedValue::Integer(0);
            }
            let diff = (i128::from(*new) - i128::from(*old)) as f64;
            TypedValue::Integer(round_half_up_from_below(diff / elapsed_secs))
        }
        (TypedValue::Float(old), TypedValue::Float(new)) => {
            if degenerate || new <= old {
                return TypedValue::Float(0.0);
            }
            TypedValue::Float((new - old) / elapsed_secs)
        }
        (_, TypedValue::String(s)) => TypedValue::String(s.clone()),
        (_, TypedValue::Integer(_)) => TypedValue::Integer(0),
        (_, TypedValue::Float(_)) => TypedValue::Float(0.0),
    }
}
