//! Utility modules for sqlbeat.

mod duration;

pub use duration::{DurationParseError, parse_duration};
