//! sqlbeat-core - turns periodic SQL query results into telemetry events.
//!
//! Provides:
//! - `value`: classification of raw text cells into numbers or strings
//! - `delta`: per-column rate tracking for counter-style columns
//! - `translate`: row to event shaping per query type
//! - `poller`: runs the configured queries once per tick
//! - `source`: query execution abstraction (PostgreSQL, MySQL, mock)
//! - `publish`: event sinks (JSON lines, in-memory)
//! - `config`: configuration file loading and validation
//! - `event`, `query`: event and query models
//! - `util`: helper utilities
//!
//! # Example
//!
//! ```
//! use sqlbeat_core::poller::Poller;
//! use sqlbeat_core::publish::MemoryPublisher;
//! use sqlbeat_core::query::{QuerySpec, QueryType};
//! use sqlbeat_core::source::{MockResult, MockSource};
//! use sqlbeat_core::translate::RowTranslator;
//!
//! let mut source = MockSource::new();
//! source.push_result(
//!     "SELECT name, value FROM stats",
//!     MockResult::new(&["name", "value"]).row(&["cpu", "1"]).row(&["mem", "2"]),
//! );
//!
//! let queries = vec![QuerySpec::new("SELECT name, value FROM stats", QueryType::TwoColumns)];
//! let translator = RowTranslator::new("__DELTA", "postgres");
//! let mut poller = Poller::new(queries, translator, MemoryPublisher::new());
//!
//! let summary = poller.poll(&mut source).unwrap();
//! assert_eq!(summary.events_sent, 1);
//! assert_eq!(poller.publisher().events()[0].len(), 2);
//! ```

pub mod config;
pub mod delta;
pub mod event;
pub mod poller;
pub mod publish;
pub mod query;
pub mod source;
pub mod translate;
pub mod util;
pub mod value;
