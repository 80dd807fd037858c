//! Query execution against a database.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   query(sql)   ┌───────────────┐
//! │    Poller     │ ─────────────▶ │   RowSource   │ (trait)
//! └───────┬───────┘                └───────┬───────┘
//!         │  columns() / next_row()        │
//!         ◀────────────────────────────────┘
//!                                          │
//!              ┌───────────────────────────┼───────────────────────────┐
//!              │                           │                           │
//!       ┌──────▼──────┐             ┌──────▼──────┐             ┌──────▼──────┐
//!       │  PgSource   │             │ MysqlSource │             │ MockSource  │
//!       │ (postgres)  │             │   (mysql)   │             │  (Testing)  │
//!       └─────────────┘             └─────────────┘             └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use sqlbeat_core::source::{MockResult, MockSource, RowSource};
//!
//! let mut source = MockSource::new();
//! source.push_result("SELECT 1 AS one", MockResult::new(&["one"]).row(&["1"]));
//!
//! let mut cursor = source.query("SELECT 1 AS one").unwrap();
//! assert_eq!(cursor.columns(), ["one".to_string()]);
//! assert_eq!(cursor.next_row(), Some(Ok(vec!["1".to_string()])));
//! ```

pub mod mock;
mod mysql;
mod pg;
pub mod traits;

pub use mock::{MockResult, MockSource};
pub use self::mysql::MysqlSource;
pub use pg::{PgSource, SslMode};
pub use traits::{BufferedCursor, RowCursor, RowSource, SourceError};
