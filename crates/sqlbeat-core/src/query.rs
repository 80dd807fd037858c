//! Configured queries and how their results are shaped into events.

use std::fmt;
use std::str::FromStr;

/// Column kept by [`QueryType::SlaveDelay`] queries.
pub const SLAVE_DELAY_COLUMN: &str = "Seconds_Behind_Master";

/// How a query's result set is turned into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// First row only, one event, delta columns computed.
    SingleRow,
    /// One event per row, delta columns emitted raw.
    MultipleRows,
    /// Rows are `(name, value)` pairs accumulated into one event.
    TwoColumns,
    /// First row only, keeping just `Seconds_Behind_Master`.
    SlaveDelay,
}

impl QueryType {
    pub const ALL: [QueryType; 4] = [
        QueryType::SingleRow,
        QueryType::MultipleRows,
        QueryType::TwoColumns,
        QueryType::SlaveDelay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::SingleRow => "single-row",
            QueryType::MultipleRows => "multiple-rows",
            QueryType::TwoColumns => "two-columns",
            QueryType::SlaveDelay => "show-slave-delay",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a query type name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownQueryType(pub String);

impl fmt::Display for UnknownQueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown query type '{}', supported: single-row, multiple-rows, two-columns, show-slave-delay",
            self.0
        )
    }
}

impl std::error::Error for UnknownQueryType {}

impl FromStr for QueryType {
    type Err = UnknownQueryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownQueryType(s.to_string()))
    }
}

/// A query and the shape of its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub query_text: String,
    pub query_type: QueryType,
}

impl QuerySpec {
    pub fn new(query_text: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            query_text: query_text.into(),
            query_type,
        }
    }
}
