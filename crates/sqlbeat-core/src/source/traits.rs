//! Abstractions over query execution to enable testing without a database.
//!
//! The poller only needs ordered column names and one raw string per cell,
//! so any driver that can produce text cells can back a [`RowSource`].

/// Error type for query execution and row reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Could not connect to the database.
    Connection(String),
    /// The query itself failed to run.
    Query(String),
    /// A row could not be read.
    Scan(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connection(msg) => write!(f, "connection error: {}", msg),
            SourceError::Query(msg) => write!(f, "query error: {}", msg),
            SourceError::Scan(msg) => write!(f, "row scan error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Cursor over the rows of one executed query.
pub trait RowCursor {
    /// Column names, in result-set order.
    fn columns(&self) -> &[String];

    /// Reads the next row as one raw string per column.
    ///
    /// SQL `NULL` is returned as the empty string. Returns `None` once the
    /// result set is exhausted.
    fn next_row(&mut self) -> Option<Result<Vec<String>, SourceError>>;
}

/// Something that can execute a query and hand back a [`RowCursor`].
pub trait RowSource {
    fn query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + 'a>, SourceError>;
}

/// A fully materialized result set.
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Result<Vec<String>, SourceError>>,
}

impl BufferedCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Result<Vec<String>, SourceError>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for BufferedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Option<Result<Vec<String>, SourceError>> {
        self.rows.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_cursor_yields_rows_in_order() {
        let mut cursor = BufferedCursor::new(
            vec!["a".into(), "b".into()],
            vec![
                Ok(vec!["1".into(), "2".into()]),
                Err(SourceError::Scan("bad".into())),
            ],
        );

        assert_eq!(cursor.columns(), ["a".to_string(), "b".to_string()]);
        assert_eq!(cursor.next_row(), Some(Ok(vec!["1".into(), "2".into()])));
        assert_eq!(cursor.next_row(), Some(Err(SourceError::Scan("bad".into()))));
        assert_eq!(cursor.next_row(), None);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SourceError::Query("relation \"x\" does not exist".into()).to_string(),
            "query error: relation \"x\" does not exist"
        );
    }
}
