//! Scripted in-memory row source for testing the poller without a database.

use std::collections::{HashMap, VecDeque};

use super::traits::{BufferedCursor, RowCursor, RowSource, SourceError};

/// One scripted result set.
#[derive(Debug, Clone, Default)]
pub struct MockResult {
    columns: Vec<String>,
    rows: Vec<Result<Vec<String>, SourceError>>,
}

impl MockResult {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row of raw cells.
    pub fn row(mut self, cells: &[&str]) -> Self {
        self.rows
            .push(Ok(cells.iter().map(|c| c.to_string()).collect()));
        self
    }

    /// Appends a row that fails to scan.
    pub fn scan_error(mut self, message: &str) -> Self {
        self.rows.push(Err(SourceError::Scan(message.to_string())));
        self
    }
}

/// Row source answering queries from scripted results.
///
/// Each query text has a queue of responses consumed one per execution;
/// the last response is repeated once the queue is down to one entry.
/// Queries without a script fail with [`SourceError::Query`].
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    scripts: HashMap<String, VecDeque<Result<MockResult, SourceError>>>,
    executed: Vec<String>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a result set for `sql`.
    pub fn push_result(&mut self, sql: &str, result: MockResult) -> &mut Self {
        self.scripts
            .entry(sql.to_string())
            .or_default()
            .push_back(Ok(result));
        self
    }

    /// Queues a query failure for `sql`.
    pub fn push_failure(&mut self, sql: &str, error: SourceError) -> &mut Self {
        self.scripts
            .entry(sql.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Every query executed so far, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    fn next_response(&mut self, sql: &str) -> Result<MockResult, SourceError> {
        let Some(queue) = self.scripts.get_mut(sql) else {
            return Err(SourceError::Query(format!("no scripted result for '{}'", sql)));
        };
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.unwrap_or_else(|| Err(SourceError::Query(format!("no scripted result for '{}'", sql))))
    }
}

impl RowSource for MockSource {
    fn query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + 'a>, SourceError> {
        self.executed.push(sql.to_string());
        let result = self.next_response(sql)?;
        Ok(Box::new(BufferedCursor::new(result.columns, result.rows)))
    }
}
