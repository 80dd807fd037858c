//! Poll orchestration: run every configured query once and publish the
//! resulting events.
//!
//! Queries run in declared order and every row of a query is processed
//! before the next query starts. [`Poller::poll`] takes `&mut self`, so a
//! poller can never have two cycles in flight; the delta store it owns needs
//! no locking as a result.
//!
//! Failure policy:
//! - a row that cannot be read is logged and ends that query's row loop
//! - a two-columns query still publishes whatever it accumulated before the
//!   bad row
//! - a query that fails to execute aborts the rest of the cycle and is
//!   returned as [`PollError::Query`]

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::delta::DeltaStore;
use crate::event::Event;
use crate::publish::Publisher;
use crate::query::{QuerySpec, QueryType};
use crate::source::{RowCursor, RowSource, SourceError};
use crate::translate::RowTranslator;

/// Error returned when a poll cycle is aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// Query at `index` (zero-based) failed to execute.
    Query { index: usize, error: SourceError },
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::Query { index, error } => write!(f, "query #{}: {}", index + 1, error),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Query { error, .. } => Some(error),
        }
    }
}

/// Outcome of one completed poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Queries executed.
    pub queries: usize,
    /// Events handed to the publisher.
    pub events_sent: usize,
    /// Rows that could not be read.
    pub row_errors: usize,
    /// Wall time of the cycle.
    pub duration: Duration,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

/// Runs the configured queries and publishes their events.
pub struct Poller<P: Publisher> {
    queries: Vec<QuerySpec>,
    translator: RowTranslator,
    store: DeltaStore,
    publisher: P,
    clock: Clock,
}

impl<P: Publisher> Poller<P> {
    pub fn new(queries: Vec<QuerySpec>, translator: RowTranslator, publisher: P) -> Self {
        Self {
            queries,
            translator,
            store: DeltaStore::new(),
            publisher,
            clock: Box::new(Utc::now),
        }
    }

    /// Uses an existing delta store instead of an empty one.
    pub fn with_store(mut self, store: DeltaStore) -> Self {
        self.store = store;
        self
    }

    /// Overrides the time source used to stamp events and compute deltas.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn queries(&self) -> &[QuerySpec] {
        &self.queries
    }

    pub fn delta_store(&self) -> &DeltaStore {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    /// Runs one poll cycle against `source`.
    pub fn poll<S: RowSource + ?Sized>(&mut self, source: &mut S) -> Result<PollSummary, PollError> {
        let started = Instant::now();
        let mut summary = PollSummary::default();

        for (index, spec) in self.queries.iter().enumerate() {
            let now = (self.clock)();
            let mut cursor = source
                .query(&spec.query_text)
                .map_err(|error| PollError::Query { index, error })?;
            summary.queries += 1;

            let mut run = QueryRun {
                index,
                query_type: spec.query_type,
                now,
                translator: &self.translator,
                store: &mut self.store,
                publisher: &mut self.publisher,
                summary: &mut summary,
            };
            run.process(cursor.as_mut());
        }

        summary.duration = started.elapsed();
        debug!(
            queries = summary.queries,
            events = summary.events_sent,
            row_errors = summary.row_errors,
            duration_ms = summary.duration.as_millis() as u64,
            "poll finished"
        );
        Ok(summary)
    }
}

/// State for processing the rows of one executed query.
struct QueryRun<'a, P: Publisher> {
    index: usize,
    query_type: QueryType,
    now: DateTime<Utc>,
    translator: &'a RowTranslator,
    store: &'a mut DeltaStore,
    publisher: &'a mut P,
    summary: &'a mut PollSummary,
}

impl<P: Publisher> QueryRun<'_, P> {
    fn process<C: RowCursor + ?Sized>(&mut self, cursor: &mut C) {
        let columns = cursor.columns().to_vec();

        match self.query_type {
            QueryType::SingleRow | QueryType::SlaveDelay => {
                // Only the first row is used.
                match cursor.next_row() {
                    Some(Ok(cells)) => self.translate(&columns, &cells),
                    Some(Err(e)) => self.row_error(&e.to_string()),
                    None => {}
                }
            }
            QueryType::MultipleRows => {
                while let Some(row) = cursor.next_row() {
                    match row {
                        Ok(cells) => self.translate(&columns, &cells),
                        Err(e) => {
                            self.row_error(&e.to_string());
                            break;
                        }
                    }
                }
            }
            QueryType::TwoColumns => {
                let mut event = self.translator.new_event(self.now);
                while let Some(row) = cursor.next_row() {
                    match row {
                        Ok(cells) if cells.len() >= 2 => {
                            self.translator.append_pair(
                                self.store,
                                &mut event,
                                &cells[0],
                                &cells[1],
                                self.now,
                            );
                        }
                        Ok(cells) => {
                            self.row_error(&format!(
                                "expected two columns, got {}",
                                cells.len()
                            ));
                            break;
                        }
                        Err(e) => {
                            self.row_error(&e.to_string());
                            break;
                        }
                    }
                }
                if !event.is_empty() {
                    self.emit(&event);
                }
            }
        }
    }

    fn translate(&mut self, columns: &[String], cells: &[String]) {
        if let Some(event) =
            self.translator
                .translate_row(self.store, self.query_type, columns, cells, self.now)
        {
            self.emit(&event);
        }
    }

    fn emit(&mut self, event: &Event) {
        self.publisher.publish(event);
        self.summary.events_sent += 1;
        info!(query = self.index + 1, "{} event sent", self.query_type);
    }

    fn row_error(&mut self, message: &str) {
        self.summary.row_errors += 1;
        error!(
            query = self.index + 1,
            kind = %self.query_type,
            error = message,
            "error generating event from rows"
        );
    }
}
