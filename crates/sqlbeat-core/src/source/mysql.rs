//! MySQL row source.
//!
//! Queries go through the text protocol (`query_iter`), so the server sends
//! cells as strings and `SHOW SLAVE STATUS` works like any other statement.

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, Value};
use tracing::warn;

use super::traits::{BufferedCursor, RowCursor, RowSource, SourceError};

type Rows = Vec<Result<Vec<String>, SourceError>>;

/// Row source backed by a single MySQL connection.
///
/// Same reconnect policy as the PostgreSQL source: server errors keep the
/// connection, anything else drops it and the next query reconnects.
pub struct MysqlSource {
    opts: Opts,
    conn: Option<Conn>,
    last_error: Option<String>,
}

impl MysqlSource {
    pub fn new(opts: impl Into<Opts>) -> Self {
        Self {
            opts: opts.into(),
            conn: None,
            last_error: None,
        }
    }

    /// Attempts to connect now instead of on the first query.
    pub fn try_connect(&mut self) -> Result<(), SourceError> {
        self.ensure_connected().map(|_| ())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ensure_connected(&mut self) -> Result<&mut Conn, SourceError> {
        if self.conn.is_none() {
            match Conn::new(self.opts.clone()) {
                Ok(conn) => {
                    self.conn = Some(conn);
                    self.last_error = None;
                }
                Err(e) => {
                    let msg = e.to_string();
                    self.last_error = Some(msg.clone());
                    return Err(SourceError::Connection(msg));
                }
            }
        }

        self.conn
            .as_mut()
            .ok_or_else(|| SourceError::Connection("not connected".to_string()))
    }
}

impl RowSource for MysqlSource {
    fn query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + 'a>, SourceError> {
        let conn = self.ensure_connected()?;

        match read_result_set(conn, sql) {
            Ok((columns, rows)) => Ok(Box::new(BufferedCursor::new(columns, rows))),
            Err(e) => {
                let msg = e.to_string();
                if !matches!(e, mysql::Error::MySqlError(_)) {
                    warn!(error = %msg, "dropping MySQL connection");
                    self.conn = None;
                }
                self.last_error = Some(msg.clone());
                Err(SourceError::Query(msg))
            }
        }
    }
}

/// Reads the first result set of `sql` as text cells.
///
/// A failure while streaming rows is kept as a trailing scan error so the
/// rows before it are still delivered.
fn read_result_set(conn: &mut Conn, sql: &str) -> mysql::Result<(Vec<String>, Rows)> {
    let mut result = conn.query_iter(sql)?;
    let Some(set) = result.iter() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let columns: Vec<String> = set
        .columns()
        .as_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();

    let mut rows: Rows = Vec::new();
    for row in set {
        match row {
            Ok(row) => {
                let cells = (0..row.len())
                    .map(|i| row.as_ref(i).map(cell_text).unwrap_or_default())
                    .collect();
                rows.push(Ok(cells));
            }
            Err(e) => {
                rows.push(Err(SourceError::Scan(e.to_string())));
                break;
            }
        }
    }

    Ok((columns, rows))
}

/// Text form of a cell. `NULL` becomes the empty string.
fn cell_text(value: &Value) -> String {
    match value {
        Value::NULL => String::new(),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::Int(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(d) => d.to_string(),
        other => other.as_sql(true).trim_matches('\'').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql::OptsBuilder;
    use std::time::Duration;

    #[test]
    fn text_cells_are_passed_through() {
        assert_eq!(cell_text(&Value::Bytes(b"42".to_vec())), "42");
        assert_eq!(cell_text(&Value::Bytes(b"NULL".to_vec())), "NULL");
        assert_eq!(cell_text(&Value::NULL), "");
    }

    #[test]
    fn binary_values_render_as_text() {
        assert_eq!(cell_text(&Value::Int(-7)), "-7");
        assert_eq!(cell_text(&Value::UInt(18_446_744_073_709_551_615)), "18446744073709551615");
        assert_eq!(cell_text(&Value::Double(0.25)), "0.25");
        assert_eq!(
            cell_text(&Value::Date(2026, 2, 7, 17, 0, 0, 0)),
            "2026-02-07 17:00:00"
        );
    }

    #[test]
    fn unreachable_server_reports_connection_error() {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some("127.0.0.1"))
            .tcp_port(1)
            .tcp_connect_timeout(Some(Duration::from_secs(1)));
        let mut source = MysqlSource::new(opts);

        let err = source.try_connect().unwrap_err();
        assert!(matches!(err, SourceError::Connection(_)));
        assert!(source.last_error().is_some());
        assert!(!source.is_connected());

        let err = source.query("SHOW SLAVE STATUS").err().unwrap();
        assert!(matches!(err, SourceError::Connection(_)));
    }
}
