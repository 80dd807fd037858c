//! PostgreSQL row source.
//!
//! Queries run over the simple-query protocol, which returns every cell as
//! text. That is exactly the input the classifier expects, so no per-type
//! decoding happens here.

use std::fmt;
use std::str::FromStr;

use postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, warn};

use super::traits::{BufferedCursor, RowCursor, RowSource, SourceError};

/// TLS negotiation mode, as in libpq's `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl SslMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(format!(
                "unknown ssl mode '{}', supported: disable, prefer, require",
                other
            )),
        }
    }
}

/// Row source backed by a single PostgreSQL connection.
///
/// Connects lazily on the first query. A connection-level failure drops the
/// client so the next query reconnects; errors reported by the server (bad
/// SQL, permissions) keep the connection.
pub struct PgSource {
    connection_string: String,
    ssl_mode: SslMode,
    client: Option<Client>,
    last_error: Option<String>,
}

impl PgSource {
    /// `connection_string` is in libpq key=value form.
    pub fn new(connection_string: impl Into<String>, ssl_mode: SslMode) -> Self {
        Self {
            connection_string: connection_string.into(),
            ssl_mode,
            client: None,
            last_error: None,
        }
    }

    /// Attempts to connect now instead of on the first query.
    pub fn try_connect(&mut self) -> Result<(), SourceError> {
        self.ensure_connected().map(|_| ())
    }

    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    /// Returns the last error message, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ensure_connected(&mut self) -> Result<&mut Client, SourceError> {
        if self.client.as_ref().is_some_and(|c| c.is_closed()) {
            debug!("PostgreSQL connection closed, reconnecting");
            self.client = None;
        }

        if self.client.is_none() {
            match connect(&self.connection_string, self.ssl_mode) {
                Ok(client) => {
                    self.client = Some(client);
                    self.last_error = None;
                }
                Err(msg) => {
                    self.last_error = Some(msg.clone());
                    return Err(SourceError::Connection(msg));
                }
            }
        }

        self.client
            .as_mut()
            .ok_or_else(|| SourceError::Connection("not connected".to_string()))
    }
}

impl RowSource for PgSource {
    fn query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + 'a>, SourceError> {
        let client = self.ensure_connected()?;

        let messages = match client.simple_query(sql) {
            Ok(messages) => messages,
            Err(e) => {
                let msg = describe_pg_error(&e);
                if e.as_db_error().is_none() {
                    warn!(error = %msg, "dropping PostgreSQL connection");
                    self.client = None;
                }
                self.last_error = Some(msg.clone());
                return Err(SourceError::Query(msg));
            }
        };

        let (columns, rows) = first_result_set(messages);
        Ok(Box::new(BufferedCursor::new(columns, rows)))
    }
}

fn connect(connection_string: &str, ssl_mode: SslMode) -> Result<Client, String> {
    match ssl_mode {
        SslMode::Disable => {
            Client::connect(connection_string, NoTls).map_err(|e| describe_pg_error(&e))
        }
        SslMode::Prefer | SslMode::Require => connect_tls(connection_string),
    }
}

#[cfg(feature = "tls")]
fn connect_tls(connection_string: &str) -> Result<Client, String> {
    // libpq's prefer/require encrypt without verifying the certificate.
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| format!("TLS setup failed: {}", e))?;
    let connector = postgres_native_tls::MakeTlsConnector::new(connector);
    Client::connect(connection_string, connector).map_err(|e| describe_pg_error(&e))
}

#[cfg(not(feature = "tls"))]
fn connect_tls(_connection_string: &str) -> Result<Client, String> {
    Err("built without TLS support, use sslmode=disable".to_string())
}

type Rows = Vec<Result<Vec<String>, SourceError>>;

/// Extracts the first result set that produced rows.
///
/// Cells are text; `NULL` becomes the empty string.
fn first_result_set(messages: Vec<SimpleQueryMessage>) -> (Vec<String>, Rows) {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Rows = Vec::new();

    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let cells = (0..row.len())
                    .map(|i| {
                        row.try_get(i)
                            .map(|v| v.unwrap_or_default().to_string())
                            .map_err(|e| SourceError::Scan(e.to_string()))
                    })
                    .collect::<Result<Vec<String>, SourceError>>();
                rows.push(cells);
            }
            SimpleQueryMessage::CommandComplete(_) => {
                if !rows.is_empty() {
                    break;
                }
            }
            _ => {}
        }
    }

    (columns, rows)
}

/// One-line description of a PostgreSQL error.
///
/// Server errors carry severity, SQLSTATE and the server's message, plus the
/// hint when there is one. Client-side failures keep the driver's message,
/// which already ends with the underlying cause.
fn describe_pg_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        let mut msg = format!(
            "{} {}: {}",
            db_error.severity(),
            db_error.code().code(),
            db_error.message()
        );
        if let Some(hint) = db_error.hint() {
            msg.push_str(&format!(" (hint: {})", hint));
        }
        return msg;
    }
    if e.is_closed() {
        return "connection closed by server".to_string();
    }
    e.to_string()
}
