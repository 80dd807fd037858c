//! Beat configuration.
//!
//! The configuration file is a JSON object; every key is optional except
//! `dbtype`, `queries` and `querytypes`. `database` is required for
//! PostgreSQL:
//!
//! ```json
//! {
//!   "period": "10s",
//!   "dbtype": "postgres",
//!   "hostname": "127.0.0.1",
//!   "port": 5432,
//!   "username": "sqlbeat_user",
//!   "password": "sqlbeat_pass",
//!   "database": "app",
//!   "postgressslmode": "disable",
//!   "queries": ["SELECT count(*) AS connections FROM pg_stat_activity"],
//!   "querytypes": ["single-row"],
//!   "deltawildcard": "__DELTA"
//! }
//! ```
//!
//! [`Config::validate`] checks the file and fills in defaults, producing a
//! [`ValidConfig`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::query::{QuerySpec, QueryType};
use crate::source::SslMode;
use crate::translate::DEFAULT_DELTA_WILDCARD;
use crate::util::parse_duration;

pub const DEFAULT_PERIOD: &str = "10s";
pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_USERNAME: &str = "sqlbeat_user";
pub const DEFAULT_PASSWORD: &str = "sqlbeat_pass";

/// Error type for configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(std::io::Error),
    /// The configuration file is not valid JSON of the expected shape.
    Parse(serde_json::Error),
    /// A value is missing or not acceptable.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Error reading config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Error parsing config file: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Mysql,
    Postgres,
}

impl DbType {
    pub fn as_str(self) -> &'static str {
        match self {
            DbType::Mysql => "mysql",
            DbType::Postgres => "postgres",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            DbType::Mysql => 3306,
            DbType::Postgres => 5432,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(DbType::Mysql),
            "postgres" => Ok(DbType::Postgres),
            other => Err(ConfigError::Invalid(format!(
                "unknown DB type '{}', supported DB types: mysql, postgres",
                other
            ))),
        }
    }
}

/// Configuration as read from disk, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub period: Option<String>,
    pub dbtype: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(rename = "postgressslmode")]
    pub postgres_ssl_mode: Option<String>,
    pub queries: Vec<String>,
    #[serde(rename = "querytypes")]
    pub query_types: Vec<String>,
    #[serde(rename = "deltawildcard")]
    pub delta_wildcard: Option<String>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(ConfigError::Parse)
    }

    /// Checks the configuration and fills in defaults for missing values.
    pub fn validate(self) -> Result<ValidConfig, ConfigError> {
        let db_type: DbType = non_empty(self.dbtype)
            .ok_or_else(|| ConfigError::Invalid("dbtype must be set".to_string()))?
            .parse()?;

        if self.queries.is_empty() {
            return Err(ConfigError::Invalid(
                "there are no queries to execute".to_string(),
            ));
        }
        if self.queries.len() != self.query_types.len() {
            return Err(ConfigError::Invalid(format!(
                "queries ({}) and querytypes ({}) must have the same length, \
                 each query needs a type at the same index",
                self.queries.len(),
                self.query_types.len()
            )));
        }

        let queries = self
            .queries
            .into_iter()
            .zip(&self.query_types)
            .enumerate()
            .map(|(i, (text, kind))| {
                let query_type: QueryType = kind
                    .parse()
                    .map_err(|e| ConfigError::Invalid(format!("query #{}: {}", i + 1, e)))?;
                Ok(QuerySpec::new(text, query_type))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let database = non_empty(self.database);
        let (database, ssl_mode) = match db_type {
            DbType::Postgres => {
                let database = database.ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "database must be selected when using DB type {}",
                        db_type
                    ))
                })?;
                let ssl_mode = match non_empty(self.postgres_ssl_mode) {
                    Some(mode) => mode.parse::<SslMode>().map_err(ConfigError::Invalid)?,
                    None => {
                        info!(
                            "PostgresSSLMode not selected, proceeding with '{}' as default",
                            SslMode::default()
                        );
                        SslMode::default()
                    }
                };
                (database, ssl_mode)
            }
            // MySQL connects without a default schema when none is given.
            DbType::Mysql => (database.unwrap_or_default(), SslMode::default()),
        };

        let period_str = non_empty(self.period).unwrap_or_else(|| {
            info!(
                "Period not selected, proceeding with '{}' as default",
                DEFAULT_PERIOD
            );
            DEFAULT_PERIOD.to_string()
        });
        let period = parse_duration(&period_str)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if period.is_zero() {
            return Err(ConfigError::Invalid("period must be positive".to_string()));
        }

        let hostname = non_empty(self.hostname).unwrap_or_else(|| {
            info!(
                "Hostname not selected, proceeding with '{}' as default",
                DEFAULT_HOSTNAME
            );
            DEFAULT_HOSTNAME.to_string()
        });

        let port = self.port.unwrap_or_else(|| {
            let port = db_type.default_port();
            info!("Port not selected, proceeding with '{}' as default", port);
            port
        });

        let username = non_empty(self.username).unwrap_or_else(|| {
            info!(
                "Username not selected, proceeding with '{}' as default",
                DEFAULT_USERNAME
            );
            DEFAULT_USERNAME.to_string()
        });

        let password = non_empty(self.password).unwrap_or_else(|| {
            info!("Password not selected, proceeding with default password");
            DEFAULT_PASSWORD.to_string()
        });

        let delta_wildcard = non_empty(self.delta_wildcard).unwrap_or_else(|| {
            info!(
                "DeltaWildcard not selected, proceeding with '{}' as default",
                DEFAULT_DELTA_WILDCARD
            );
            DEFAULT_DELTA_WILDCARD.to_string()
        });

        Ok(ValidConfig {
            period,
            db_type,
            hostname,
            port,
            username,
            password,
            database,
            ssl_mode,
            queries,
            delta_wildcard,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Validated configuration with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidConfig {
    pub period: Duration,
    pub db_type: DbType,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: SslMode,
    pub queries: Vec<QuerySpec>,
    pub delta_wildcard: String,
}

impl ValidConfig {
    /// Tag carried in every event's `type` field.
    pub fn source_type(&self) -> &'static str {
        self.db_type.as_str()
    }

    /// libpq key=value connection string, used for PostgreSQL.
    pub fn connection_string(&self) -> String {
        let mut parts = vec![
            format!("host={}", quote_value(&self.hostname)),
            format!("port={}", self.port),
            format!("user={}", quote_value(&self.username)),
        ];
        if !self.password.is_empty() {
            parts.push(format!("password={}", quote_value(&self.password)));
        }
        parts.push(format!("dbname={}", quote_value(&self.database)));
        parts.push(format!("sslmode={}", self.ssl_mode));
        parts.join(" ")
    }

    /// Connection options for MySQL. An empty database or password is left
    /// unset.
    pub fn mysql_opts(&self) -> mysql::Opts {
        let builder = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(self.hostname.as_str()))
            .tcp_port(self.port)
            .user(Some(self.username.as_str()))
            .pass(Some(self.password.as_str()).filter(|p| !p.is_empty()))
            .db_name(Some(self.database.as_str()).filter(|d| !d.is_empty()));
        mysql::Opts::from(builder)
    }
}

/// Quotes a libpq connection value when it contains spaces, quotes or
/// backslashes.
fn quote_value(value: &str) -> String {
    if !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\')
    {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal() -> Config {
        Config {
            dbtype: Some("postgres".into()),
            database: Some("app".into()),
            queries: vec!["SELECT 1 AS one".into()],
            query_types: vec!["single-row".into()],
            ..Default::default()
        }
    }

    fn invalid_message(config: Config) -> String {
        match config.validate() {
            Err(ConfigError::Invalid(msg)) => msg,
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let valid = minimal().validate().unwrap();
        assert_eq!(valid.period, Duration::from_secs(10));
        assert_eq!(valid.hostname, DEFAULT_HOSTNAME);
        assert_eq!(valid.port, 5432);
        assert_eq!(valid.username, DEFAULT_USERNAME);
        assert_eq!(valid.password, DEFAULT_PASSWORD);
        assert_eq!(valid.ssl_mode, SslMode::Disable);
        assert_eq!(valid.delta_wildcard, "__DELTA");
        assert_eq!(valid.source_type(), "postgres");
        assert_eq!(
            valid.queries,
            vec![QuerySpec::new("SELECT 1 AS one", QueryType::SingleRow)]
        );
    }

    #[test]
    fn parses_lowercase_key_names() {
        let config = Config::from_json(
            r#"{
                "period": "1m30s",
                "dbtype": "postgres",
                "hostname": "db.internal",
                "port": 6432,
                "username": "beat",
                "password": "secret",
                "database": "metrics",
                "postgressslmode": "require",
                "queries": ["SELECT 1", "SELECT name, value FROM kv"],
                "querytypes": ["single-row", "two-columns"],
                "deltawildcard": "_rate"
            }"#,
        )
        .unwrap();
        let valid = config.validate().unwrap();

        assert_eq!(valid.period, Duration::from_secs(90));
        assert_eq!(valid.port, 6432);
        assert_eq!(valid.ssl_mode, SslMode::Require);
        assert_eq!(valid.delta_wildcard, "_rate");
        assert_eq!(valid.queries[1].query_type, QueryType::TwoColumns);
        assert_eq!(
            valid.connection_string(),
            "host=db.internal port=6432 user=beat password=secret dbname=metrics sslmode=require"
        );
    }

    #[test]
    fn from_file_reads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dbtype":"postgres","database":"app","queries":["SELECT 1"],"querytypes":["multiple-rows"]}}"#
        )
        .unwrap();

        let valid = Config::from_file(file.path()).unwrap().validate().unwrap();
        assert_eq!(valid.queries[0].query_type, QueryType::MultipleRows);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::from_file("/nonexistent/sqlbeat.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = Config::from_json("{\"queries\": 5}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_db_type() {
        let msg = invalid_message(Config {
            dbtype: Some("oracle".into()),
            ..minimal()
        });
        assert!(msg.contains("unknown DB type 'oracle'"));
    }

    #[test]
    fn rejects_missing_queries() {
        let msg = invalid_message(Config {
            queries: vec![],
            query_types: vec![],
            ..minimal()
        });
        assert!(msg.contains("no queries"));
    }

    #[test]
    fn rejects_length_mismatch() {
        let msg = invalid_message(Config {
            query_types: vec!["single-row".into(), "two-columns".into()],
            ..minimal()
        });
        assert!(msg.contains("same length"));
    }

    #[test]
    fn rejects_unknown_query_type_with_index() {
        let msg = invalid_message(Config {
            queries: vec!["SELECT 1".into(), "SELECT 2".into()],
            query_types: vec!["single-row".into(), "rows".into()],
            ..minimal()
        });
        assert!(msg.starts_with("query #2: unknown query type 'rows'"));
    }

    #[test]
    fn mysql_uses_its_own_defaults() {
        let valid = Config {
            dbtype: Some("mysql".into()),
            database: None,
            queries: vec!["SHOW SLAVE STATUS".into()],
            query_types: vec!["show-slave-delay".into()],
            ..minimal()
        }
        .validate()
        .unwrap();

        assert_eq!(valid.db_type, DbType::Mysql);
        assert_eq!(valid.port, 3306);
        assert_eq!(valid.source_type(), "mysql");
        assert_eq!(valid.database, "");
        assert_eq!(valid.queries[0].query_type, QueryType::SlaveDelay);

        let opts = valid.mysql_opts();
        assert_eq!(opts.get_ip_or_hostname(), DEFAULT_HOSTNAME);
        assert_eq!(opts.get_tcp_port(), 3306);
        assert_eq!(opts.get_user(), Some(DEFAULT_USERNAME));
        assert_eq!(opts.get_pass(), Some(DEFAULT_PASSWORD));
        assert_eq!(opts.get_db_name(), None);
    }

    #[test]
    fn mysql_options_follow_config() {
        let config = Config::from_json(
            r#"{
                "dbtype": "mysql",
                "hostname": "replica-2",
                "port": 3307,
                "username": "monitor",
                "password": "",
                "database": "shop",
                "queries": ["SHOW GLOBAL STATUS"],
                "querytypes": ["two-columns"]
            }"#,
        )
        .unwrap();
        let valid = config.validate().unwrap();

        let opts = valid.mysql_opts();
        assert_eq!(opts.get_ip_or_hostname(), "replica-2");
        assert_eq!(opts.get_tcp_port(), 3307);
        assert_eq!(opts.get_user(), Some("monitor"));
        assert_eq!(opts.get_db_name(), Some("shop"));
        // An empty password in the file falls back to the default.
        assert_eq!(opts.get_pass(), Some(DEFAULT_PASSWORD));
    }

    #[test]
    fn rejects_missing_database() {
        let msg = invalid_message(Config {
            database: Some(String::new()),
            ..minimal()
        });
        assert!(msg.contains("database must be selected"));
    }

    #[test]
    fn rejects_bad_period() {
        let msg = invalid_message(Config {
            period: Some("ten seconds".into()),
            ..minimal()
        });
        assert!(msg.contains("ten seconds"));

        let msg = invalid_message(Config {
            period: Some("0s".into()),
            ..minimal()
        });
        assert!(msg.contains("positive"));
    }

    #[test]
    fn rejects_unknown_ssl_mode() {
        let msg = invalid_message(Config {
            postgres_ssl_mode: Some("verify-full".into()),
            ..minimal()
        });
        assert!(msg.contains("unknown ssl mode"));
    }

    #[test]
    fn connection_string_quotes_special_values() {
        let mut valid = minimal().validate().unwrap();
        valid.password = "it's a secret".into();
        assert_eq!(
            valid.connection_string(),
            r"host=127.0.0.1 port=5432 user=sqlbeat_user password='it\'s a secret' dbname=app sslmode=disable"
        );

        valid.password = String::new();
        assert!(!valid.connection_string().contains("password="));
    }
}
