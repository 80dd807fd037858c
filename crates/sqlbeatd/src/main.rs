//! sqlbeatd - SQL query metrics beat.
//!
//! Runs the configured queries against the database on every tick and writes
//! each resulting event as one JSON line to stdout or a file.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use sqlbeat_core::config::{Config, DbType, ValidConfig};
use sqlbeat_core::poller::Poller;
use sqlbeat_core::publish::JsonLinesPublisher;
use sqlbeat_core::source::{MysqlSource, PgSource, RowSource, SourceError};
use sqlbeat_core::translate::RowTranslator;
use sqlbeat_core::util::parse_duration;

/// SQL query metrics beat.
#[derive(Parser)]
#[command(name = "sqlbeatd", about = "Periodically turns SQL query results into events", version)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,

    /// Poll period (e.g., "10s", "1m30s"). Overrides the config file.
    #[arg(short, long, value_parser = parse_period)]
    period: Option<Duration>,

    /// Append events to this file instead of writing them to stdout.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Database password. Overrides the config file.
    #[arg(long, env = "SQLBEAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Run a single poll and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_period(s: &str) -> Result<Duration, String> {
    let period = parse_duration(s).map_err(|e| e.to_string())?;
    if period.is_zero() {
        return Err("period must be positive".to_string());
    }
    Ok(period)
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
///
/// Logs go to stderr so stdout stays a clean event stream.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["sqlbeatd", "sqlbeat_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<ValidConfig, String> {
    let mut config = Config::from_file(&args.config)
        .and_then(Config::validate)
        .map_err(|e| format!("{}: {}", args.config.display(), e))?;

    if let Some(period) = args.period {
        config.period = period;
    }
    if let Some(ref password) = args.password {
        config.password = password.clone();
    }
    Ok(config)
}

fn open_output(path: Option<&PathBuf>) -> std::io::Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// Builds the row source for the configured database and connects eagerly.
/// A failed first connection is only a warning; polls keep retrying.
fn open_source(config: &ValidConfig) -> Box<dyn RowSource> {
    let (name, source, connected): (&str, Box<dyn RowSource>, Result<(), SourceError>) =
        match config.db_type {
            DbType::Postgres => {
                let mut source = PgSource::new(config.connection_string(), config.ssl_mode);
                let connected = source.try_connect();
                ("PostgreSQL", Box::new(source), connected)
            }
            DbType::Mysql => {
                let mut source = MysqlSource::new(config.mysql_opts());
                let connected = source.try_connect();
                ("MySQL", Box::new(source), connected)
            }
        };

    match connected {
        Ok(()) => info!("{}: connected to {}:{}", name, config.hostname, config.port),
        Err(e) => warn!(
            "{}: initial connection failed ({}), will retry on next poll",
            name, e
        ),
    }
    source
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("sqlbeatd {} starting", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Config: period={:?}, dbtype={}, host={}:{}, database={}, sslmode={}",
        config.period, config.db_type, config.hostname, config.port, config.database, config.ssl_mode
    );
    info!("Total # of queries to execute: {}", config.queries.len());
    for (index, spec) in config.queries.iter().enumerate() {
        info!(
            "Query #{} (type: {}): {}",
            index + 1,
            spec.query_type,
            spec.query_text
        );
    }

    let output = match open_output(args.output.as_ref()) {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to open output: {}", e);
            std::process::exit(1);
        }
    };
    match args.output {
        Some(ref path) => info!("Writing events to {}", path.display()),
        None => info!("Writing events to stdout"),
    }

    let mut source = open_source(&config);

    let translator = RowTranslator::new(config.delta_wildcard.as_str(), config.source_type());
    let mut poller = Poller::new(
        config.queries.clone(),
        translator,
        JsonLinesPublisher::new(output),
    );

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let interval = config.period;
    let mut poll_count: u64 = 0;
    let mut failed_polls: u64 = 0;
    let mut events_sent: u64 = 0;

    info!("sqlbeat is running! Hit CTRL-C to stop it.");

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        match poller.poll(source.as_mut()) {
            Ok(summary) => {
                poll_count += 1;
                events_sent += summary.events_sent as u64;
                debug!(
                    "Poll #{}: {} queries, {} events, {} row errors in {:?}",
                    poll_count,
                    summary.queries,
                    summary.events_sent,
                    summary.row_errors,
                    summary.duration
                );
            }
            Err(e) => {
                failed_polls += 1;
                error!("Poll failed: {}", e);
                if args.once {
                    std::process::exit(1);
                }
            }
        }

        if args.once {
            break;
        }

        // Missed ticks are coalesced: an overrunning poll is followed
        // directly by the next one.
        let elapsed = started.elapsed();
        if elapsed >= interval {
            warn!(
                "Poll took {:?}, longer than the {:?} period; skipping missed ticks",
                elapsed, interval
            );
            continue;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval - elapsed;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    // Graceful shutdown
    info!("Shutting down...");
    info!(
        "{} polls completed, {} failed, {} events sent, {} delta columns tracked",
        poll_count,
        failed_polls,
        events_sent,
        poller.delta_store().len()
    );
    let write_failures = poller.publisher().failures();
    if write_failures > 0 {
        warn!("{} events could not be written", write_failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_period_accepts_go_durations() {
        assert_eq!(parse_period("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_period("1m30s"), Ok(Duration::from_secs(90)));
    }

    #[test]
    fn parse_period_rejects_zero_and_garbage() {
        assert!(parse_period("0s").is_err());
        assert!(parse_period("soon").is_err());
    }

    #[test]
    fn cli_overrides_config_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"dbtype":"postgres","database":"app","password":"from-file","queries":["SELECT 1"],"querytypes":["single-row"]}}"#
        )
        .unwrap();

        let args = Args::parse_from([
            "sqlbeatd",
            "--config",
            file.path().to_str().unwrap(),
            "--period",
            "2s",
            "--password",
            "from-cli",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.period, Duration::from_secs(2));
        assert_eq!(config.password, "from-cli");
        assert_eq!(config.database, "app");
    }

    #[test]
    fn missing_config_names_the_path() {
        let args = Args::parse_from(["sqlbeatd", "--config", "/nonexistent/sqlbeat.json"]);
        let err = load_config(&args).unwrap_err();
        assert!(err.starts_with("/nonexistent/sqlbeat.json"));
    }
}
