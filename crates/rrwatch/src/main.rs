// # rrwatch - DNS resource record change monitor
//
// This binary is a thin integration layer: all change-detection logic
// lives in rrwatch-core. It is responsible for:
// 1. Reading configuration from flags (each also settable via environment)
// 2. Setting up logging
// 3. Building the resolver, notifier and history store
// 4. Running exactly one monitoring cycle, or dumping the store
// 5. Mapping the result to a distinct exit code
//
// Meant to be run from a scheduler, e.g. every five minutes from cron:
//
// ```bash
// rrwatch --rr _dmarc.example.com --qtype TXT \
//         --email hostmaster@example.com --mailhost smtp.example.com \
//         --store /var/lib/rrwatch/store.json --log /var/log/rrwatch.log
// ```

use anyhow::{Context, Result};
use clap::Parser;
use rrwatch_core::config::DEFAULT_STORE_PATH;
use rrwatch_core::{
    AlertConfig, ChangeDetector, CycleOutcome, Error, FileHistoryStore, HistoryStore,
    MonitorConfig, RecordQuery, ResolverConfig, SmtpConfig,
};
use rrwatch_notify_smtp::SmtpNotifier;
use rrwatch_resolver_dig::DigResolver;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes, one per terminal state, so schedulers can tell outcomes apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RrwatchExitCode {
    /// Record unchanged, store dumped, or help/version printed
    Clean = 0,
    /// Logging or runtime setup failed
    RuntimeError = 1,
    /// Missing or invalid arguments
    Usage = 2,
    /// First observation; baseline stored
    BaselineRecorded = 3,
    /// Record changed and the alert was delivered
    ChangedAlerted = 4,
    /// Record changed but the alert could not be delivered
    ChangedAlertFailed = 5,
    /// No usable answer from the resolver; cycle skipped
    ResolutionUnavailable = 6,
    /// Store unreadable or corrupt; nothing was done
    StoreError = 7,
    /// The new state could not be persisted
    StoreWriteFailure = 8,
}

impl From<RrwatchExitCode> for ExitCode {
    fn from(code: RrwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&CycleOutcome> for RrwatchExitCode {
    fn from(outcome: &CycleOutcome) -> Self {
        match outcome {
            CycleOutcome::BaselineRecorded { .. } => Self::BaselineRecorded,
            CycleOutcome::Unchanged { .. } => Self::Clean,
            CycleOutcome::ChangedNotified { .. } => Self::ChangedAlerted,
            CycleOutcome::ChangedNotifyFailed { .. } => Self::ChangedAlertFailed,
            CycleOutcome::ResolutionUnavailable { .. } => Self::ResolutionUnavailable,
        }
    }
}

impl From<&Error> for RrwatchExitCode {
    fn from(err: &Error) -> Self {
        match err {
            e if e.is_store_load_failure() => Self::StoreError,
            Error::StoreWrite(_) => Self::StoreWriteFailure,
            Error::Config(_) | Error::InvalidInput(_) => Self::Usage,
            _ => Self::RuntimeError,
        }
    }
}

/// Watch a DNS resource record and email an alert when its content changes
#[derive(Parser, Debug)]
#[command(name = "rrwatch", version)]
struct Cli {
    /// The DNS RR (name) to monitor
    #[arg(short = 'r', long = "rr", env = "RRWATCH_RR")]
    rr: Option<String>,

    /// The DNS query type
    #[arg(short = 't', long = "qtype", env = "RRWATCH_QTYPE", default_value = "TXT")]
    qtype: String,

    /// Local store of monitored RRs and their last fingerprint
    #[arg(short = 's', long = "store", env = "RRWATCH_STORE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,

    /// Email address to deliver alerts to
    #[arg(short = 'e', long = "email", env = "RRWATCH_EMAIL")]
    email: Option<String>,

    /// Address to send alerts from [default: $USER]
    #[arg(short = 'f', long = "from", env = "RRWATCH_FROM")]
    from: Option<String>,

    /// File to append log output to [default: stderr]
    #[arg(short = 'l', long = "log", env = "RRWATCH_LOG")]
    log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", env = "RRWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Mail relay through which alerts are delivered
    #[arg(short = 'm', long = "mailhost", env = "RRWATCH_MAILHOST", default_value = "mail")]
    mailhost: String,

    /// Mail relay port
    #[arg(long = "mail-port", env = "RRWATCH_MAIL_PORT", default_value_t = 25)]
    mail_port: u16,

    /// Name announced to the mail relay
    #[arg(long = "helo-name", env = "RRWATCH_HELO_NAME", default_value = "localhost")]
    helo_name: String,

    /// Nameserver to query instead of the system resolver
    #[arg(long = "nameserver", env = "RRWATCH_NAMESERVER")]
    nameserver: Option<String>,

    /// Lookup program (must accept dig's arguments)
    #[arg(long = "resolver-program", env = "RRWATCH_RESOLVER_PROGRAM", default_value = "dig")]
    resolver_program: String,

    /// Seconds before a lookup is abandoned
    #[arg(long = "resolve-timeout", env = "RRWATCH_RESOLVE_TIMEOUT", default_value_t = 10)]
    resolve_timeout: u64,

    /// Seconds before alert delivery is abandoned
    #[arg(long = "smtp-timeout", env = "RRWATCH_SMTP_TIMEOUT", default_value_t = 30)]
    smtp_timeout: u64,

    /// Print the content of the store and exit
    #[arg(short = 'D', long = "dump-store")]
    dump_store: bool,
}

impl Cli {
    /// Parse the log level
    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "Log level '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the monitoring configuration
    fn monitor_config(&self) -> Result<MonitorConfig> {
        let Some(rr) = self.rr.as_deref() else {
            anyhow::bail!("Please provide an RR to monitor (--rr or RRWATCH_RR).");
        };
        let Some(email) = self.email.as_deref() else {
            anyhow::bail!("Please provide an address to alert (--email or RRWATCH_EMAIL).");
        };
        let from = self
            .from
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "rrwatch".to_string());

        let config = MonitorConfig::new(
            RecordQuery::new(rr, self.qtype.as_str()),
            AlertConfig::new(from, email),
        )
        .with_store_path(&self.store);
        config.validate()?;
        Ok(config)
    }

    fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            program: self.resolver_program.clone(),
            nameserver: self.nameserver.clone(),
            timeout_secs: self.resolve_timeout,
        }
    }

    fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig {
            relay: self.mailhost.clone(),
            port: self.mail_port,
            helo_name: self.helo_name.clone(),
            timeout_secs: self.smtp_timeout,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here
            let code = if e.use_stderr() {
                RrwatchExitCode::Usage
            } else {
                RrwatchExitCode::Clean
            };
            let _ = e.print();
            return code.into();
        }
    };

    let level = match cli.level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{}", e);
            return RrwatchExitCode::Usage.into();
        }
    };

    if let Err(e) = init_logging(level, cli.log.as_ref()) {
        eprintln!("Failed to set up logging: {:#}", e);
        return RrwatchExitCode::RuntimeError.into();
    }

    debug!("Options passed in: {:?}", cli);

    // One cycle, sequential: no need for worker threads
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RrwatchExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        if cli.dump_store {
            dump_store(&cli).await
        } else {
            monitor(&cli).await
        }
    });

    debug!("Exiting with {:?} ({})", code, code as u8);
    code.into()
}

/// Install the global tracing subscriber
fn init_logging(level: Level, log_file: Option<&PathBuf>) -> Result<()> {
    let builder = FmtSubscriber::builder().with_max_level(level);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

/// Load the store at `path` and render one `<key> <fingerprint>` line per entry
async fn dump_lines(path: &Path) -> rrwatch_core::Result<Vec<String>> {
    let store = FileHistoryStore::load(path).await?;
    let records = store.dump().await?;

    Ok(records
        .iter()
        .map(|(key, fingerprint)| format!("{} {}", key, fingerprint))
        .collect())
}

/// Print the store content without resolving or alerting
async fn dump_store(cli: &Cli) -> RrwatchExitCode {
    let lines = match dump_lines(&cli.store).await {
        Ok(lines) => lines,
        Err(e) => return report_error(&e),
    };

    info!(
        "Dumping store {}: {} record(s)",
        cli.store.display(),
        lines.len()
    );
    for line in &lines {
        println!("{}", line);
    }

    RrwatchExitCode::Clean
}

/// Run one monitoring cycle
async fn monitor(cli: &Cli) -> RrwatchExitCode {
    let config = match cli.monitor_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("Usage error: {:#}", e);
            eprintln!("{:#}", e);
            return RrwatchExitCode::Usage;
        }
    };

    let resolver = match DigResolver::new(&cli.resolver_config()) {
        Ok(resolver) => resolver,
        Err(e) => return report_error(&e),
    };
    let notifier = match SmtpNotifier::new(&cli.smtp_config()) {
        Ok(notifier) => notifier,
        Err(e) => return report_error(&e),
    };

    let store = match FileHistoryStore::load(&config.store_path).await {
        Ok(store) => store,
        Err(e) => return report_error(&e),
    };

    info!("Monitoring {} (store: {})", config.record, config.store_path.display());

    let detector = match ChangeDetector::new(
        Box::new(resolver),
        Box::new(notifier),
        Box::new(store),
        config,
    ) {
        Ok(detector) => detector,
        Err(e) => return report_error(&e),
    };

    match detector.run_cycle().await {
        Ok(outcome) => {
            match &outcome {
                CycleOutcome::ChangedNotifyFailed { reason, .. } => {
                    eprintln!("Record changed but the alert could not be sent: {}", reason);
                }
                CycleOutcome::ResolutionUnavailable { reason } => {
                    eprintln!("Record could not be resolved, cycle skipped: {}", reason);
                }
                _ => {}
            }
            info!("Cycle finished: {}", outcome.label());
            RrwatchExitCode::from(&outcome)
        }
        Err(e) => report_error(&e),
    }
}

/// Log and print an abort, returning its exit code
fn report_error(err: &Error) -> RrwatchExitCode {
    error!("{}", err);
    eprintln!("{}", err);
    RrwatchExitCode::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rrwatch_core::Fingerprint;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["rrwatch", "-r", "example.com", "-e", "ops@example.com"])
            .unwrap();
        assert_eq!(cli.qtype, "TXT");
        assert_eq!(cli.store, PathBuf::from("/tmp/dns_rr_store"));
        assert_eq!(cli.mailhost, "mail");
        assert_eq!(cli.mail_port, 25);
        assert!(!cli.dump_store);

        let config = cli.monitor_config().unwrap();
        assert_eq!(config.record.store_key(), "example.com/TXT");
        assert_eq!(config.alert.to, "ops@example.com");
    }

    #[test]
    fn test_missing_rr_is_usage_error() {
        let cli = Cli::try_parse_from(["rrwatch", "-e", "ops@example.com"]).unwrap();
        let err = cli.monitor_config().unwrap_err();
        assert!(err.to_string().contains("Please provide an RR"));
    }

    #[test]
    fn test_missing_email_is_usage_error() {
        let cli = Cli::try_parse_from(["rrwatch", "-r", "example.com"]).unwrap();
        assert!(cli.monitor_config().is_err());
    }

    #[test]
    fn test_invalid_record_is_usage_error() {
        let cli = Cli::try_parse_from([
            "rrwatch",
            "-r",
            "bad name",
            "-e",
            "ops@example.com",
        ])
        .unwrap();
        assert!(cli.monitor_config().is_err());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::try_parse_from(["rrwatch", "--log-level", "DEBUG"]).unwrap();
        assert_eq!(cli.level().unwrap(), Level::DEBUG);

        let cli = Cli::try_parse_from(["rrwatch", "--log-level", "chatty"]).unwrap();
        assert!(cli.level().is_err());
    }

    #[test]
    fn test_outcome_exit_codes_are_distinct() {
        let fp = Fingerprint::compute("x");
        let codes = [
            RrwatchExitCode::from(&CycleOutcome::Unchanged {
                fingerprint: fp.clone(),
            }),
            RrwatchExitCode::from(&CycleOutcome::BaselineRecorded {
                fingerprint: fp.clone(),
            }),
            RrwatchExitCode::from(&CycleOutcome::ChangedNotified {
                previous: fp.clone(),
                current: fp.clone(),
            }),
            RrwatchExitCode::from(&CycleOutcome::ChangedNotifyFailed {
                previous: fp.clone(),
                current: fp,
                reason: String::new(),
            }),
            RrwatchExitCode::from(&CycleOutcome::ResolutionUnavailable {
                reason: String::new(),
            }),
            RrwatchExitCode::from(&Error::store_corrupt("x")),
            RrwatchExitCode::from(&Error::store_write("x")),
            RrwatchExitCode::Usage,
        ];

        let mut values: Vec<u8> = codes.iter().map(|c| *c as u8).collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), codes.len());
        assert_eq!(RrwatchExitCode::from(&Error::store_unavailable("x")), RrwatchExitCode::StoreError);
    }

    fn dump_cli(path: &Path) -> Cli {
        use std::ffi::OsStr;

        Cli::try_parse_from([
            OsStr::new("rrwatch"),
            OsStr::new("-D"),
            OsStr::new("-s"),
            path.as_os_str(),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_dump_missing_store_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");

        assert!(dump_lines(&path).await.unwrap().is_empty());
        assert_eq!(dump_store(&dump_cli(&path)).await, RrwatchExitCode::Clean);
    }

    #[tokio::test]
    async fn test_dump_prints_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns_rr_store");

        let store = FileHistoryStore::load(&path).await.unwrap();
        for key in ["c.example.com/MX", "a.example.com/TXT", "b.example.com/A"] {
            store.update(key, Fingerprint::compute(key)).await.unwrap();
        }
        store.flush().await.unwrap();

        let lines = dump_lines(&path).await.unwrap();
        assert_eq!(
            lines,
            vec![
                format!("a.example.com/TXT {}", Fingerprint::compute("a.example.com/TXT")),
                format!("b.example.com/A {}", Fingerprint::compute("b.example.com/A")),
                format!("c.example.com/MX {}", Fingerprint::compute("c.example.com/MX")),
            ]
        );
        assert_eq!(dump_store(&dump_cli(&path)).await, RrwatchExitCode::Clean);
    }

    #[tokio::test]
    async fn test_dump_corrupt_store_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dns_rr_store");
        std::fs::write(&path, "{ not json").unwrap();

        let err = dump_lines(&path).await.unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt(_)), "got {:?}", err);
        assert_eq!(dump_store(&dump_cli(&path)).await, RrwatchExitCode::StoreError);
        assert_eq!(RrwatchExitCode::StoreError as u8, 7);
    }
}
