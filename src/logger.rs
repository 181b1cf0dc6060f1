//! log4rs bootstrap. The crate itself only uses the `log` facade; these
//! helpers are for binaries and tests that want the output on disk.

use crate::errors::{DbError, Result};
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Fails when the file is missing or invalid, or a logger is already set.
pub fn init() -> Result<()> {
    init_path(Path::new("log4rs.yaml"))
}

/// # Errors
/// As [`init`], for an explicit config file.
pub fn init_path(path: &Path) -> Result<()> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Configuration(format!("log4rs: {e}")))
}

/// Parses `error|warn|info|debug|trace`; anything else means `info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| DbError::Configuration(format!("log roller: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the rolling-file configuration: `docquery.log` for everything and
/// `exec.log` for the dispatch trace (`docquery::exec`, `docquery::stream`).
///
/// # Errors
/// Fails when the directory or the appenders cannot be created.
pub fn build_config(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> Result<Config> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);

    Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "docquery", keep)?)))
        .appender(Appender::builder().build("exec", Box::new(rolling(&base, "exec", keep)?)))
        .logger(Logger::builder().appender("exec").build("docquery::exec", lvl))
        .logger(Logger::builder().appender("exec").build("docquery::stream", lvl))
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| DbError::Configuration(format!("log config: {e}")))
}

/// Configures logging for the process. Does nothing further if a logger is
/// already installed.
///
/// # Errors
/// As [`build_config`].
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> Result<()> {
    let config = build_config(dir, level, retention)?;
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already initialized; keeping existing configuration");
    }
    Ok(())
}

/// Configures logging from `DOCQUERY_LOG_DIR`, `DOCQUERY_LOG_LEVEL` and
/// `DOCQUERY_LOG_RETENTION`.
///
/// # Errors
/// As [`configure_logging`].
pub fn configure_from_env() -> Result<()> {
    let dir = std::env::var("DOCQUERY_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("DOCQUERY_LOG_LEVEL").ok();
    let retention = std::env::var("DOCQUERY_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}
