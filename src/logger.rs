use crate::config::LoggingConfig;
use crate::errors::BenchError;
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

/// Target for per-step timing lines; routed to `metrics.log` only.
pub const METRICS_TARGET: &str = "docbench::metrics";

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, BenchError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| BenchError::Logging(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(|e| BenchError::Logging(e.to_string()))
}

/// Build the log4rs config: `app.log` for everything, `metrics.log` for [`METRICS_TARGET`].
///
/// # Errors
/// Returns an error if the log directory cannot be created or an appender fails to open.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<Config, BenchError> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level.unwrap_or("info"));

    let app = rolling(&base, "app", keep)?;
    let metrics = rolling(&base, "metrics", keep)?;
    Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("metrics", Box::new(metrics)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| BenchError::Logging(e.to_string()))
}

/// Configure logging globally for the process. A second call is ignored by log4rs.
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), BenchError> {
    let config = build_config(dir, level, retention)?;
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already initialized; keeping existing config");
    }
    Ok(())
}

/// Resolved logging settings: `DOCBENCH_LOG_*` values from `var` over `fallback`.
fn resolve_settings(
    fallback: &LoggingConfig,
    var: impl Fn(&str) -> Option<String>,
) -> (Option<PathBuf>, String, usize) {
    let dir = var("DOCBENCH_LOG_DIR").map(PathBuf::from).or_else(|| fallback.dir.clone());
    let level = var("DOCBENCH_LOG_LEVEL").unwrap_or_else(|| fallback.level.clone());
    let retention = var("DOCBENCH_LOG_RETENTION")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(fallback.retention);
    (dir, level, retention)
}

/// Configure logging from environment variables if present, falling back to
/// the `[logging]` section for anything unset:
/// - DOCBENCH_LOG_DIR
/// - DOCBENCH_LOG_LEVEL
/// - DOCBENCH_LOG_RETENTION
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_from_env(fallback: &LoggingConfig) -> Result<(), BenchError> {
    let (dir, level, retention) = resolve_settings(fallback, |k| std::env::var(k).ok());
    configure_logging(dir.as_deref(), Some(level.as_str()), Some(retention))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_parse() {
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("trace"), LevelFilter::Trace);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");
        build_config(Some(&logs), Some("debug"), Some(3)).unwrap();
        assert!(logs.is_dir());
    }

    #[test]
    fn env_settings_win_over_logging_section() {
        let file = LoggingConfig { dir: Some(PathBuf::from("from-file")), level: "warn".into(), retention: 3 };
        let (dir, level, retention) = resolve_settings(&file, |k| match k {
            "DOCBENCH_LOG_LEVEL" => Some("debug".to_string()),
            "DOCBENCH_LOG_RETENTION" => Some("12".to_string()),
            _ => None,
        });
        assert_eq!(dir, Some(PathBuf::from("from-file")));
        assert_eq!(level, "debug");
        assert_eq!(retention, 12);
    }

    #[test]
    fn unparsable_retention_keeps_file_value() {
        let file = LoggingConfig::default();
        let (dir, level, retention) = resolve_settings(&file, |k| match k {
            "DOCBENCH_LOG_DIR" => Some("env-logs".to_string()),
            "DOCBENCH_LOG_RETENTION" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(dir, Some(PathBuf::from("env-logs")));
        assert_eq!(level, "info");
        assert_eq!(retention, 7);
    }
}
