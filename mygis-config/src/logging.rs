//! Process-wide logging setup.
//!
//! [`init`] installs a `tracing` subscriber once: an [`EnvFilter`] at the
//! resolved level, a stderr layer in plain or JSON format and, when a log
//! file is configured, a second layer appending the same events to it.
//! Later calls return the context created by the first one.

use crate::config::Config;
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Level used when nothing (or nothing recognisable) is configured.
pub const DEFAULT_LEVEL: &str = "info";

const LEVEL_ENV: &str = "MYGIS_LOG_LEVEL";
const FORMAT_ENV: &str = "MYGIS_LOG_FORMAT";
const FILE_ENV: &str = "MYGIS_LOG_FILE";

static CONTEXT: OnceLock<LogContext> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output format of log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?} (expected plain or json)")),
        }
    }
}

/// Logging options given explicitly (command-line flags).
#[derive(Debug, Clone, Default)]
pub struct LogOverrides {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
    pub file: Option<PathBuf>,
}

/// Resolved logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// A `tracing` level name (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            format: LogFormat::Plain,
            file: None,
        }
    }
}

impl LogSettings {
    /// Resolves settings with precedence flag > config (`log_level`,
    /// `log_format`, `log_file`) > `MYGIS_LOG_*` variables > defaults.
    pub fn resolve(overrides: &LogOverrides, config: &Config) -> Self {
        Self::resolve_with_env(overrides, config, |name| std::env::var(name).ok())
    }

    /// Like [`resolve`](Self::resolve) with an explicit environment lookup.
    pub fn resolve_with_env(
        overrides: &LogOverrides,
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let level = overrides
            .level
            .clone()
            .or_else(|| config.get_str("log_level"))
            .or_else(|| env(LEVEL_ENV))
            .map(|raw| normalize_level(&raw).unwrap_or(DEFAULT_LEVEL).to_string())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

        let format = overrides
            .format
            .or_else(|| {
                config
                    .get_str("log_format")
                    .or_else(|| env(FORMAT_ENV))
                    .map(|f| f.parse::<LogFormat>().unwrap_or_default())
            })
            .unwrap_or_default();

        let file = overrides
            .file
            .clone()
            .or_else(|| config.get_str("log_file").map(PathBuf::from))
            .or_else(|| env(FILE_ENV).map(PathBuf::from))
            .filter(|p| !p.as_os_str().is_empty());

        Self { level, format, file }
    }
}

/// Maps level names (including `warning`/`critical`) and numeric levels
/// (10 debug, 20 info, 30 warning, 40+ error) to `tracing` level names.
pub fn normalize_level(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_lowercase();
    if let Ok(n) = lowered.parse::<i64>() {
        return Some(match n {
            i64::MIN..=5 => "trace",
            6..=10 => "debug",
            11..=20 => "info",
            21..=30 => "warn",
            _ => "error",
        });
    }
    match lowered.as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" | "fatal" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}

/// What [`init`] set up.
#[derive(Debug)]
pub struct LogContext {
    pub settings: LogSettings,
    /// False when another global subscriber was already installed.
    pub installed: bool,
}

impl LogContext {
    /// True when debug events are enabled.
    pub fn verbose(&self) -> bool {
        matches!(self.settings.level.as_str(), "debug" | "trace")
    }
}

/// Installs the global subscriber on first call; later calls ignore
/// `settings` and return the existing context.
pub fn init(settings: LogSettings) -> &'static LogContext {
    CONTEXT.get_or_init(|| install(settings))
}

/// The context created by [`init`], if it ran.
pub fn current() -> Option<&'static LogContext> {
    CONTEXT.get()
}

fn install(settings: LogSettings) -> LogContext {
    let filter =
        EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let mut layers: Vec<BoxedLayer> = vec![stream_layer(settings.format)];
    let mut file_error = None;
    if let Some(path) = &settings.file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => layers.push(file_layer(settings.format, file)),
            Err(e) => file_error = Some(e.to_string()),
        }
    }

    let installed = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .is_ok();

    if let (Some(path), Some(error)) = (&settings.file, file_error) {
        warn!(
            path = %path.display(),
            error = %error,
            "Could not open log file; logging to stderr only"
        );
    }
    if installed {
        info!(level = %settings.level, format = ?settings.format, "Logging initialized");
    }

    LogContext { settings, installed }
}

fn stream_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, file: File) -> BoxedLayer {
    let writer = Mutex::new(file);
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Plain => fmt::layer().with_ansi(false).with_writer(writer).boxed(),
    }
}
