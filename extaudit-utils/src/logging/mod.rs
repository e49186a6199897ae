//! Logging bootstrap and named loggers
//!
//! Everything logs through `tracing`. [`init_logging`] installs a
//! `tracing-subscriber` registry once per process and records the configured
//! level as the default for every [`Logger`] handed out afterwards by
//! [`get_logger`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log levels, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
}

impl LogLevel {
    const fn from_u8(value: u8) -> Self {
        match value {
            10 => Self::Debug,
            30 => Self::Warning,
            40 => Self::Error,
            _ => Self::Info,
        }
    }

    const fn as_tracing(self) -> Level {
        match self {
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::UtilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" | "critical" => Ok(Self::Error),
            other => Err(crate::UtilError::Config(format!("Unknown log level: '{other}'"))),
        }
    }
}

/// Level new loggers start at; updated by [`init_logging`]
static DEFAULT_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Subscriber settings, usually embedded in a larger config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: LogLevel,
    /// Extra `EnvFilter` directives, e.g. `extaudit=debug,reqwest=warn`
    pub directives: Option<String>,
    pub include_location: bool,
    pub include_thread_id: bool,
    pub colored_output: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            directives: None,
            include_location: false,
            include_thread_id: false,
            colored_output: true,
        }
    }
}

impl LoggerConfig {
    fn filter(&self) -> crate::Result<EnvFilter> {
        let builder = EnvFilter::builder().with_default_directive(self.level.as_tracing().into());
        match self.directives.as_deref() {
            Some(directives) => builder
                .parse(directives)
                .map_err(|e| crate::UtilError::Config(format!("Invalid log directives '{directives}': {e}"))),
            None => Ok(builder.from_env_lossy()),
        }
    }
}

/// Install the global subscriber. Without explicit directives `RUST_LOG`
/// overrides `config.level`.
///
/// The default logger level is updated even when a subscriber is already
/// installed; that case is reported as [`crate::UtilError::Config`].
pub fn init_logging(config: &LoggerConfig) -> crate::Result<()> {
    let filter = config.filter()?;
    DEFAULT_LEVEL.store(config.level as u8, Ordering::Relaxed);

    let layer = fmt::layer()
        .with_target(false)
        .with_ansi(config.colored_output)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| crate::UtilError::Config(format!("Logging already initialised: {e}")))
}

/// Component logger. Each record is prefixed with the component name.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    level: LogLevel,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    fn emit(&self, level: LogLevel, message: &str) {
        if !self.is_enabled(level) {
            return;
        }
        let name = self.name.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(component = name, "[{name}] {message}"),
            LogLevel::Info => tracing::info!(component = name, "[{name}] {message}"),
            LogLevel::Warning => tracing::warn!(component = name, "[{name}] {message}"),
            LogLevel::Error => tracing::error!(component = name, "[{name}] {message}"),
        }
    }

    pub fn debug(&self, message: &str) {
        self.emit(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.emit(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(LogLevel::Error, message);
    }

    /// Error record with the error's full source chain appended
    pub fn exception(&self, message: &str, error: &dyn std::error::Error) {
        let mut chain = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        self.emit(LogLevel::Error, &format!("{message}: {chain}"));
    }
}

/// Logger for a dotted component name such as `extaudit.pipeline`, at the
/// level last passed to [`init_logging`]
pub fn get_logger(name: &str) -> Logger {
    Logger {
        name: name.to_string(),
        level: LogLevel::from_u8(DEFAULT_LEVEL.load(Ordering::Relaxed)),
    }
}
