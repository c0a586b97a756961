//! Logging configuration for notion2sql
//!
//! Sets up a `tracing` subscriber writing to stdout, a daily rolling file,
//! or both. The level honours `RUST_LOG` when it is set.

use std::path::{Path, PathBuf};

use notion2sql_core::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default file name for file output
pub const DEFAULT_LOG_FILE: &str = "notion2sql.log";

/// Log output destination
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a daily rolling file
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable format (default)
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level, or any `EnvFilter` directive such as `notion2sql=debug`
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Info level to stdout
    pub fn info() -> Self {
        Self::default()
    }

    /// Debug level, which includes every Notion request
    pub fn debug() -> Self {
        Self {
            level: "debug".to_string(),
            ..Default::default()
        }
    }

    pub fn warn() -> Self {
        Self {
            level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Write to a daily rolling file instead of stdout
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Write to both stdout and a daily rolling file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::Config(format!("invalid log level '{}': {e}", self.level)))
    }

    /// Install this configuration as the global subscriber.
    ///
    /// Returns the file writer's guard when logging to a file; keep it alive
    /// for as long as logs should be flushed.
    ///
    /// # Errors
    ///
    /// Fails on an invalid level directive or when a global subscriber is
    /// already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use notion2sql::logging::LogConfig;
    ///
    /// let _guard = LogConfig::debug().with_file("logs/notion2sql.log").init()?;
    /// # Ok::<(), notion2sql::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let filter = self.filter()?;
        let compact = self.format == LogFormat::Compact;

        let (to_stdout, file) = match self.output {
            LogOutput::Stdout => (true, None),
            LogOutput::File(path) => (false, Some(path)),
            LogOutput::Both(path) => (true, Some(path)),
        };

        let (writer, guard) = match file {
            Some(path) => {
                let (writer, guard) = tracing_appender::non_blocking(rolling_file(&path));
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let stdout_pretty = (to_stdout && !compact).then(|| fmt::layer().pretty());
        let stdout_compact = (to_stdout && compact).then(|| fmt::layer().compact());
        let file_pretty = writer
            .clone()
            .filter(|_| !compact)
            .map(|w| fmt::layer().with_writer(w).with_ansi(false).pretty());
        let file_compact = writer
            .filter(|_| compact)
            .map(|w| fmt::layer().with_writer(w).with_ansi(false).compact());

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_pretty)
            .with(stdout_compact)
            .with(file_pretty)
            .with(file_compact)
            .try_init()
            .map_err(|e| Error::Config(format!("logging already initialised: {e}")))?;

        Ok(guard)
    }
}

fn rolling_file(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    tracing_appender::rolling::daily(dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.output, LogOutput::Stdout);
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_config_builders() {
        let config = LogConfig::debug()
            .with_file("/tmp/notion2sql-test.log")
            .with_format(LogFormat::Compact);
        assert_eq!(config.level, "debug");
        assert!(matches!(config.output, LogOutput::File(_)));
        assert_eq!(config.format, LogFormat::Compact);

        let both = LogConfig::warn().with_both("sync.log").with_level("notion2sql=trace");
        assert_eq!(both.level, "notion2sql=trace");
        assert_eq!(both.output, LogOutput::Both(PathBuf::from("sync.log")));
    }

    #[test]
    fn test_invalid_level_is_config_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LogConfig::default().with_level("notion2sql=verbose");
        assert!(matches!(config.filter(), Err(Error::Config(_))));
    }
}
