//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! The runtime only emits `tracing` events; hosts that want them on stderr
//! call [`init_logging`] once at startup.
//!
//! # Log Levels
//!
//! - `error`: network and persistence failures
//! - `warn`: recovered parse/data errors, stability advisories, dropped emissions
//! - `debug`: boot, resolution and dispatch flow
//!
//! The `ATOMIC_UI_LOG` environment variable overrides the configured level
//! using `EnvFilter` directive syntax.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Environment variable read by [`init_logging`].
pub const LOG_ENV_VAR: &str = "ATOMIC_UI_LOG";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, fields after the message.
    #[default]
    Full,
    /// Multi-line, with fields and source location on their own lines.
    Pretty,
    /// One line per event, span context folded in.
    Compact,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub with_timestamps: bool,
    pub with_target: bool,
    pub with_ansi: bool,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            with_timestamps: false,
            with_target: false,
            with_ansi: true,
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// 0 → info, 1 → debug, 2+ → trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    #[must_use]
    pub fn with_target(mut self, enable: bool) -> Self {
        self.with_target = enable;
        self
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), TryInitError> {
    init_logging_with_writer(config, std::io::stderr)
}

/// Install the global subscriber with a custom writer.
pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W) -> Result<(), TryInitError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(fmt_layer(config, writer))
        .try_init()
}

fn fmt_layer<S, W>(config: &LogConfig, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer::<S>()
        .with_writer(writer)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target);

    match (config.format, config.with_timestamps) {
        (LogFormat::Full, true) => layer.boxed(),
        (LogFormat::Full, false) => layer.without_time().boxed(),
        (LogFormat::Pretty, true) => layer.pretty().boxed(),
        (LogFormat::Pretty, false) => layer.pretty().without_time().boxed(),
        (LogFormat::Compact, true) => layer.compact().boxed(),
        (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Our crate at `level`, everything else at warn.
fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("warn,atomic_ui={level}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(format: LogFormat) -> String {
        let capture = Capture::default();
        let sink = capture.clone();
        let config = LogConfig::default().with_ansi(false).with_format(format);
        let subscriber =
            tracing_subscriber::registry().with(fmt_layer(&config, move || sink.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(component = "form", "booted");
        });
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(7).level, Level::TRACE);
    }

    #[test]
    fn builder() {
        let config = LogConfig::default()
            .with_level(Level::WARN)
            .with_format(LogFormat::Compact)
            .with_ansi(false)
            .with_target(true)
            .with_timestamps(true);
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.with_ansi);
        assert!(config.with_target);
        assert!(config.with_timestamps);
    }

    #[test]
    fn formats_shape_the_output() {
        let full = render(LogFormat::Full);
        assert!(full.contains("booted"), "{full}");
        assert_eq!(full.lines().count(), 1, "{full}");

        let compact = render(LogFormat::Compact);
        assert!(compact.contains("booted"), "{compact}");
        assert_eq!(compact.lines().count(), 1, "{compact}");

        let pretty = render(LogFormat::Pretty);
        assert!(pretty.contains("booted"), "{pretty}");
        assert!(pretty.lines().count() > 1, "{pretty}");
    }

    #[test]
    fn directives_scope_our_crate() {
        assert_eq!(default_directives(Level::DEBUG), "warn,atomic_ui=debug");
    }

    #[test]
    fn second_init_is_an_error() {
        let config = LogConfig::default().with_ansi(false);
        // The first call may lose to another test; the second never wins.
        let _ = init_logging_with_writer(&config, std::io::sink);
        assert!(init_logging_with_writer(&config, std::io::sink).is_err());
    }
}
