//! Logging utilities and configuration for the profiler.
//!
//! Profiling runs emit structured `tracing` events. [`LogConfig`] controls
//! how chatty a run is; [`setup`] installs a `tracing-subscriber` for
//! applications that do not bring their own.

use tracing::Level;

/// Per-run logging configuration.
///
/// The expand and aggregate stages handle every document and observation,
/// so anything logged per item is gated behind these flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Base log level for profiler components
    pub base_level: Level,
    /// Whether to log stage transitions (collect, reduce, derive, merge)
    pub log_stage_details: bool,
    /// Whether to log the summary of a finished run
    pub log_run_summary: bool,
    /// Whether to log each emitted field result
    pub log_field_results: bool,
    /// Maximum length for logged field names and values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_stage_details: false,
            log_run_summary: true,
            log_field_results: false,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything on; for debugging a single run.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_stage_details: true,
            log_run_summary: true,
            log_field_results: true,
            max_field_length: 1024,
        }
    }

    /// Warnings and errors only.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_stage_details: false,
            log_run_summary: false,
            log_field_results: false,
            max_field_length: 128,
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Debug logging that skips argument formatting unless the configured level allows it.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a stage transition if enabled.
#[macro_export]
macro_rules! log_stage {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_stage_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a run summary if enabled.
#[macro_export]
macro_rules! log_summary {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_run_summary {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes, on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for binaries and tests.
pub mod setup {
    use tracing::Level;

    /// Configuration of the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for `term_schema` specifically
        pub profiler_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                profiler_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                profiler_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                profiler_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_profiler_level(mut self, level: Level) -> Self {
            self.profiler_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},term_schema={}",
                    self.level.as_str().to_lowercase(),
                    self.profiler_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global `fmt` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter.
    ///
    /// ```rust,no_run
    /// use term_schema::logging::setup::{LoggingConfig, init_logging};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
