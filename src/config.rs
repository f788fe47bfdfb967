//! Configuration management for the Schulte mining client
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON) with proper validation and defaults.
//! Options given on the command line or through the environment win over the
//! file; everything else is taken from the file when it sets it.

use crate::app::AppSettings;
use crate::client::BackoffConfig;
use crate::runtime::Intervals;
use crate::{Error, Result};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Plain,
    /// One JSON object per line
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => write!(f, "plain"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Complete configuration for the mining client
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "schulte-mining-client",
    version = env!("CARGO_PKG_VERSION"),
    about = "Schulte pool classroom mining client",
    long_about = "Terminal client for the Schulte pool: solve the open block's puzzle, submit it, and follow the chain and leaderboard"
)]
pub struct Config {
    /// Print program info and exit
    #[arg(long)]
    #[serde(skip)]
    pub info: bool,

    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Pool authority base URL
    #[arg(short = 's', long, env = "SCHULTE_SERVER", default_value = "http://localhost:5000")]
    #[serde(default = "default_server")]
    pub server: String,

    /// Cookie header carrying the participant session
    #[arg(long, env = "SCHULTE_SESSION_COOKIE", value_name = "COOKIE")]
    #[serde(default, skip_serializing)]
    pub session_cookie: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(short = 'x', long)]
    #[serde(default)]
    pub insecure: bool,

    /// HTTP timeout in milliseconds
    #[arg(long, default_value = "10000")]
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    /// Participant list refresh interval in milliseconds
    #[arg(long, default_value = "5000")]
    #[serde(default = "default_list_interval")]
    pub participants_interval: u64,

    /// Leaderboard refresh interval in milliseconds
    #[arg(long, default_value = "5000")]
    #[serde(default = "default_list_interval")]
    pub leaderboard_interval: u64,

    /// Chain refresh interval in milliseconds
    #[arg(long, default_value = "5000")]
    #[serde(default = "default_list_interval")]
    pub chain_interval: u64,

    /// Open block poll interval in milliseconds
    #[arg(long, default_value = "4000")]
    #[serde(default = "default_current_block_interval")]
    pub current_block_interval: u64,

    /// Blocks fetched per chain refresh
    #[arg(long, default_value = "40")]
    #[serde(default = "default_chain_fetch_limit")]
    pub chain_fetch_limit: usize,

    /// Blocks listed before the chain collapses to its tail
    #[arg(long, default_value = "6")]
    #[serde(default = "default_chain_display_threshold")]
    pub chain_display_threshold: usize,

    /// Participants fetched per refresh
    #[arg(long, default_value = "500")]
    #[serde(default = "default_participants_limit")]
    pub participants_limit: usize,

    /// How long a wrong cell stays flagged, in milliseconds
    #[arg(long, default_value = "500")]
    #[serde(default = "default_wrong_flag_ms")]
    pub wrong_flag_ms: u64,

    /// Maximum retry attempts for reads
    #[arg(long, default_value = "2")]
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base retry delay in milliseconds
    #[arg(long, default_value = "100")]
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Maximum retry delay in milliseconds
    #[arg(long, default_value = "2000")]
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay: u64,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, default_value = "plain")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process arguments and the config file
    pub async fn load() -> Result<Self> {
        let matches = Self::command().get_matches();
        Self::load_from_matches(&matches).await
    }

    /// Load configuration from explicit arguments
    pub async fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command()
            .try_get_matches_from(args)
            .map_err(|e| Error::config(e.to_string()))?;
        Self::load_from_matches(&matches).await
    }

    async fn load_from_matches(matches: &ArgMatches) -> Result<Self> {
        let mut config =
            Self::from_arg_matches(matches).map_err(|e| Error::config(e.to_string()))?;

        if let Some(config_file) = config.config_file.clone() {
            let file_config = Self::load_from_file(&config_file).await?;
            config = config.merge_with_file(file_config, matches);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Take every option the user did not set explicitly from the file
    fn merge_with_file(self, file: Self, matches: &ArgMatches) -> Self {
        let mut merged = self;
        let explicit = |id: &str| {
            matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
            )
        };

        macro_rules! from_file {
            ($($field:ident),* $(,)?) => {
                $(
                    if !explicit(stringify!($field)) {
                        merged.$field = file.$field;
                    }
                )*
            };
        }

        from_file!(
            server,
            session_cookie,
            insecure,
            http_timeout,
            participants_interval,
            leaderboard_interval,
            chain_interval,
            current_block_interval,
            chain_fetch_limit,
            chain_display_threshold,
            participants_limit,
            wrong_flag_ms,
            max_retries,
            retry_delay,
            max_retry_delay,
            log_level,
            log_format,
            log_file,
        );
        merged
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = self.server_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Server URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        for (name, value) in [
            ("http_timeout", self.http_timeout),
            ("participants_interval", self.participants_interval),
            ("leaderboard_interval", self.leaderboard_interval),
            ("chain_interval", self.chain_interval),
            ("current_block_interval", self.current_block_interval),
            ("wrong_flag_ms", self.wrong_flag_ms),
        ] {
            if value == 0 {
                return Err(Error::config(format!("{} must be greater than 0", name)));
            }
        }

        if self.chain_display_threshold == 0 {
            return Err(Error::config("Chain display threshold must be at least 1"));
        }
        if self.chain_fetch_limit < self.chain_display_threshold {
            return Err(Error::config(format!(
                "Chain fetch limit ({}) must not be below the display threshold ({})",
                self.chain_fetch_limit, self.chain_display_threshold
            )));
        }
        if self.participants_limit == 0 {
            return Err(Error::config("Participants limit must be at least 1"));
        }
        if self.retry_delay > self.max_retry_delay {
            return Err(Error::config("Retry delay must not exceed the maximum retry delay"));
        }

        Ok(())
    }

    /// Get the authority base URL, with a trailing slash so endpoints join
    /// under any path prefix
    pub fn server_url(&self) -> Result<Url> {
        let mut raw = self.server.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| Error::config(format!("Invalid server URL: {}", e)))
    }

    /// Get HTTP timeout duration
    pub fn http_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.http_timeout)
    }

    /// Get polling intervals
    pub fn intervals(&self) -> Intervals {
        Intervals {
            participants: Duration::from_millis(self.participants_interval),
            leaderboard: Duration::from_millis(self.leaderboard_interval),
            chain: Duration::from_millis(self.chain_interval),
            current_block: Duration::from_millis(self.current_block_interval),
        }
    }

    /// Get state machine settings
    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            chain_fetch_limit: self.chain_fetch_limit,
            chain_display_threshold: self.chain_display_threshold,
            participants_limit: self.participants_limit,
            wrong_flag: Duration::from_millis(self.wrong_flag_ms),
        }
    }

    /// Get read backoff configuration
    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(self.retry_delay),
            max_delay: Duration::from_millis(self.max_retry_delay),
            max_retries: self.max_retries,
            ..BackoffConfig::default()
        }
    }

    /// One-line description of the polling setup for the startup log
    pub fn polling_summary(&self) -> String {
        let intervals = self.intervals();
        format!(
            "participants every {}, leaderboard every {}, chain every {}, open block every {}",
            humantime::format_duration(intervals.participants),
            humantime::format_duration(intervals.leaderboard),
            humantime::format_duration(intervals.chain),
            humantime::format_duration(intervals.current_block),
        )
    }
}

// Default value functions for serde
fn default_server() -> String { "http://localhost:5000".to_string() }
fn default_http_timeout() -> u64 { 10000 }
fn default_list_interval() -> u64 { 5000 }
fn default_current_block_interval() -> u64 { 4000 }
fn default_chain_fetch_limit() -> usize { 40 }
fn default_chain_display_threshold() -> usize { 6 }
fn default_participants_limit() -> usize { 500 }
fn default_wrong_flag_ms() -> u64 { 500 }
fn default_max_retries() -> usize { 2 }
fn default_retry_delay() -> u64 { 100 }
fn default_max_retry_delay() -> u64 { 2000 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Plain }
