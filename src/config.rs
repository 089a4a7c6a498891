//! Configuration types for parsr-batch

use crate::error::{Error, Result};
use crate::types::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a batch run
///
/// Fields are organized into logical sub-configs:
/// - [`batch`](BatchConfig) — input/output directories, extension allow-list, skip policy
/// - [`service`](ServiceConfig) — container image, ports, service URL
/// - [`processing`](ProcessingConfig) — attempt limit, poll deadline and interval
/// - [`artifacts`](ArtifactConfig) — which output formats to download
///
/// The batch settings are flattened so they sit at the top level of the TOML file;
/// the other sub-configs are `[service]`, `[processing]` and `[artifacts]` tables.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory layout and file selection
    #[serde(flatten)]
    pub batch: BatchConfig,

    /// Backing parsing service and its container
    #[serde(default)]
    pub service: ServiceConfig,

    /// Per-file submission/poll policy
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Output formats to download
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to their defaults; the result is validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the batch cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.processing.attempt_limit == 0 {
            return Err(Error::config("attempt_limit", "attempt_limit must be at least 1"));
        }
        if self.processing.poll_interval.is_zero() {
            return Err(Error::config(
                "poll_interval",
                "poll_interval must be greater than zero",
            ));
        }
        if self.batch.allowed_extensions.is_empty() {
            return Err(Error::config(
                "allowed_extensions",
                "at least one input extension must be allowed",
            ));
        }
        if self.artifacts.enabled().is_empty() {
            return Err(Error::config(
                "artifacts",
                "at least one artifact format must be enabled",
            ));
        }
        if self.service.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout",
                "request_timeout must be greater than zero",
            ));
        }
        url::Url::parse(&self.service.base_url).map_err(|e| {
            Error::config("base_url", format!("invalid base_url {}: {}", self.service.base_url, e))
        })?;
        Ok(())
    }
}

/// How the "already processed" check compares a file stem with output names
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipMatch {
    /// Skip only when an output entry is named exactly like the stem
    #[default]
    Exact,
    /// Skip when the stem occurs anywhere inside an output entry name (legacy)
    Substring,
}

/// Directory layout and file selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory tree containing the documents to parse (default: "./input")
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving one `<stem>/` folder per parsed document (default: "./output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Parser configuration file sent verbatim with every submission (default: "./config.json")
    #[serde(default = "default_parser_config")]
    pub parser_config: PathBuf,

    /// Accepted input extensions, compared case-insensitively (default: ["pdf"])
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Already-processed detection mode (default: exact)
    #[serde(default)]
    pub skip_match: SkipMatch,

    /// Leave an empty `<stem>/` folder behind when a file fails for good,
    /// so the next run skips it (default: false, failed files are retried next run)
    #[serde(default)]
    pub mark_failed: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            parser_config: default_parser_config(),
            allowed_extensions: default_allowed_extensions(),
            skip_match: SkipMatch::default(),
            mark_failed: false,
        }
    }
}

/// Backing parsing service and the container hosting it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Container image reference (default: "axarev/parsr")
    #[serde(default = "default_image")]
    pub image: String,

    /// Base URL of the service API (default: "http://localhost:3001/api/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Host port published for the service (default: 3001)
    #[serde(default = "default_service_port")]
    pub host_port: u16,

    /// Port the service listens on inside the container (default: 3001)
    #[serde(default = "default_service_port")]
    pub container_port: u16,

    /// Pause after start/restart so the service can come up (default: 5 seconds)
    #[serde(default = "default_settle_interval", with = "duration_serde")]
    pub settle_interval: Duration,

    /// Upper bound for a single HTTP request to the service (default: 300 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Path to the docker executable (auto-detected if None)
    #[serde(default)]
    pub docker_path: Option<PathBuf>,

    /// Whether to search PATH for docker if `docker_path` is not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Launch the container with `--rm` so stopping it also removes it (default: true)
    #[serde(default = "default_true")]
    pub auto_remove: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            base_url: default_base_url(),
            host_port: default_service_port(),
            container_port: default_service_port(),
            settle_interval: default_settle_interval(),
            request_timeout: default_request_timeout(),
            docker_path: None,
            search_path: true,
            auto_remove: true,
        }
    }
}

/// Per-file submission and polling policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Full submit/poll cycles allowed per file (default: 3)
    #[serde(default = "default_attempt_limit")]
    pub attempt_limit: u32,

    /// Wall-clock deadline for one poll cycle (default: 1800 seconds)
    #[serde(default = "default_poll_timeout", with = "duration_serde")]
    pub poll_timeout: Duration,

    /// Delay between status requests (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Backoff for submissions that fail because the service is unreachable
    #[serde(default)]
    pub submit_retry: RetryConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            attempt_limit: default_attempt_limit(),
            poll_timeout: default_poll_timeout(),
            poll_interval: default_poll_interval(),
            submit_retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient transport failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Per-format download toggles (all enabled by default)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Structured JSON output
    #[serde(default = "default_true")]
    pub json: bool,
    /// Zipped Markdown output
    #[serde(default = "default_true")]
    pub markdown: bool,
    /// Plain text output
    #[serde(default = "default_true")]
    pub text: bool,
    /// CSV table output
    #[serde(default = "default_true")]
    pub csv: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            json: true,
            markdown: true,
            text: true,
            csv: true,
        }
    }
}

impl ArtifactConfig {
    /// Enabled formats, in download order
    pub fn enabled(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                ArtifactKind::Json => self.json,
                ArtifactKind::Markdown => self.markdown,
                ArtifactKind::Text => self.text,
                ArtifactKind::Csv => self.csv,
            })
            .collect()
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_parser_config() -> PathBuf {
    PathBuf::from("./config.json")
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_image() -> String {
    "axarev/parsr".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3001/api/v1".to_string()
}

fn default_service_port() -> u16 {
    3001
}

fn default_settle_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_attempt_limit() -> u32 {
    3
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(1800) // 30 minutes
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
