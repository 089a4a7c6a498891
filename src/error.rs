//! Error types for parsr-batch
//!
//! A single [`Error`] enum covers every failure the batch driver can observe:
//! - Configuration problems detected before the run starts
//! - Transport failures talking to the parsing service (unreachable vs. rejected)
//! - Container runtime failures (launch, lookup, stop/restart)
//! - Filesystem failures while reading inputs or writing artifacts
//!
//! Per-file problems (poll timeouts, missing artifacts) are *not* errors; they are
//! folded into [`ProcessingOutcome`](crate::types::ProcessingOutcome) by the file
//! processor. Anything surfacing as an `Error` out of a batch is fatal to the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for parsr-batch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for parsr-batch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "attempt_limit")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The parsing service could not be reached at all
    #[error("parsing service unreachable at {url}: {source}")]
    ServiceUnreachable {
        /// The URL that was being requested
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The parsing service answered a submission with a non-success status
    #[error("submission of {file} rejected with status {status}: {reason}")]
    SubmissionRejected {
        /// The input file that was submitted
        file: PathBuf,
        /// HTTP status code returned by the service
        status: u16,
        /// Reason phrase or body returned by the service
        reason: String,
    },

    /// No running container matches the configured image
    #[error("no running container found for image {image}")]
    ContainerNotFound {
        /// The image reference that was searched for
        image: String,
    },

    /// The container runtime ran but reported a failure
    #[error("container runtime failed to {operation}: {message}")]
    ContainerRuntime {
        /// The runtime operation (e.g., "run", "restart")
        operation: String,
        /// Diagnostic output from the runtime
        message: String,
    },

    /// External tool could not be executed or located
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A path could not be used (non-UTF-8 name, missing parent, ...)
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending path
        path: PathBuf,
        /// Why the path is unusable
        reason: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, used as a structured logging field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::ServiceUnreachable { .. } => "service_unreachable",
            Error::SubmissionRejected { .. } => "submission_rejected",
            Error::ContainerNotFound { .. } => "container_not_found",
            Error::ContainerRuntime { .. } => "container_runtime_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidPath { .. } => "invalid_path",
        }
    }

    /// Whether this is the "not found" condition raised by container lookup
    pub fn is_container_not_found(&self) -> bool {
        matches!(self, Error::ContainerNotFound { .. })
    }
}
