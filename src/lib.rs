//! # parsr-batch
//!
//! Batch driver for a containerized document-parsing service (Parsr).
//!
//! Walks a directory tree of documents, submits each one to the parsing service,
//! waits for the job with a bounded deadline, downloads the resulting artifacts
//! (JSON, zipped Markdown, text, CSV) and restarts the service container when a
//! job stalls.
//!
//! ## Design Philosophy
//!
//! - **One service per run** - the container is started once and always stopped
//!   again, whether the batch completes or aborts
//! - **Bounded per-file work** - each file gets a fixed number of attempts, each
//!   with a fresh poll deadline
//! - **Idempotent re-runs** - files whose output folder already exists are skipped
//! - **Trait seams** - the container runtime and the parsing service are traits,
//!   so the whole state machine runs against in-memory fakes in tests
//!
//! ## Quick Start
//!
//! ```no_run
//! use parsr_batch::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.batch.input_dir = "./documents".into();
//!     config.batch.output_dir = "./parsed".into();
//!
//!     let summary = parsr_batch::run(&config).await?;
//!     println!(
//!         "{} parsed, {} failed, {} skipped",
//!         summary.succeeded(),
//!         summary.failed(),
//!         summary.skipped()
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch driver and run-level guard
pub mod batch;
/// Parsing service client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Job status polling with deadline
pub mod poller;
/// Per-file processing state machine
pub mod processor;
/// Retry logic with exponential backoff
pub mod retry;
/// Container runtime abstraction
pub mod runtime;
/// Parsing service container lifecycle
pub mod service;
/// Core types and outcomes
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use batch::{BatchDriver, OutputSnapshot, run, run_until, run_with};
pub use client::{ParseService, ParsrClient};
pub use config::{ArtifactConfig, Config, ProcessingConfig, ServiceConfig, SkipMatch};
pub use error::{Error, Result};
pub use poller::Poller;
pub use processor::FileProcessor;
pub use runtime::{ContainerHandle, ContainerRuntime, DockerCliRuntime, PortMapping};
pub use service::ServiceHandle;
pub use types::{
    ArtifactKind, BatchSummary, FailureReason, FileReport, InputFile, JobId, JobStatus,
    ProcessingOutcome, ServiceState, SkipReason,
};

use std::sync::Arc;

/// Run a batch, stopping the parsing service if the process is interrupted
///
/// Returns `Ok(None)` when a termination signal arrived before the batch finished.
/// Signal handlers are installed before the container is launched. A signal
/// received while the service is starting takes effect once it is up, and the
/// started container is then stopped through the handle that launched it.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use parsr_batch::{Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     match run_with_shutdown(&config).await? {
///         Some(summary) => println!("{} files parsed", summary.succeeded()),
///         None => println!("interrupted"),
///     }
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(config: &Config) -> Result<Option<BatchSummary>> {
    let runtime = batch::docker_runtime(&config.service)?;
    let client = ParsrClient::from_config(&config.service)?;
    let signalled = wait_for_signal();

    batch::run_until(config, Arc::new(runtime), Arc::new(client), signalled).await
}

/// Register the termination handlers now; the returned future resolves on the first signal
#[cfg(unix)]
fn wait_for_signal() -> impl std::future::Future<Output = ()> + Send + 'static {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    async move {
        match (sigterm_result, sigint_result) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM signal");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT signal (Ctrl+C)");
                    }
                }
            }
            (Err(e), _) => {
                tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
                if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                    sigint.recv().await;
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                } else {
                    tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                    tokio::signal::ctrl_c().await.ok();
                }
            }
            (_, Err(e)) => {
                tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM signal");
                } else {
                    tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                    tokio::signal::ctrl_c().await.ok();
                }
            }
        }
    }
}

#[cfg(not(unix))]
fn wait_for_signal() -> impl std::future::Future<Output = ()> + Send + 'static {
    async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C signal");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}
