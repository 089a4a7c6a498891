//! Batch driver: directory walk, entry validation and the run-level guard
//!
//! The walk is depth-first and pre-order. At every level all subdirectories are
//! processed (recursively) before the files next to them, and entries keep the
//! order the filesystem enumerates them in.
//!
//! The "already processed" check runs against a single snapshot of the output
//! directory taken before the walk starts, so outputs written during the run never
//! change which files are skipped.

use crate::client::{ParseService, ParsrClient};
use crate::config::{Config, ServiceConfig, SkipMatch};
use crate::error::{Error, Result};
use crate::poller::Poller;
use crate::processor::FileProcessor;
use crate::runtime::{ContainerRuntime, DockerCliRuntime};
use crate::service::ServiceHandle;
use crate::types::{BatchSummary, InputFile, ProcessingOutcome, SkipReason};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Names present in the output directory when the run started
#[derive(Clone, Debug, Default)]
pub struct OutputSnapshot {
    names: HashSet<String>,
}

impl OutputSnapshot {
    /// List `output_dir`, creating it first if it does not exist yet
    pub async fn capture(output_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(output_dir).await?;

        let mut names = HashSet::new();
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            match entry.file_name().into_string() {
                Ok(name) => {
                    names.insert(name);
                }
                Err(name) => {
                    warn!(name = ?name, "Ignoring non UTF-8 name in output directory");
                }
            }
        }

        debug!(output = %output_dir.display(), entries = names.len(), "Output directory snapshot taken");
        Ok(Self { names })
    }

    /// Build a snapshot from known names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `stem` counts as already processed under `mode`
    pub fn contains(&self, stem: &str, mode: SkipMatch) -> bool {
        match mode {
            SkipMatch::Exact => self.names.contains(stem),
            SkipMatch::Substring => self.names.iter().any(|name| name.contains(stem)),
        }
    }

    /// Number of entries in the snapshot
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the output directory was empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Walks an input tree and drives the file processor for every valid entry
pub struct BatchDriver {
    processor: FileProcessor,
    output_dir: PathBuf,
    allowed_extensions: Vec<String>,
    skip_match: SkipMatch,
}

impl BatchDriver {
    /// Create a driver from the run configuration
    pub fn new(processor: FileProcessor, config: &Config) -> Self {
        Self {
            processor,
            output_dir: config.batch.output_dir.clone(),
            allowed_extensions: config.batch.allowed_extensions.clone(),
            skip_match: config.batch.skip_match,
        }
    }

    /// Decide whether a discovered file should be submitted
    ///
    /// Returns the skip reason, or `None` if the file is to be processed.
    pub fn validate(&self, file: &InputFile, snapshot: &OutputSnapshot) -> Option<SkipReason> {
        let allowed = self
            .allowed_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&file.extension));
        if !allowed {
            warn!(
                file = %file.name,
                extension = %file.extension,
                "Skipping file with unsupported extension"
            );
            return Some(SkipReason::InvalidExtension {
                extension: file.extension.clone(),
            });
        }

        // An empty stem would name the output root itself and, in substring
        // mode, match any existing entry
        if file.stem.is_empty() {
            warn!(file = %file.name, "Skipping file with an empty name stem");
            return Some(SkipReason::EmptyStem);
        }

        if snapshot.contains(&file.stem, self.skip_match) {
            debug!(file = %file.name, stem = %file.stem, "Already processed, skipping");
            return Some(SkipReason::AlreadyProcessed);
        }

        None
    }

    /// Process every file under `input_dir`
    ///
    /// # Errors
    ///
    /// Returns the first run-fatal error (submission failure, failed restart,
    /// unreadable input directory). Outcomes recorded up to that point are lost
    /// with it; the caller only needs to stop the service.
    pub async fn run_batch(&self, input_dir: &Path) -> Result<BatchSummary> {
        let snapshot = OutputSnapshot::capture(&self.output_dir).await?;
        let mut summary = BatchSummary::default();

        self.walk(input_dir, &snapshot, &mut summary).await?;

        info!(
            output = %self.output_dir.display(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "All files have been parsed"
        );
        Ok(summary)
    }

    fn walk<'a>(
        &'a self,
        dir: &'a Path,
        snapshot: &'a OutputSnapshot,
        summary: &'a mut BatchSummary,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut subdirs = Vec::new();
            let mut files = Vec::new();

            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                // Follows symlinks, unlike DirEntry::file_type
                let metadata = match tokio::fs::metadata(&path).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Unreadable entry, skipping");
                        continue;
                    }
                };

                if metadata.is_dir() {
                    subdirs.push(path);
                    continue;
                }

                match entry.file_name().into_string() {
                    Ok(name) => files.push(name),
                    Err(name) => {
                        warn!(name = ?name, dir = %dir.display(), "Skipping non UTF-8 file name");
                    }
                }
            }

            for subdir in &subdirs {
                debug!(dir = %subdir.display(), "Descending into directory");
                self.walk(subdir, snapshot, summary).await?;
            }

            for name in files {
                let file = InputFile::new(dir, name);

                if let Some(reason) = self.validate(&file, snapshot) {
                    summary.record(file.path(), ProcessingOutcome::Skipped(reason));
                    continue;
                }

                info!(file = %file.name, dir = %dir.display(), "Parsing started");
                let outcome = self.processor.process(&file).await?;
                if outcome.is_success() {
                    info!(file = %file.name, "Parsing completed");
                } else {
                    warn!(file = %file.name, outcome = ?outcome, "Parsing failed");
                }
                summary.record(file.path(), outcome);
            }

            Ok(())
        })
    }
}

/// Locate the `docker` binary the service configuration points at
///
/// # Errors
///
/// Returns [`Error::ExternalTool`] when no binary is configured and none is found
/// on `PATH` (or `PATH` search is disabled).
pub fn docker_runtime(config: &ServiceConfig) -> Result<DockerCliRuntime> {
    match &config.docker_path {
        Some(path) => Ok(DockerCliRuntime::new(path.clone())),
        None if config.search_path => DockerCliRuntime::from_path()
            .ok_or_else(|| Error::ExternalTool("docker binary not found on PATH".to_string())),
        None => Err(Error::ExternalTool(
            "no docker binary configured and PATH search is disabled".to_string(),
        )),
    }
}

/// Run a full batch against the docker-hosted parsing service
///
/// # Errors
///
/// Fails if no container runtime binary can be found, if the service cannot be
/// started, or if the batch aborts; the service is stopped in the latter case.
pub async fn run(config: &Config) -> Result<BatchSummary> {
    let runtime = docker_runtime(&config.service)?;
    let client = ParsrClient::from_config(&config.service)?;

    run_with(config, Arc::new(runtime), Arc::new(client)).await
}

/// Run a full batch with explicit runtime and service implementations
///
/// Starts the service once, walks the input tree and stops the service exactly
/// once afterwards, whether the batch completed or aborted.
///
/// # Errors
///
/// Returns the start failure (nothing is stopped then, nothing was launched) or
/// the error that aborted the batch.
pub async fn run_with(
    config: &Config,
    runtime: Arc<dyn ContainerRuntime>,
    service: Arc<dyn ParseService>,
) -> Result<BatchSummary> {
    let summary = run_until(config, runtime, service, std::future::pending::<()>()).await?;
    Ok(summary.unwrap_or_default())
}

/// Like [`run_with`], but abandons the batch once `interrupt` resolves
///
/// `interrupt` is first polled after the service has started, so an interrupt
/// that fires during start-up is acted on as soon as the container is tracked.
/// The service is stopped through the same handle either way. Returns
/// `Ok(None)` when the batch was interrupted.
///
/// # Errors
///
/// Same as [`run_with`]. A failed stop after an interrupt is returned as well.
pub async fn run_until<F>(
    config: &Config,
    runtime: Arc<dyn ContainerRuntime>,
    service: Arc<dyn ParseService>,
    interrupt: F,
) -> Result<Option<BatchSummary>>
where
    F: Future<Output = ()>,
{
    let handle = Arc::new(ServiceHandle::new(runtime, &config.service));
    handle.start().await?;

    let poller = Poller::new(
        service.clone(),
        handle.clone(),
        config.processing.poll_interval,
    );
    let driver = BatchDriver::new(FileProcessor::new(service, poller, config), config);

    let result = tokio::select! {
        biased;
        _ = interrupt => {
            warn!("Interrupted, abandoning batch and stopping parsing service");
            Ok(None)
        }
        result = driver.run_batch(&config.batch.input_dir) => result.map(Some),
    };
    if let Err(e) = &result {
        error!(error = %e, code = e.error_code(), "Batch aborted");
    }

    if let Err(e) = handle.stop().await {
        error!(error = %e, "Failed to stop parsing service");
        // The batch error, if any, is the one worth reporting
        if result.is_ok() {
            return Err(e);
        }
    }

    if handle.restart_count() > 0 {
        info!(restarts = handle.restart_count(), "Parsing service was restarted during the run");
    }
    result
}
