//! Core types for parsr-batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A document discovered while walking the input tree
///
/// The stem doubles as the artifact folder name and as the idempotency key
/// checked against the output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFile {
    /// Directory containing the file
    pub dir: PathBuf,
    /// Base name including extension (e.g., "report.pdf")
    pub name: String,
    /// Base name without extension (e.g., "report")
    pub stem: String,
    /// Extension as it appears on disk, without the leading dot (e.g., "PDF")
    pub extension: String,
}

impl InputFile {
    /// Build an input file from a directory and a base name
    ///
    /// The name is split at its first dot, so `archive.tar.gz` has stem `archive`
    /// and extension `tar.gz`. A name without a dot has an empty extension.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        let name = name.into();
        let (stem, extension) = crate::utils::split_file_name(&name);
        Self {
            dir: dir.into(),
            stem: stem.to_string(),
            extension: extension.to_string(),
            name,
        }
    }

    /// Full path of the file
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

/// Opaque job identifier returned by the parsing service on submission
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A submitted parse task; lives only for one submit/poll/download cycle
#[derive(Clone, Debug)]
pub struct Job {
    /// Identifier assigned by the service
    pub id: JobId,
    /// When the submission was accepted
    pub submitted_at: DateTime<Utc>,
    /// Which attempt this job belongs to (1-based)
    pub attempt: u32,
}

/// Status reported by the service for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Still queued or running; carries the HTTP status that was returned
    Pending {
        /// HTTP status code of the status response
        code: u16,
    },
    /// Parsing finished and artifacts can be downloaded
    Done,
}

/// One downloadable output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Structured JSON document
    Json,
    /// Zipped Markdown
    Markdown,
    /// Plain text
    Text,
    /// CSV tables
    Csv,
}

impl ArtifactKind {
    /// All formats, in download order
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Json,
        ArtifactKind::Markdown,
        ArtifactKind::Text,
        ArtifactKind::Csv,
    ];

    /// Path segment of the download endpoint
    pub fn endpoint(&self) -> &'static str {
        match self {
            ArtifactKind::Json => "json",
            ArtifactKind::Markdown => "markdown",
            ArtifactKind::Text => "text",
            ArtifactKind::Csv => "csv",
        }
    }

    /// File extension used when storing the artifact
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Json => "json",
            ArtifactKind::Markdown => "md.zip",
            ArtifactKind::Text => "txt",
            ArtifactKind::Csv => "csv",
        }
    }

    /// Where the artifact for `stem` is stored under `output_dir`
    pub fn output_path(&self, output_dir: &Path, stem: &str) -> PathBuf {
        output_dir
            .join(stem)
            .join(format!("{}.{}", stem, self.extension()))
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Lifecycle state of the backing service container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Never started by this process
    NotStarted,
    /// Started (or adopted) and believed to be running
    Running,
    /// Stopped by this process
    Stopped,
}

/// Why a file was not submitted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension is not in the allow-list
    InvalidExtension {
        /// The rejected extension
        extension: String,
    },
    /// Name has nothing before its first dot (e.g. `.pdf`)
    EmptyStem,
    /// Output for this stem already exists
    AlreadyProcessed,
}

/// Why a file ended in the failed state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Every attempt hit the poll deadline
    TimedOut {
        /// Number of attempts made
        attempts: u32,
        /// Per-attempt deadline, in seconds
        timeout_secs: u64,
    },
    /// The service reported completion but served none of the requested formats
    NoArtifacts {
        /// Attempt on which the job completed
        attempts: u32,
    },
}

/// Terminal outcome for one input file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    /// Not submitted
    Skipped(SkipReason),
    /// At least one artifact was downloaded
    Succeeded {
        /// Formats that were stored
        artifacts: Vec<ArtifactKind>,
        /// Attempt on which the job completed
        attempts: u32,
    },
    /// Attempts exhausted or no artifact available
    Failed(FailureReason),
}

impl ProcessingOutcome {
    /// Failure after all attempts hit the deadline
    pub fn timed_out(attempts: u32, timeout: Duration) -> Self {
        ProcessingOutcome::Failed(FailureReason::TimedOut {
            attempts,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Whether the file produced output
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Succeeded { .. })
    }

    /// Whether the file ended in the failed state
    pub fn is_failure(&self) -> bool {
        matches!(self, ProcessingOutcome::Failed(_))
    }

    /// Whether the file was skipped without submission
    pub fn is_skipped(&self) -> bool {
        matches!(self, ProcessingOutcome::Skipped(_))
    }
}

/// Outcome for one path in the batch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileReport {
    /// Path of the input entry
    pub path: PathBuf,
    /// What happened to it
    #[serde(flatten)]
    pub outcome: ProcessingOutcome,
}

/// Ordered per-file results of a batch
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// One report per visited file, in processing order
    pub files: Vec<FileReport>,
}

impl BatchSummary {
    /// Record a file outcome
    pub fn record(&mut self, path: PathBuf, outcome: ProcessingOutcome) {
        self.files.push(FileReport { path, outcome });
    }

    /// Number of files with at least one artifact
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_success()).count()
    }

    /// Number of files that failed for good
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_failure()).count()
    }

    /// Number of files skipped without submission
    pub fn skipped(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_skipped()).count()
    }

    /// Outcome recorded for a path, if any
    pub fn outcome_for(&self, path: &Path) -> Option<&ProcessingOutcome> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| &f.outcome)
    }
}
