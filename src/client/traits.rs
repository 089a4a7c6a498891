//! Trait for the parsing service contract

use crate::types::{ArtifactKind, JobId, JobStatus};
use async_trait::async_trait;
use std::path::Path;

/// Contract of the backing document-parsing service
///
/// # Errors
///
/// Every method distinguishes "service unreachable"
/// ([`Error::ServiceUnreachable`](crate::Error::ServiceUnreachable)) from answers
/// the service actually sent. Only [`submit`](Self::submit) turns a non-success
/// answer into an error; [`fetch`](Self::fetch) reports it as `Ok(None)`.
#[async_trait]
pub trait ParseService: Send + Sync {
    /// Upload `file` together with the parser configuration at `config`
    ///
    /// Returns the job identifier exactly as the service sent it.
    async fn submit(&self, file: &Path, config: &Path) -> crate::Result<JobId>;

    /// Query the processing status of a job
    async fn status(&self, job: &JobId) -> crate::Result<JobStatus>;

    /// Download one artifact for a finished job
    ///
    /// Returns `Ok(None)` when the service answers with a non-success status,
    /// so one missing format never aborts its siblings.
    async fn fetch(&self, job: &JobId, kind: ArtifactKind) -> crate::Result<Option<Vec<u8>>>;
}
