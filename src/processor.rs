//! End-to-end processing of one input file
//!
//! Per-file state machine:
//!
//! ```text
//! Discovered → Submitted → Polling → Downloading → [Succeeded]
//!                  ↑           │            └──────→ [Failed]  (no artifact stored)
//!                  └─ Retrying ┤
//!                              └──────────────────→ [Failed]  (attempt limit reached)
//! ```
//!
//! A timeout triggers a full resubmission rather than another poll: the restart
//! the poller performed has discarded the service-side job. Submission errors are
//! returned to the caller untouched; they mean the service itself is unusable.

use crate::client::ParseService;
use crate::config::{Config, RetryConfig};
use crate::error::Result;
use crate::poller::Poller;
use crate::retry::with_retry;
use crate::types::{ArtifactKind, FailureReason, InputFile, Job, ProcessingOutcome};
use crate::utils::format_duration;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives a single file through submit, poll, retry and download
pub struct FileProcessor {
    service: Arc<dyn ParseService>,
    poller: Poller,
    output_dir: PathBuf,
    parser_config: PathBuf,
    attempt_limit: u32,
    poll_timeout: Duration,
    artifacts: Vec<ArtifactKind>,
    submit_retry: RetryConfig,
    mark_failed: bool,
}

impl FileProcessor {
    /// Create a processor from the run configuration
    pub fn new(service: Arc<dyn ParseService>, poller: Poller, config: &Config) -> Self {
        Self {
            service,
            poller,
            output_dir: config.batch.output_dir.clone(),
            parser_config: config.batch.parser_config.clone(),
            attempt_limit: config.processing.attempt_limit.max(1),
            poll_timeout: config.processing.poll_timeout,
            artifacts: config.artifacts.enabled(),
            submit_retry: config.processing.submit_retry.clone(),
            mark_failed: config.batch.mark_failed,
        }
    }

    /// Process one file to a terminal outcome
    ///
    /// # Errors
    ///
    /// Submission failures and failed service restarts are returned as errors
    /// and abort the batch. Timeouts and missing artifacts are outcomes, not errors.
    pub async fn process(&self, file: &InputFile) -> Result<ProcessingOutcome> {
        let mut attempt = 1;

        loop {
            let job = self.submit(file, attempt).await?;

            if self.poller.await_completion(&job.id, self.poll_timeout).await? {
                return self.download(file, &job).await;
            }

            if attempt >= self.attempt_limit {
                warn!(
                    file = %file.name,
                    attempts = attempt,
                    timeout = %format_duration(self.poll_timeout),
                    "Parser timed out too many times, giving up on file"
                );
                self.mark_failure(file).await;
                return Ok(ProcessingOutcome::timed_out(attempt, self.poll_timeout));
            }

            attempt += 1;
            warn!(
                file = %file.name,
                attempt,
                limit = self.attempt_limit,
                timeout = %format_duration(self.poll_timeout),
                "Parser timed out, resubmitting"
            );
        }
    }

    async fn submit(&self, file: &InputFile, attempt: u32) -> Result<Job> {
        let path = file.path();
        let id = with_retry(&self.submit_retry, || {
            self.service.submit(&path, &self.parser_config)
        })
        .await?;

        debug!(file = %file.name, job_id = %id, attempt, "Submitted to parser");
        Ok(Job {
            id,
            submitted_at: chrono::Utc::now(),
            attempt,
        })
    }

    /// Fetch every enabled format; any single failure leaves the others untouched
    ///
    /// A format that cannot be fetched or written counts as missing.
    async fn download(&self, file: &InputFile, job: &Job) -> Result<ProcessingOutcome> {
        let mut stored = Vec::with_capacity(self.artifacts.len());

        for kind in &self.artifacts {
            match self.service.fetch(&job.id, *kind).await {
                Ok(Some(bytes)) => match self.store(file, *kind, &bytes).await {
                    Ok(target) => {
                        debug!(
                            file = %file.name,
                            format = %kind,
                            bytes = bytes.len(),
                            path = %target.display(),
                            "Artifact stored"
                        );
                        stored.push(*kind);
                    }
                    Err(e) => {
                        warn!(
                            file = %file.name,
                            format = %kind,
                            error = %e,
                            "Failed to write artifact"
                        );
                    }
                },
                Ok(None) => {
                    debug!(file = %file.name, format = %kind, "Artifact not available");
                }
                Err(e) => {
                    warn!(file = %file.name, format = %kind, error = %e, "Artifact download failed");
                }
            }
        }

        if stored.is_empty() {
            warn!(
                file = %file.name,
                job_id = %job.id,
                "Parser reported completion but no artifact could be downloaded"
            );
            self.mark_failure(file).await;
            return Ok(ProcessingOutcome::Failed(FailureReason::NoArtifacts {
                attempts: job.attempt,
            }));
        }

        let elapsed = chrono::Utc::now() - job.submitted_at;
        info!(
            file = %file.name,
            formats = stored.len(),
            elapsed_secs = elapsed.num_seconds(),
            "Artifacts downloaded"
        );
        Ok(ProcessingOutcome::Succeeded {
            artifacts: stored,
            attempts: job.attempt,
        })
    }

    async fn store(&self, file: &InputFile, kind: ArtifactKind, bytes: &[u8]) -> Result<PathBuf> {
        let target = kind.output_path(&self.output_dir, &file.stem);
        tokio::fs::create_dir_all(self.output_dir.join(&file.stem)).await?;
        tokio::fs::write(&target, bytes).await?;
        Ok(target)
    }

    /// Leave an empty output folder so the next run skips this file
    async fn mark_failure(&self, file: &InputFile) {
        if !self.mark_failed {
            return;
        }
        match tokio::fs::create_dir_all(self.output_dir.join(&file.stem)).await {
            Ok(()) => warn!(
                file = %file.name,
                "Created empty output folder so the file is skipped on the next run"
            ),
            Err(e) => warn!(file = %file.name, error = %e, "Failed to create failure marker"),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceHandle;
    use crate::test_helpers::{FakeParseService, FakeRuntime, StatusScript, service_config};
    use tempfile::TempDir;

    struct Fixture {
        processor: FileProcessor,
        service: Arc<FakeParseService>,
        runtime: Arc<FakeRuntime>,
        input: InputFile,
        output: PathBuf,
        _dir: TempDir,
    }

    async fn fixture(service: FakeParseService, tweak: impl FnOnce(&mut Config)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input_dir).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(input_dir.join("report.pdf"), b"%PDF").unwrap();

        let mut config = Config::default();
        config.batch.output_dir = output.clone();
        config.batch.parser_config = dir.path().join("config.json");
        config.service = service_config();
        tweak(&mut config);

        let runtime = Arc::new(FakeRuntime::new());
        let handle = Arc::new(ServiceHandle::new(runtime.clone(), &config.service));
        handle.start().await.unwrap();

        let service = Arc::new(service);
        let poller = Poller::new(service.clone(), handle, config.processing.poll_interval);
        let processor = FileProcessor::new(service.clone(), poller, &config);

        Fixture {
            processor,
            service,
            runtime,
            input: InputFile::new(input_dir, "report.pdf"),
            output,
            _dir: dir,
        }
    }

    fn stored_files(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_success_downloads_all_formats() {
        let f = fixture(FakeParseService::new(StatusScript::DoneAfter(0)), |_| {}).await;

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert_eq!(
            outcome,
            ProcessingOutcome::Succeeded {
                artifacts: ArtifactKind::ALL.to_vec(),
                attempts: 1,
            }
        );
        assert_eq!(
            stored_files(&f.output.join("report")),
            vec!["report.csv", "report.json", "report.md.zip", "report.txt"]
        );
        assert_eq!(
            std::fs::read(f.output.join("report/report.json")).unwrap(),
            FakeParseService::payload(ArtifactKind::Json)
        );
    }

    #[tokio::test]
    async fn test_partial_artifacts_still_succeed() {
        let service = FakeParseService::new(StatusScript::DoneAfter(0))
            .missing(&[ArtifactKind::Markdown, ArtifactKind::Csv]);
        let f = fixture(service, |_| {}).await;

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert_eq!(
            outcome,
            ProcessingOutcome::Succeeded {
                artifacts: vec![ArtifactKind::Json, ArtifactKind::Text],
                attempts: 1,
            }
        );
        assert_eq!(
            stored_files(&f.output.join("report")),
            vec!["report.json", "report.txt"]
        );
        // Sibling downloads were all attempted
        assert_eq!(f.service.fetches().len(), 4);
    }

    #[tokio::test]
    async fn test_no_artifacts_is_failure() {
        let service = FakeParseService::new(StatusScript::DoneAfter(0)).missing(&ArtifactKind::ALL);
        let f = fixture(service, |_| {}).await;

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert_eq!(
            outcome,
            ProcessingOutcome::Failed(FailureReason::NoArtifacts { attempts: 1 })
        );
        assert!(!f.output.join("report").exists());
    }

    #[tokio::test]
    async fn test_unwritable_artifact_does_not_stop_siblings() {
        let f = fixture(FakeParseService::new(StatusScript::DoneAfter(0)), |_| {}).await;
        // A directory where the JSON artifact should go makes that write fail
        std::fs::create_dir_all(f.output.join("report/report.json")).unwrap();

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert_eq!(
            outcome,
            ProcessingOutcome::Succeeded {
                artifacts: vec![ArtifactKind::Markdown, ArtifactKind::Text, ArtifactKind::Csv],
                attempts: 1,
            }
        );
        assert_eq!(f.service.fetches().len(), 4);
        assert_eq!(
            std::fs::read(f.output.join("report/report.csv")).unwrap(),
            FakeParseService::payload(ArtifactKind::Csv)
        );
    }

    #[tokio::test]
    async fn test_unwritable_output_folder_is_a_failed_outcome() {
        let f = fixture(FakeParseService::new(StatusScript::DoneAfter(0)), |c| {
            c.batch.mark_failed = true;
        })
        .await;
        // A plain file in place of the output folder
        std::fs::write(f.output.join("report"), b"occupied").unwrap();

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert_eq!(
            outcome,
            ProcessingOutcome::Failed(FailureReason::NoArtifacts { attempts: 1 })
        );
        assert_eq!(f.service.fetches().len(), 4);
        assert!(f.output.join("report").is_file());
    }

    #[tokio::test]
    async fn test_disabled_formats_are_not_fetched() {
        let f = fixture(FakeParseService::new(StatusScript::DoneAfter(0)), |c| {
            c.artifacts.markdown = false;
            c.artifacts.csv = false;
        })
        .await;

        f.processor.process(&f.input).await.unwrap();

        let kinds: Vec<_> = f.service.fetches().into_iter().map(|(_, k)| k).collect();
        assert_eq!(kinds, vec![ArtifactKind::Json, ArtifactKind::Text]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_exhaust_attempt_limit() {
        let f = fixture(FakeParseService::new(StatusScript::Never), |_| {}).await;

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert_eq!(
            outcome,
            ProcessingOutcome::Failed(FailureReason::TimedOut {
                attempts: 3,
                timeout_secs: 1800,
            })
        );
        assert_eq!(f.service.submissions().len(), 3, "one submission per attempt");
        assert_eq!(f.runtime.restarts(), 3, "one restart per timed-out attempt");
        assert!(f.service.fetches().is_empty());
        assert!(!f.output.join("report").exists(), "no marker by default");
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_limit_of_one_never_resubmits() {
        let f = fixture(FakeParseService::new(StatusScript::Never), |c| {
            c.processing.attempt_limit = 1;
        })
        .await;

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert!(outcome.is_failure());
        assert_eq!(f.service.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_failed_leaves_empty_folder() {
        let f = fixture(FakeParseService::new(StatusScript::Never), |c| {
            c.batch.mark_failed = true;
            c.processing.attempt_limit = 2;
        })
        .await;

        let outcome = f.processor.process(&f.input).await.unwrap();

        assert!(outcome.is_failure());
        let marker = f.output.join("report");
        assert!(marker.is_dir());
        assert!(stored_files(&marker).is_empty());
    }

    #[tokio::test]
    async fn test_submission_rejection_propagates() {
        let f = fixture(
            FakeParseService::new(StatusScript::DoneAfter(0)).rejecting(500),
            |_| {},
        )
        .await;

        let result = f.processor.process(&f.input).await;

        assert!(matches!(
            result,
            Err(crate::Error::SubmissionRejected { status: 500, .. })
        ));
        assert_eq!(f.service.submissions().len(), 1, "rejections are not retried");
    }
}
