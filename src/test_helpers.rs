//! Shared test doubles for the container runtime and the parsing service.

use crate::client::ParseService;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::runtime::{ContainerHandle, ContainerRuntime, PortMapping};
use crate::types::{ArtifactKind, JobId, JobStatus};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Service config with no settle delay
pub(crate) fn service_config() -> ServiceConfig {
    ServiceConfig {
        settle_interval: Duration::ZERO,
        ..Default::default()
    }
}

/// One call observed by [`FakeRuntime`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RuntimeCall {
    Run(String),
    List,
    Stop(String),
    Restart(String),
}

#[derive(Default)]
struct RuntimeState {
    running: Vec<ContainerHandle>,
    calls: Vec<RuntimeCall>,
    launched: u32,
}

/// In-memory container runtime that records every call
#[derive(Default)]
pub(crate) struct FakeRuntime {
    state: Mutex<RuntimeState>,
    fail_run: bool,
    fail_stop: bool,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pretend a container is already running
    pub(crate) fn with_running(self, id: &str, image: &str) -> Self {
        self.state.lock().unwrap().running.push(ContainerHandle {
            id: id.to_string(),
            image: image.to_string(),
        });
        self
    }

    /// Make `run` fail as if the image could not be launched
    pub(crate) fn failing_run(mut self) -> Self {
        self.fail_run = true;
        self
    }

    /// Make `stop` fail and leave the container running
    pub(crate) fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn restarts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Restart(_)))
            .count()
    }

    pub(crate) fn stops(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Stop(_)))
            .count()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn run(
        &self,
        image: &str,
        _ports: PortMapping,
        _auto_remove: bool,
    ) -> Result<ContainerHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RuntimeCall::Run(image.to_string()));
        if self.fail_run {
            return Err(Error::ContainerRuntime {
                operation: "run".into(),
                message: "Unable to find image locally".into(),
            });
        }
        state.launched += 1;
        let handle = ContainerHandle {
            id: format!("fake-{}", state.launched),
            image: image.to_string(),
        };
        state.running.push(handle.clone());
        Ok(handle)
    }

    async fn list_running(&self) -> Result<Vec<ContainerHandle>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RuntimeCall::List);
        Ok(state.running.clone())
    }

    async fn stop(&self, container: &ContainerHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RuntimeCall::Stop(container.id.clone()));
        if self.fail_stop {
            return Err(Error::ContainerRuntime {
                operation: "stop".into(),
                message: "Cannot connect to the Docker daemon".into(),
            });
        }
        state.running.retain(|c| c.id != container.id);
        Ok(())
    }

    async fn restart(&self, container: &ContainerHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RuntimeCall::Restart(container.id.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// How [`FakeParseService`] answers status requests
#[derive(Debug, Clone, Copy)]
pub(crate) enum StatusScript {
    /// Report pending `n` times for each job, then done
    DoneAfter(u32),
    /// Never report done
    Never,
    /// Never answer at all
    Hang,
}

#[derive(Default)]
struct ServiceState {
    submissions: Vec<PathBuf>,
    status_calls: HashMap<JobId, u32>,
    fetches: Vec<(JobId, ArtifactKind)>,
    transport_failures: u32,
}

/// In-memory parsing service with scripted answers
pub(crate) struct FakeParseService {
    script: StatusScript,
    missing: HashSet<ArtifactKind>,
    reject: Option<u16>,
    state: Mutex<ServiceState>,
}

impl FakeParseService {
    pub(crate) fn new(script: StatusScript) -> Self {
        Self {
            script,
            missing: HashSet::new(),
            reject: None,
            state: Mutex::new(ServiceState::default()),
        }
    }

    /// Answer fetches for these formats with "no data"
    pub(crate) fn missing(mut self, kinds: &[ArtifactKind]) -> Self {
        self.missing.extend(kinds.iter().copied());
        self
    }

    /// Reject every submission with the given status
    pub(crate) fn rejecting(mut self, status: u16) -> Self {
        self.reject = Some(status);
        self
    }

    /// Fail the next `n` status calls as if the service were unreachable
    pub(crate) fn with_transport_failures(self, n: u32) -> Self {
        self.state.lock().unwrap().transport_failures = n;
        self
    }

    pub(crate) fn submissions(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub(crate) fn total_status_calls(&self) -> u32 {
        self.state.lock().unwrap().status_calls.values().sum()
    }

    pub(crate) fn fetches(&self) -> Vec<(JobId, ArtifactKind)> {
        self.state.lock().unwrap().fetches.clone()
    }

    /// Bytes served for a format
    pub(crate) fn payload(kind: ArtifactKind) -> Vec<u8> {
        format!("{} payload", kind.endpoint()).into_bytes()
    }
}

#[async_trait]
impl ParseService for FakeParseService {
    async fn submit(&self, file: &Path, _config: &Path) -> Result<JobId> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(file.to_path_buf());
        if let Some(status) = self.reject {
            return Err(Error::SubmissionRejected {
                file: file.to_path_buf(),
                status,
                reason: "Internal Server Error".into(),
            });
        }
        Ok(JobId(format!("job-{}", state.submissions.len())))
    }

    async fn status(&self, job: &JobId) -> Result<JobStatus> {
        if let StatusScript::Hang = self.script {
            {
                let mut state = self.state.lock().unwrap();
                *state.status_calls.entry(job.clone()).or_insert(0) += 1;
            }
            return std::future::pending().await;
        }
        let mut state = self.state.lock().unwrap();
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        let calls = state.status_calls.entry(job.clone()).or_insert(0);
        *calls += 1;
        match self.script {
            StatusScript::DoneAfter(n) if *calls > n => Ok(JobStatus::Done),
            _ => Ok(JobStatus::Pending { code: 200 }),
        }
    }

    async fn fetch(&self, job: &JobId, kind: ArtifactKind) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().unwrap();
        state.fetches.push((job.clone(), kind));
        if self.missing.contains(&kind) {
            Ok(None)
        } else {
            Ok(Some(Self::payload(kind)))
        }
    }
}
