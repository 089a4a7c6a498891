//! Mock Parsr server, recording container runtime and workspace helpers

use async_trait::async_trait;
use parsr_batch::{ArtifactKind, Config, ContainerHandle, ContainerRuntime, PortMapping};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Job id handed out by the mock server for every submission
pub const JOB_ID: &str = "7d1f0a9c3b";

/// Bytes the mock server serves for a format
pub fn artifact_body(kind: ArtifactKind) -> Vec<u8> {
    format!("{} artifact for {}", kind.endpoint(), JOB_ID).into_bytes()
}

/// Mount the submit endpoint answering with [`JOB_ID`]
pub async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/document"))
        .respond_with(ResponseTemplate::new(202).set_body_string(JOB_ID))
        .mount(server)
        .await;
}

/// Mount the queue endpoint: `pending` answers of 200 first, then 201 (done)
pub async fn mount_queue(server: &MockServer, pending: u64) {
    let queue = format!("/api/v1/queue/{}", JOB_ID);
    if pending > 0 {
        Mock::given(method("GET"))
            .and(path(queue.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "progress-percentage": 40,
                "status": "Processing",
            })))
            .up_to_n_times(pending)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(queue.as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": JOB_ID,
        })))
        .mount(server)
        .await;
}

/// Mount download endpoints; formats in `available` are served, the rest 404
pub async fn mount_artifacts(server: &MockServer, available: &[ArtifactKind]) {
    for kind in ArtifactKind::ALL {
        let route = format!("/api/v1/{}/{}", kind.endpoint(), JOB_ID);
        let response = if available.contains(&kind) {
            ResponseTemplate::new(200).set_body_bytes(artifact_body(kind))
        } else {
            ResponseTemplate::new(404).set_body_string("File not found")
        };
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .and(query_param("download", "1"))
            .respond_with(response)
            .mount(server)
            .await;
    }
}

/// A mock Parsr that finishes every job after `pending` status polls
pub async fn mock_parsr(pending: u64, available: &[ArtifactKind]) -> MockServer {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_queue(&server, pending).await;
    mount_artifacts(&server, available).await;
    server
}

/// Count received requests whose path starts with `prefix`
pub async fn requests_to(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .count()
}

/// Mount a submit endpoint that always answers 500
pub async fn mount_rejecting_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/document"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Parsing engine crashed"))
        .mount(server)
        .await;
}

/// Container runtime that only records what it was asked to do
#[derive(Default)]
pub struct RecordingRuntime {
    calls: Mutex<Vec<String>>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn run(
        &self,
        image: &str,
        ports: PortMapping,
        _auto_remove: bool,
    ) -> parsr_batch::Result<ContainerHandle> {
        self.record(format!("run {} {}:{}", image, ports.host, ports.container));
        Ok(ContainerHandle {
            id: "recorded".to_string(),
            image: image.to_string(),
        })
    }

    async fn list_running(&self) -> parsr_batch::Result<Vec<ContainerHandle>> {
        self.record("ps".to_string());
        Ok(Vec::new())
    }

    async fn stop(&self, container: &ContainerHandle) -> parsr_batch::Result<()> {
        self.record(format!("stop {}", container.id));
        Ok(())
    }

    async fn restart(&self, container: &ContainerHandle) -> parsr_batch::Result<()> {
        self.record(format!("restart {}", container.id));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Temporary input/output layout with a config pointing at `server`
pub struct Workspace {
    pub dir: TempDir,
    pub config: Config,
}

impl Workspace {
    pub fn new(server: &MockServer) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.batch.input_dir = dir.path().join("input");
        config.batch.output_dir = dir.path().join("output");
        config.batch.parser_config = dir.path().join("config.json");
        config.service.base_url = format!("{}/api/v1", server.uri());
        config.service.settle_interval = Duration::ZERO;
        config.processing.poll_interval = Duration::from_millis(10);
        config.processing.poll_timeout = Duration::from_secs(10);

        std::fs::create_dir_all(&config.batch.input_dir).unwrap();
        std::fs::write(&config.batch.parser_config, br#"{"version":0.9,"cleaner":[]}"#).unwrap();
        Self { dir, config }
    }

    /// Create an input document at a path relative to the input root
    pub fn add_input(&self, relative: &str) -> PathBuf {
        let path = self.config.batch.input_dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.4\n%test document\n").unwrap();
        path
    }

    /// Create an entry in the output directory as if from an earlier run
    pub fn add_output_dir(&self, name: &str) {
        std::fs::create_dir_all(self.config.batch.output_dir.join(name)).unwrap();
    }

    pub fn output(&self) -> &Path {
        &self.config.batch.output_dir
    }

    /// Every file and directory below the output root, relative and sorted
    pub fn output_tree(&self) -> Vec<String> {
        let root = self.output();
        let mut entries: Vec<String> = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                e.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        entries.sort();
        entries
    }
}
