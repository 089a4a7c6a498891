//! HTTP client for the Parsr API

use super::traits::ParseService;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::types::{ArtifactKind, JobId, JobStatus};
use crate::utils::mime_for_extension;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

/// Request timeout used by [`ParsrClient::new`]
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for the Parsr document-parsing API
///
/// Endpoint layout, relative to the base URL (e.g. `http://localhost:3001/api/v1`):
///
/// | Operation | Request |
/// |---|---|
/// | submit | `POST /document` (multipart `file` + `config`) |
/// | status | `GET /queue/{id}`, `201 Created` once done |
/// | fetch | `GET /{json,markdown,text,csv}/{id}?download=1` |
/// | installation check | `GET /check-installation` |
/// | default parser config | `GET /default-config` |
#[derive(Clone, Debug)]
pub struct ParsrClient {
    http: reqwest::Client,
    base_url: String,
}

impl ParsrClient {
    /// Create a client for the API rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` is not a valid URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests each give up after `timeout`
    ///
    /// A timed out request surfaces as [`Error::ServiceUnreachable`].
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| Error::config("base_url", format!("invalid base_url {}: {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parsr-batch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config("request_timeout", format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the service configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::with_timeout(config.base_url.clone(), config.request_timeout)
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn job_url(&self, prefix: &str, job: &JobId) -> String {
        self.url(&format!("{}/{}", prefix, urlencoding::encode(job.as_str())))
    }

    /// Ask the service which of its external dependencies are installed
    pub async fn check_installation(&self) -> Result<serde_json::Value> {
        self.get_json("check-installation").await
    }

    /// Fetch the service's default parser configuration
    ///
    /// Useful to bootstrap the configuration file sent with every submission.
    pub async fn default_config(&self) -> Result<serde_json::Value> {
        self.get_json("default-config").await
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?
            .error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ParseService for ParsrClient {
    async fn submit(&self, file: &Path, config: &Path) -> Result<JobId> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidPath {
                path: file.to_path_buf(),
                reason: "file name is not valid UTF-8".to_string(),
            })?
            .to_string();
        let (_, extension) = crate::utils::split_file_name(&file_name);
        let mime = mime_for_extension(extension);

        let document = tokio::fs::read(file).await?;
        let parser_config = tokio::fs::read(config).await?;

        let form = Form::new()
            .part(
                "file",
                Part::bytes(document)
                    .file_name(file_name)
                    .mime_str(mime.essence_str())?,
            )
            .part(
                "config",
                Part::bytes(parser_config)
                    .file_name("config")
                    .mime_str("application/json")?,
            );

        let url = self.url("document");
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let phrase = status.canonical_reason().unwrap_or("unknown status");
            let reason = if body.trim().is_empty() {
                phrase.to_string()
            } else {
                format!("{}: {}", phrase, body.trim())
            };
            return Err(Error::SubmissionRejected {
                file: file.to_path_buf(),
                status: status.as_u16(),
                reason,
            });
        }

        let id = response.text().await?;
        tracing::debug!(file = %file.display(), job_id = %id, "Document submitted");
        Ok(JobId(id))
    }

    async fn status(&self, job: &JobId) -> Result<JobStatus> {
        let url = self.job_url("queue", job);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let code = response.status();
        if code == StatusCode::CREATED {
            Ok(JobStatus::Done)
        } else {
            Ok(JobStatus::Pending {
                code: code.as_u16(),
            })
        }
    }

    async fn fetch(&self, job: &JobId, kind: ArtifactKind) -> Result<Option<Vec<u8>>> {
        let url = self.job_url(kind.endpoint(), job);
        let response = self
            .http
            .get(&url)
            .query(&[("download", "1")])
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                url = %url,
                status_code = status.as_u16(),
                reason = status.canonical_reason().unwrap_or("unknown"),
                "Download failed"
            );
            return Ok(None);
        }

        let body = response.bytes().await?;
        Ok(Some(body.to_vec()))
    }
}

/// Classify a reqwest send error: connect/timeout failures mean the service is unreachable
fn transport_error(url: &str, error: reqwest::Error) -> Error {
    if error.is_connect() || error.is_timeout() {
        Error::ServiceUnreachable {
            url: url.to_string(),
            source: error,
        }
    } else {
        Error::Network(error)
    }
}
