//! Bounded wait for a submitted job to finish
//!
//! The poller asks the service for a job's status at a fixed interval until the
//! service reports completion or the wall-clock deadline (measured from the start
//! of the wait) runs out. On deadline it restarts the service container and
//! reports the timeout. A status request still outstanding at the deadline is
//! abandoned, so an unresponsive service cannot hold the wait open.
//!
//! No lock is held while sleeping between polls; restarts are serialized inside
//! [`ServiceHandle`].

use crate::client::ParseService;
use crate::error::Result;
use crate::service::ServiceHandle;
use crate::types::{JobId, JobStatus};
use crate::utils::format_duration;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Waits for jobs to complete, restarting the service on timeout
#[derive(Clone)]
pub struct Poller {
    service: Arc<dyn ParseService>,
    handle: Arc<ServiceHandle>,
    interval: Duration,
}

impl Poller {
    /// Create a poller that checks status every `interval`
    pub fn new(
        service: Arc<dyn ParseService>,
        handle: Arc<ServiceHandle>,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            handle,
            interval,
        }
    }

    /// Block until `job` is done or `deadline` has elapsed
    ///
    /// Returns `Ok(true)` once the service reports completion, `Ok(false)` after a
    /// timeout (the service has been restarted by then). Non-done responses and
    /// transport errors are retried until the deadline; a status request is never
    /// awaited past it.
    ///
    /// # Errors
    ///
    /// Only a failed restart is an error; it leaves no service to poll.
    pub async fn await_completion(&self, job: &JobId, deadline: Duration) -> Result<bool> {
        let start = Instant::now();

        loop {
            let remaining = deadline.saturating_sub(start.elapsed());
            let mut stalled = false;
            match tokio::time::timeout(remaining, self.service.status(job)).await {
                Ok(Ok(JobStatus::Done)) => {
                    debug!(job_id = %job, elapsed = %format_duration(start.elapsed()), "Job done");
                    return Ok(true);
                }
                Ok(Ok(JobStatus::Pending { code })) => {
                    debug!(job_id = %job, status_code = code, "Job pending");
                }
                Ok(Err(e)) => {
                    warn!(job_id = %job, error = %e, "Status request failed");
                }
                Err(_) => {
                    warn!(job_id = %job, "Status request still unanswered at the deadline");
                    stalled = true;
                }
            }

            if stalled || start.elapsed() > deadline {
                warn!(
                    job_id = %job,
                    timeout = %format_duration(deadline),
                    "Parser timed out, restarting parsing service"
                );
                self.handle.restart().await?;
                return Ok(false);
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
