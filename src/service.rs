//! Lifecycle of the backing parsing service container
//!
//! [`ServiceHandle`] owns the single container instance a run is scoped to. The
//! batch driver starts and stops it; the poller holds a shared reference and may
//! restart it when a job stalls. Tracking state lives inside the handle instead of
//! a process-wide global, so a handle that did not start the container itself
//! re-acquires it through [`ServiceHandle::find`].

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::runtime::{ContainerHandle, ContainerRuntime, PortMapping};
use crate::types::ServiceState;
use crate::utils::normalize_image;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Container currently tracked by the handle
struct Tracked {
    container: Option<ContainerHandle>,
    state: ServiceState,
}

/// Start/stop/restart control over the parsing service container
pub struct ServiceHandle {
    runtime: Arc<dyn ContainerRuntime>,
    image: String,
    ports: PortMapping,
    settle_interval: Duration,
    auto_remove: bool,
    tracked: Mutex<Tracked>,
    /// Serializes restarts so concurrent pollers cannot interleave them
    restart_lock: Mutex<()>,
    restarts: AtomicU32,
}

impl ServiceHandle {
    /// Create a handle for `config.image` on the given runtime
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &ServiceConfig) -> Self {
        Self {
            runtime,
            image: config.image.clone(),
            ports: PortMapping::new(config.host_port, config.container_port),
            settle_interval: config.settle_interval,
            auto_remove: config.auto_remove,
            tracked: Mutex::new(Tracked {
                container: None,
                state: ServiceState::NotStarted,
            }),
            restart_lock: Mutex::new(()),
            restarts: AtomicU32::new(0),
        }
    }

    /// Image reference this handle manages
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ServiceState {
        self.tracked.lock().await.state
    }

    /// Number of restarts performed through this handle
    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Launch a new container and wait for the settle interval
    ///
    /// # Errors
    ///
    /// Propagates the runtime error if the image cannot be launched; no retry.
    pub async fn start(&self) -> Result<()> {
        let container = self.runtime.run(&self.image, self.ports, self.auto_remove).await?;
        info!(
            image = %self.image,
            container_id = %container.id,
            runtime = self.runtime.name(),
            "Launched parsing service container"
        );
        {
            let mut tracked = self.tracked.lock().await;
            tracked.container = Some(container);
            tracked.state = ServiceState::Running;
        }

        tokio::time::sleep(self.settle_interval).await;
        info!(image = %self.image, "Parsing service started");
        Ok(())
    }

    /// Stop the tracked container, or one found by image lookup
    ///
    /// Finding nothing to stop is not an error: the service is already down.
    /// When the runtime fails to stop the container it stays tracked, so a
    /// later `stop` targets it again.
    pub async fn stop(&self) -> Result<()> {
        info!(image = %self.image, "Stopping parsing service");
        let mut tracked = self.tracked.lock().await;

        let container = match tracked.container.clone() {
            Some(container) => container,
            None => match self.find(false).await {
                Ok(container) => container,
                Err(e) if e.is_container_not_found() => {
                    info!(image = %self.image, "Parsing service wasn't running");
                    return Ok(());
                }
                Err(e) => return Err(e),
            },
        };

        if let Err(e) = self.runtime.stop(&container).await {
            warn!(
                image = %self.image,
                container_id = %container.id,
                error = %e,
                "Failed to stop parsing service"
            );
            tracked.container = Some(container);
            return Err(e);
        }
        tracked.container = None;
        tracked.state = ServiceState::Stopped;
        info!(
            image = %self.image,
            container_id = %container.id,
            "Parsing service stopped"
        );
        Ok(())
    }

    /// Restart the tracked container in place, or one found by image lookup
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContainerNotFound`] when nothing is tracked and no running
    /// container matches the image; there is nothing sensible to recover to.
    pub async fn restart(&self) -> Result<()> {
        let _serialized = self.restart_lock.lock().await;
        info!(image = %self.image, "Restarting parsing service");

        let tracked_container = self.tracked.lock().await.container.clone();
        let container = match tracked_container {
            Some(container) => container,
            None => self.find(true).await?,
        };

        self.runtime.restart(&container).await?;
        {
            let mut tracked = self.tracked.lock().await;
            tracked.container = Some(container);
            tracked.state = ServiceState::Running;
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.settle_interval).await;
        info!(image = %self.image, "Parsing service restarted");
        Ok(())
    }

    /// Locate a running container created from this handle's image
    ///
    /// Image references are compared after normalizing an implicit `:latest` tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContainerNotFound`] if no running container matches; the
    /// error is logged unless `log_errors` is false (expected misses).
    pub async fn find(&self, log_errors: bool) -> Result<ContainerHandle> {
        let wanted = normalize_image(&self.image);
        let running = self.runtime.list_running().await?;
        debug!(image = %wanted, running = running.len(), "Looking up container");

        match running
            .into_iter()
            .find(|c| normalize_image(&c.image) == wanted)
        {
            Some(container) => Ok(container),
            None => {
                if log_errors {
                    error!(image = %self.image, "Couldn't find a running parsing service container");
                }
                Err(Error::ContainerNotFound {
                    image: self.image.clone(),
                })
            }
        }
    }
}
