//! Traits and types for container runtime access

use async_trait::async_trait;

/// A running (or recently running) container instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Runtime-assigned container identifier
    pub id: String,
    /// Image reference the container was created from
    pub image: String,
}

/// Host-to-container port publication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port published on the host
    pub host: u16,
    /// Port the service listens on inside the container
    pub container: u16,
}

impl PortMapping {
    /// Create a new mapping
    pub fn new(host: u16, container: u16) -> Self {
        Self { host, container }
    }
}

/// Trait for driving a container runtime
///
/// Implementations only need the handful of operations the service lifecycle
/// uses. Image matching is left to the caller; [`list_running`](Self::list_running)
/// reports every running container.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Launch a detached container from `image` with the given port published
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be executed or refuses to launch
    /// the image (missing image, port already allocated, ...).
    async fn run(
        &self,
        image: &str,
        ports: PortMapping,
        auto_remove: bool,
    ) -> crate::Result<ContainerHandle>;

    /// List all running containers
    async fn list_running(&self) -> crate::Result<Vec<ContainerHandle>>;

    /// Stop a container
    async fn stop(&self, container: &ContainerHandle) -> crate::Result<()>;

    /// Restart a container in place
    async fn restart(&self, container: &ContainerHandle) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
