//! Container runtime backed by the external `docker` binary

use super::traits::{ContainerHandle, ContainerRuntime, PortMapping};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;

/// Format string for `docker ps`: one `<id>\t<image>` line per container
const PS_FORMAT: &str = "{{.ID}}\t{{.Image}}";

/// CLI-based runtime using the external docker binary
///
/// # Examples
///
/// ```no_run
/// use parsr_batch::runtime::{ContainerRuntime, DockerCliRuntime};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit path
/// let runtime = DockerCliRuntime::new(PathBuf::from("/usr/bin/docker"));
///
/// // Or auto-discover from PATH
/// let runtime = DockerCliRuntime::from_path().expect("docker not found in PATH");
///
/// for container in runtime.list_running().await? {
///     println!("{} {}", container.id, container.image);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DockerCliRuntime {
    binary_path: PathBuf,
}

impl DockerCliRuntime {
    /// Create a new runtime with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find docker in PATH
    ///
    /// Returns `None` when no `docker` binary is on the search path.
    pub fn from_path() -> Option<Self> {
        which::which("docker").ok().map(Self::new)
    }

    async fn exec(&self, operation: &str, args: &[&str]) -> crate::Result<Output> {
        tracing::debug!(binary = %self.binary_path.display(), ?args, "Running docker");
        let output = Command::new(&self.binary_path)
            .args(args)
            .output()
            .await
            .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute docker: {}", e)))?;

        if !output.status.success() {
            return Err(crate::Error::ContainerRuntime {
                operation: operation.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn run(
        &self,
        image: &str,
        ports: PortMapping,
        auto_remove: bool,
    ) -> crate::Result<ContainerHandle> {
        let publish = format!("{}:{}", ports.host, ports.container);
        let mut args = vec!["run", "--detach"];
        if auto_remove {
            args.push("--rm");
        }
        args.extend(["--publish", publish.as_str(), image]);

        let output = self.exec("run", &args).await?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(crate::Error::ContainerRuntime {
                operation: "run".to_string(),
                message: "docker run returned no container id".to_string(),
            });
        }

        Ok(ContainerHandle {
            id,
            image: image.to_string(),
        })
    }

    async fn list_running(&self) -> crate::Result<Vec<ContainerHandle>> {
        let output = self
            .exec("list", &["ps", "--no-trunc", "--format", PS_FORMAT])
            .await?;
        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn stop(&self, container: &ContainerHandle) -> crate::Result<()> {
        self.exec("stop", &["stop", container.id.as_str()]).await?;
        Ok(())
    }

    async fn restart(&self, container: &ContainerHandle) -> crate::Result<()> {
        self.exec("restart", &["restart", container.id.as_str()])
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "docker-cli"
    }
}

/// Parse `docker ps --format '{{.ID}}\t{{.Image}}'` output
fn parse_ps_output(stdout: &str) -> Vec<ContainerHandle> {
    stdout
        .lines()
        .filter_map(|line| {
            let (id, image) = line.trim().split_once('\t')?;
            if id.is_empty() || image.is_empty() {
                return None;
            }
            Some(ContainerHandle {
                id: id.to_string(),
                image: image.trim().to_string(),
            })
        })
        .collect()
}
