//! Container runtime access
//!
//! The backing parsing service runs in a container. This module provides a
//! trait-based seam over the runtime so the service lifecycle can be driven by
//! the real `docker` CLI in production and by in-memory fakes in tests.
//!
//! ## Architecture
//!
//! - [`ContainerRuntime`]: run/list/stop/restart on named containers
//! - [`DockerCliRuntime`]: implementation that shells out to the `docker` binary
//!
//! ## Usage
//!
//! ```no_run
//! use parsr_batch::runtime::{ContainerRuntime, DockerCliRuntime, PortMapping};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = DockerCliRuntime::from_path().expect("docker binary not found");
//!     let handle = runtime
//!         .run("axarev/parsr", PortMapping::new(3001, 3001), true)
//!         .await?;
//!     println!("started {}", handle.id);
//!     runtime.stop(&handle).await?;
//!     Ok(())
//! }
//! ```

mod docker;
mod traits;

pub use docker::DockerCliRuntime;
pub use traits::{ContainerHandle, ContainerRuntime, PortMapping};
