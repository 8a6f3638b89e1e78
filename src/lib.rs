//! Runbox - compile and run untrusted Rust snippets in throwaway Docker containers.
//!
//! The core is [`Executor::execute`]: it provisions a [`Workspace`], starts one
//! sandbox container through a [`Launcher`], splits the container's combined log
//! back into compile and run channels with [`demux::parse`], and folds the exit
//! codes and any failure into an [`ExecutionResult`].

pub mod config;
pub mod demux;
pub mod error;
pub mod executor;
pub mod http_server;
pub mod launcher;
pub mod outcome;
pub mod protocol;
pub mod state;
pub mod workspace;

pub use config::{NetworkMode, SandboxArgs, SandboxConfig};
pub use demux::{Channels, ExitCodes, RunExit};
pub use error::{ConfigError, ErrorKind, ExecError};
pub use executor::Executor;
pub use launcher::{DockerLauncher, Launcher, RawSandboxOutput};
pub use outcome::ExecutionResult;
pub use state::AppState;
pub use workspace::Workspace;
