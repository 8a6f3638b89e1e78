//! Entry point of the core: one source string in, one [`ExecutionResult`] out.

use crate::config::SandboxConfig;
use crate::demux;
use crate::error::{ErrorKind, ExecError};
use crate::launcher::{DockerLauncher, Launcher, RawSandboxOutput};
use crate::outcome::{self, ExecutionResult};
use crate::workspace::Workspace;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Compiles and runs submissions in throwaway sandboxes.
///
/// Cheap to clone; every clone shares the same configuration and launcher.
/// Requests share no mutable state, so any number may run concurrently.
#[derive(Clone)]
pub struct Executor {
    config: Arc<SandboxConfig>,
    launcher: Arc<dyn Launcher>,
}

impl Executor {
    pub fn new(config: SandboxConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config: Arc::new(config),
            launcher,
        }
    }

    /// Executor talking to the local Docker daemon.
    pub fn docker(config: SandboxConfig) -> Result<Self, ExecError> {
        Ok(Self::new(config, Arc::new(DockerLauncher::connect()?)))
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Compile and run `source`. Never fails; every problem is reported in the result.
    pub async fn execute(&self, source: &str) -> ExecutionResult {
        let request = uuid::Uuid::new_v4();
        let span = tracing::info_span!("execute", %request);
        async {
            let started = Instant::now();
            info!(source_bytes = source.len(), "Execution started");

            let result = match self.launch(source).await {
                Ok(raw) => outcome::synthesize(demux::parse(&raw)),
                Err(e) => {
                    warn!(kind = ?e.kind(), error = %e, "Execution did not complete");
                    ExecutionResult::from_launch_failure(e)
                }
            };

            info!(
                kind = ?result.kind,
                user_error = result.kind.is_some_and(ErrorKind::is_user_error),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Execution finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn launch(&self, source: &str) -> Result<RawSandboxOutput, ExecError> {
        let workspace = Workspace::acquire(&self.config.workspace_root)?;
        workspace.write_source(source)?;
        let raw = self.launcher.launch(&workspace, &self.config).await;
        let path = workspace.host_path().to_path_buf();
        // A leftover directory does not change the outcome.
        if let Err(e) = workspace.close() {
            warn!(workspace = %path.display(), error = %e, "Workspace cleanup failed");
        }
        raw
    }
}
