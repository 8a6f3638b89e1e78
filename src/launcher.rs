//! Starting the sandbox container and collecting its combined log.

use crate::config::SandboxConfig;
use crate::error::ExecError;
use crate::protocol;
use crate::workspace::Workspace;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything the container wrote to stdout and stderr, in arrival order.
pub type RawSandboxOutput = String;

pub const WORKSPACE_LABEL: &str = "runbox.workspace";

/// Runs the protocol script against a prepared workspace.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(
        &self,
        workspace: &Workspace,
        config: &SandboxConfig,
    ) -> Result<RawSandboxOutput, ExecError>;
}

/// Launcher backed by the local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    docker: Docker,
}

impl DockerLauncher {
    /// Use the daemon from `DOCKER_HOST` or the default local socket.
    ///
    /// No request is made here; an unreachable daemon shows up on the first launch.
    pub fn connect() -> Result<Self, ExecError> {
        Docker::connect_with_local_defaults()
            .map(Self::with_client)
            .map_err(|e| ExecError::PlatformUnavailable(e.to_string()))
    }

    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    async fn ensure_image(&self, image: &str) -> Result<(), ExecError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(()),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                warn!(image, "Sandbox image missing");
                Err(ExecError::SandboxImageNotFound(image.to_string()))
            }
            Err(e) => Err(ExecError::PlatformUnavailable(e.to_string())),
        }
    }

    async fn run_to_completion(
        &self,
        id: &str,
        config: &SandboxConfig,
    ) -> Result<RawSandboxOutput, ExecError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| classify(e, &config.image))?;

        let started = Instant::now();
        let mut output = Vec::new();
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let collected = collect_within(
            self.docker.logs(id, Some(options)),
            &mut output,
            config.max_output_bytes,
            config.wall_clock_limit(),
        )
        .await;

        let finish = match collected {
            Ok(()) => match wait_exit(&self.docker, id).await {
                Ok(status) => Finish::Exited(status),
                Err(e) => Finish::WaitFailed(e.to_string()),
            },
            Err(early) => {
                warn!(container = id, reason = ?early, "Stopping container early");
                self.kill(id).await;
                early
            }
        };
        debug!(
            container = id,
            finish = ?finish,
            bytes = output.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Container finished"
        );
        conclude(finish, &output)
    }

    async fn kill(&self, id: &str) {
        if let Err(e) = self
            .docker
            .kill_container(id, None::<KillContainerOptions<String>>)
            .await
        {
            warn!(container = id, error = %e, "Kill failed");
        }
    }
}

#[async_trait]
impl Launcher for DockerLauncher {
    async fn launch(
        &self,
        workspace: &Workspace,
        config: &SandboxConfig,
    ) -> Result<RawSandboxOutput, ExecError> {
        self.ensure_image(&config.image).await?;

        let name = format!("{}-{}", config.container_prefix, workspace.id());
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                container_spec(workspace, config),
            )
            .await
            .map_err(|e| classify(e, &config.image))?;
        info!(container = %name, image = %config.image, "Container created");

        let guard = ContainerGuard::new(self.docker.clone(), created.id.clone());
        let result = self.run_to_completion(&created.id, config).await;
        guard.remove().await;
        result
    }
}

/// Container definition for one workspace.
pub fn container_spec(workspace: &Workspace, config: &SandboxConfig) -> Config<String> {
    spec_for_path(workspace.id(), workspace.host_path(), config)
}

fn spec_for_path(id: &str, host_path: &Path, config: &SandboxConfig) -> Config<String> {
    Config {
        image: Some(config.image.clone()),
        cmd: Some(protocol::command()),
        working_dir: Some(config.workdir.clone()),
        network_disabled: Some(config.network_mode.is_disabled()),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        labels: Some(HashMap::from([(WORKSPACE_LABEL.to_string(), id.to_string())])),
        host_config: Some(HostConfig {
            binds: Some(vec![format!(
                "{}:{}:rw",
                host_path.display(),
                config.workdir
            )]),
            network_mode: Some(config.network_mode.as_docker_mode().to_string()),
            memory: Some(config.memory_limit_bytes),
            // Removed explicitly once the logs are read.
            auto_remove: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn classify(err: DockerError, image: &str) -> ExecError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } if message.contains("image") => ExecError::SandboxImageNotFound(image.to_string()),
        DockerError::DockerResponseServerError { message, .. } => {
            ExecError::launch(message, String::new())
        }
        other => ExecError::PlatformUnavailable(other.to_string()),
    }
}

/// How a container run ended, as seen from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Finish {
    /// The log stream closed and the container reported this status.
    Exited(i64),
    WaitFailed(String),
    StreamFailed(String),
    TimedOut(Duration),
    OutputCapped(usize),
}

/// Drain log frames into `output`, stopping early on a stream error, once
/// `cap` bytes are held, or when `limit` elapses.
async fn collect_within<S>(
    frames: S,
    output: &mut Vec<u8>,
    cap: usize,
    limit: Option<Duration>,
) -> Result<(), Finish>
where
    S: Stream<Item = Result<LogOutput, DockerError>>,
{
    let collecting = collect_frames(frames, output, cap);
    match limit {
        Some(limit) => tokio::time::timeout(limit, collecting)
            .await
            .unwrap_or(Err(Finish::TimedOut(limit))),
        None => collecting.await,
    }
}

// Frames are kept as bytes; Docker splits long lines without regard for
// character boundaries.
async fn collect_frames<S>(frames: S, output: &mut Vec<u8>, cap: usize) -> Result<(), Finish>
where
    S: Stream<Item = Result<LogOutput, DockerError>>,
{
    futures_util::pin_mut!(frames);
    while let Some(frame) = frames.next().await {
        let message = match frame.map_err(|e| Finish::StreamFailed(e.to_string()))? {
            LogOutput::StdOut { message }
            | LogOutput::StdErr { message }
            | LogOutput::Console { message }
            | LogOutput::StdIn { message } => message,
        };
        let room = cap.saturating_sub(output.len());
        if message.len() > room {
            output.extend_from_slice(&message[..room]);
            return Err(Finish::OutputCapped(cap));
        }
        output.extend_from_slice(&message);
    }
    Ok(())
}

/// Map how the run ended onto the launcher result. The script always exits 0
/// after printing its marker, so any other status means the container was
/// killed from outside (137 for the OOM killer).
fn conclude(finish: Finish, output: &[u8]) -> Result<RawSandboxOutput, ExecError> {
    let output = String::from_utf8_lossy(output).into_owned();
    match finish {
        Finish::Exited(0) => Ok(output),
        Finish::Exited(status) => Err(ExecError::launch(
            format!("container exited with status {status}"),
            output,
        )),
        Finish::WaitFailed(e) => Err(ExecError::launch(e, output)),
        Finish::StreamFailed(e) => Err(ExecError::launch(format!("log stream failed: {e}"), output)),
        Finish::TimedOut(limit) => Err(ExecError::TimedOut {
            limit,
            partial_output: output,
        }),
        Finish::OutputCapped(cap) => Err(ExecError::launch(
            format!("output exceeded {cap} bytes"),
            output,
        )),
    }
}

async fn wait_exit(docker: &Docker, id: &str) -> Result<i64, DockerError> {
    let options = WaitContainerOptions {
        condition: "not-running",
    };
    let mut stream = docker.wait_container(id, Some(options));
    match stream.next().await {
        Some(Ok(response)) => Ok(response.status_code),
        // Non-zero exits arrive as an error from the wait endpoint.
        Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
        Some(Err(e)) => Err(e),
        None => Ok(0),
    }
}

/// Force-removes its container when dropped without an explicit [`remove`](Self::remove),
/// so a cancelled request never leaves a container behind.
struct ContainerGuard {
    docker: Docker,
    id: Option<String>,
}

impl ContainerGuard {
    fn new(docker: Docker, id: String) -> Self {
        Self {
            docker,
            id: Some(id),
        }
    }

    async fn remove(mut self) {
        if let Some(id) = self.id.take() {
            remove_container(&self.docker, &id).await;
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        warn!(container = %id, "Execution abandoned, scheduling container removal");
        let docker = self.docker.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { remove_container(&docker, &id).await });
        }
    }
}

async fn remove_container(docker: &Docker, id: &str) {
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };
    match docker.remove_container(id, Some(options)).await {
        Ok(()) => debug!(container = id, "Container removed"),
        Err(e) => warn!(container = id, error = %e, "Container removal failed"),
    }
}
