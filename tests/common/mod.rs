//! Fake launchers that stand in for Docker.

#![allow(dead_code)]

use async_trait::async_trait;
use runbox::{ExecError, Executor, Launcher, RawSandboxOutput, SandboxConfig, Workspace};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Render a combined log the way the in-container script prints it.
///
/// `run` is `None` when compilation failed and the program never ran.
pub fn transcript(
    compile_stdout: &str,
    compile_stderr: &str,
    compile_exit: i32,
    run: Option<(&str, &str, i32)>,
) -> String {
    let mut out = format!(
        "---COMPILE_STDOUT_START---\n{compile_stdout}\n---COMPILE_STDOUT_END---\n\
         ---COMPILE_STDERR_START---\n{compile_stderr}\n---COMPILE_STDERR_END---\n"
    );
    let run_exit = match run {
        Some((stdout, stderr, code)) => {
            out.push_str(&format!(
                "---RUN_STDOUT_START---\n{stdout}\n---RUN_STDOUT_END---\n\
                 ---RUN_STDERR_START---\n{stderr}\n---RUN_STDERR_END---\n"
            ));
            code
        }
        None => -1,
    };
    out.push_str(&format!("---EXIT_CODE---{{{compile_exit}:{run_exit}}}\n"));
    out
}

/// Replays the same log for every launch.
pub struct FixedLauncher(pub String);

#[async_trait]
impl Launcher for FixedLauncher {
    async fn launch(
        &self,
        _workspace: &Workspace,
        _config: &SandboxConfig,
    ) -> Result<RawSandboxOutput, ExecError> {
        Ok(self.0.clone())
    }
}

/// Fails every launch with the error built by the closure.
pub struct FailingLauncher(pub Box<dyn Fn() -> ExecError + Send + Sync>);

#[async_trait]
impl Launcher for FailingLauncher {
    async fn launch(
        &self,
        _workspace: &Workspace,
        _config: &SandboxConfig,
    ) -> Result<RawSandboxOutput, ExecError> {
        Err((self.0)())
    }
}

/// "Runs" the submission by printing its source back, after a short pause so
/// concurrent launches overlap. Remembers every workspace it saw.
#[derive(Default)]
pub struct EchoLauncher {
    pub seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Launcher for EchoLauncher {
    async fn launch(
        &self,
        workspace: &Workspace,
        _config: &SandboxConfig,
    ) -> Result<RawSandboxOutput, ExecError> {
        self.seen
            .lock()
            .unwrap()
            .push(workspace.host_path().to_path_buf());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let entries = std::fs::read_dir(workspace.host_path())?.count();
        assert_eq!(entries, 1, "workspace should hold only the source file");
        let source = std::fs::read_to_string(workspace.source_path())?;
        Ok(transcript("", "", 0, Some((&source, "", 0))))
    }
}

/// Executor over `launcher` with workspaces under a fresh temp root.
pub fn executor(launcher: Arc<dyn Launcher>) -> (Executor, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let config = SandboxConfig {
        workspace_root: root.path().to_path_buf(),
        ..SandboxConfig::default()
    };
    (Executor::new(config, launcher), root)
}
