//! Turns demultiplexed output and launch failures into the externally visible result.

use crate::demux::{self, Channels, Demuxed, ExitCodes, RunExit};
use crate::error::{ErrorKind, ExecError};
use serde::Serialize;
use tracing::warn;

/// Outcome of one execution request.
///
/// Serializes to the five fields the HTTP layer returns; the classification and
/// exit codes stay internal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    #[serde(flatten)]
    pub channels: Channels,
    pub error: Option<String>,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
    #[serde(skip)]
    pub exit_codes: Option<ExitCodes>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn compile_stdout(&self) -> &str {
        &self.channels.compile_stdout
    }

    pub fn compile_stderr(&self) -> &str {
        &self.channels.compile_stderr
    }

    pub fn run_stdout(&self) -> &str {
        &self.channels.run_stdout
    }

    pub fn run_stderr(&self) -> &str {
        &self.channels.run_stderr
    }

    fn failed(channels: Channels, kind: ErrorKind, message: String) -> Self {
        Self {
            channels,
            error: Some(message),
            kind: Some(kind),
            exit_codes: None,
        }
    }

    /// Result for an execution that never produced a complete log.
    ///
    /// Any partial log is still demultiplexed so the caller sees what was printed.
    pub fn from_launch_failure(err: ExecError) -> Self {
        let channels = err
            .partial_output()
            .map(|raw| demux::parse(raw).channels)
            .unwrap_or_default();
        Self::failed(channels, err.kind(), err.to_string())
    }
}

/// Apply the exit-code decision table to a parsed log.
pub fn synthesize(parsed: Demuxed) -> ExecutionResult {
    let Demuxed {
        mut channels,
        exit_codes,
    } = parsed;

    let codes = match exit_codes {
        Ok(codes) => codes,
        Err(reason) => {
            return ExecutionResult::failed(
                channels,
                ErrorKind::UnknownOutcome,
                format!("Failed to parse exit codes from sandbox output: {reason}"),
            )
        }
    };

    let classified = match (codes.compile, codes.run) {
        (0, RunExit::Code(0)) => None,
        (0, RunExit::Code(code)) => Some((
            ErrorKind::ExecutionFailed,
            format!("Execution failed with exit code {code}"),
        )),
        (compile, RunExit::NotAttempted) if compile != 0 => Some((
            ErrorKind::CompilationFailed,
            format!("Compilation failed with exit code {compile}"),
        )),
        (compile, run) => Some((
            ErrorKind::InternalInconsistency,
            format!("Inconsistent exit codes from sandbox: compile={compile} run={run}"),
        )),
    };

    // Nothing ran, so anything in the run channels came from marker text
    // quoted elsewhere in the log.
    if codes.run == RunExit::NotAttempted && !channels.run_is_empty() {
        warn!("Discarding run output for a program that never ran");
        channels.run_stdout.clear();
        channels.run_stderr.clear();
    }

    let (kind, error) = classified.unzip();
    ExecutionResult {
        channels,
        error,
        kind,
        exit_codes: Some(codes),
    }
}
