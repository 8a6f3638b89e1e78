//! Error taxonomy for the execution core.

use std::time::Duration;
use thiserror::Error;

/// Failures that stop an execution before exit codes can be interpreted.
///
/// The executor folds every one of these into an [`ExecutionResult`](crate::ExecutionResult);
/// none of them leave the core as a `Result::Err`.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The configured image is not present on the host. Not retried.
    #[error("Sandbox image '{0}' not found. Please build it first.")]
    SandboxImageNotFound(String),

    /// Docker daemon unreachable or refusing requests. Safe to retry later.
    #[error("Sandbox platform unavailable: {0}")]
    PlatformUnavailable(String),

    /// The container died or reported failure before the protocol finished.
    #[error("Container execution error: {message}")]
    SandboxLaunchError {
        message: String,
        partial_output: String,
    },

    /// The container outlived its wall-clock budget and was killed.
    #[error("Execution timed out after {}s", .limit.as_secs())]
    TimedOut {
        limit: Duration,
        partial_output: String,
    },

    /// Workspace creation, write or removal failed on the host.
    #[error("Workspace error: {0}")]
    InfrastructureError(#[from] std::io::Error),
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::SandboxImageNotFound(_) => ErrorKind::SandboxImageNotFound,
            ExecError::PlatformUnavailable(_) => ErrorKind::PlatformUnavailable,
            ExecError::SandboxLaunchError { .. } => ErrorKind::SandboxLaunchError,
            ExecError::TimedOut { .. } => ErrorKind::TimedOut,
            ExecError::InfrastructureError(_) => ErrorKind::InfrastructureError,
        }
    }

    /// Whatever the container printed before it failed, if anything.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            ExecError::SandboxLaunchError { partial_output, .. }
            | ExecError::TimedOut { partial_output, .. } => Some(partial_output),
            _ => None,
        }
    }

    pub(crate) fn launch(message: impl Into<String>, partial_output: impl Into<String>) -> Self {
        ExecError::SandboxLaunchError {
            message: message.into(),
            partial_output: partial_output.into(),
        }
    }
}

/// Classification attached to every [`ExecutionResult`](crate::ExecutionResult) that
/// carries an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SandboxImageNotFound,
    PlatformUnavailable,
    SandboxLaunchError,
    TimedOut,
    InfrastructureError,
    CompilationFailed,
    ExecutionFailed,
    UnknownOutcome,
    InternalInconsistency,
}

impl ErrorKind {
    /// True when the submitted program is at fault rather than the sandbox.
    pub fn is_user_error(self) -> bool {
        matches!(self, ErrorKind::CompilationFailed | ErrorKind::ExecutionFailed)
    }
}

/// Startup-time configuration problems.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid size '{0}' (expected <n>[b|k|m|g])")]
    InvalidSize(String),

    #[error("invalid network mode '{0}' (expected 'none' or 'bridge')")]
    InvalidNetworkMode(String),

    #[error("workdir must be an absolute path, got '{0}'")]
    RelativeWorkdir(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_not_found_message() {
        let err = ExecError::SandboxImageNotFound("rust-runner-sandbox:latest".into());
        assert_eq!(
            err.to_string(),
            "Sandbox image 'rust-runner-sandbox:latest' not found. Please build it first."
        );
        assert_eq!(err.kind(), ErrorKind::SandboxImageNotFound);
        assert!(err.partial_output().is_none());
    }

    #[test]
    fn test_timeout_keeps_partial_output() {
        let err = ExecError::TimedOut {
            limit: Duration::from_secs(25),
            partial_output: "---COMPILE_STDOUT_START---".into(),
        };
        assert_eq!(err.to_string(), "Execution timed out after 25s");
        assert_eq!(err.partial_output(), Some("---COMPILE_STDOUT_START---"));
    }

    #[test]
    fn test_user_error_kinds() {
        assert!(ErrorKind::CompilationFailed.is_user_error());
        assert!(ErrorKind::ExecutionFailed.is_user_error());
        assert!(!ErrorKind::UnknownOutcome.is_user_error());
        assert!(!ErrorKind::PlatformUnavailable.is_user_error());
    }
}
