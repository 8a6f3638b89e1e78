//! Process-wide sandbox configuration.

use crate::error::ConfigError;
use clap::Args;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_IMAGE: &str = "rust-runner-sandbox:latest";
pub const DEFAULT_MEMORY: &str = "128m";
pub const DEFAULT_WORKDIR: &str = "/sandbox";
pub const DEFAULT_MAX_OUTPUT: &str = "4m";

/// Network attachment for sandbox containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// No interfaces besides loopback.
    None,
    Bridge,
}

impl NetworkMode {
    pub fn as_docker_mode(self) -> &'static str {
        match self {
            NetworkMode::None => "none",
            NetworkMode::Bridge => "bridge",
        }
    }

    pub fn is_disabled(self) -> bool {
        self == NetworkMode::None
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_docker_mode())
    }
}

impl FromStr for NetworkMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(NetworkMode::None),
            "bridge" => Ok(NetworkMode::Bridge),
            _ => Err(ConfigError::InvalidNetworkMode(s.to_string())),
        }
    }
}

/// Immutable settings shared by every execution request.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub image: String,
    pub memory_limit_bytes: i64,
    pub network_mode: NetworkMode,
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    /// Kill the container once `compile_timeout + run_timeout` has elapsed.
    pub enforce_timeouts: bool,
    /// Mount point of the workspace inside the container.
    pub workdir: String,
    /// Host directory that holds per-request workspaces.
    pub workspace_root: PathBuf,
    pub container_prefix: String,
    /// Host-side ceiling on the collected log; the container is killed past it.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            memory_limit_bytes: 128 * 1024 * 1024,
            network_mode: NetworkMode::None,
            compile_timeout: Duration::from_secs(15),
            run_timeout: Duration::from_secs(10),
            enforce_timeouts: true,
            workdir: DEFAULT_WORKDIR.to_string(),
            workspace_root: std::env::temp_dir(),
            container_prefix: "runbox".to_string(),
            max_output_bytes: 4 * 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Overall budget for one container, or `None` when timeouts are advisory only.
    pub fn wall_clock_limit(&self) -> Option<Duration> {
        self.enforce_timeouts
            .then(|| self.compile_timeout + self.run_timeout)
    }
}

/// Sandbox options shared by the `serve` and `run` subcommands.
#[derive(Args, Debug, Clone)]
pub struct SandboxArgs {
    /// Docker image providing rustc
    #[arg(long, env = "RUNBOX_IMAGE", default_value = DEFAULT_IMAGE)]
    pub image: String,

    /// Container memory ceiling, e.g. 128m or 1g
    #[arg(long, env = "RUNBOX_MEMORY", default_value = DEFAULT_MEMORY)]
    pub memory: String,

    /// Container network mode (none or bridge)
    #[arg(long, env = "RUNBOX_NETWORK", default_value = "none")]
    pub network: String,

    /// Compile budget in seconds
    #[arg(long, env = "RUNBOX_COMPILE_TIMEOUT", default_value = "15")]
    pub compile_timeout: u64,

    /// Run budget in seconds
    #[arg(long, env = "RUNBOX_RUN_TIMEOUT", default_value = "10")]
    pub run_timeout: u64,

    /// Treat the timeouts as advisory and never kill the container
    #[arg(long, env = "RUNBOX_NO_ENFORCE_TIMEOUTS")]
    pub no_enforce_timeouts: bool,

    /// Workspace mount point inside the container
    #[arg(long, env = "RUNBOX_WORKDIR", default_value = DEFAULT_WORKDIR)]
    pub workdir: String,

    /// Host directory for per-request workspaces (defaults to the system temp dir)
    #[arg(long, env = "RUNBOX_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Most log output kept per execution, e.g. 4m
    #[arg(long, env = "RUNBOX_MAX_OUTPUT", default_value = DEFAULT_MAX_OUTPUT)]
    pub max_output: String,
}

impl TryFrom<SandboxArgs> for SandboxConfig {
    type Error = ConfigError;

    fn try_from(args: SandboxArgs) -> Result<Self, Self::Error> {
        if !args.workdir.starts_with('/') {
            return Err(ConfigError::RelativeWorkdir(args.workdir));
        }
        Ok(SandboxConfig {
            image: args.image,
            memory_limit_bytes: parse_size(&args.memory)?,
            network_mode: args.network.parse()?,
            compile_timeout: Duration::from_secs(args.compile_timeout),
            run_timeout: Duration::from_secs(args.run_timeout),
            enforce_timeouts: !args.no_enforce_timeouts,
            workdir: args.workdir,
            workspace_root: args.workspace_root.unwrap_or_else(std::env::temp_dir),
            max_output_bytes: usize::try_from(parse_size(&args.max_output)?)
                .map_err(|_| ConfigError::InvalidSize(args.max_output.clone()))?,
            ..SandboxConfig::default()
        })
    }
}

/// Parse a Docker-style size (`512`, `64k`, `128m`, `1g`) into bytes.
pub fn parse_size(s: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidSize(s.to_string());
    let trimmed = s.trim().to_ascii_lowercase();
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('b') => (&trimmed[..trimmed.len() - 1], 1),
        Some('k') => (&trimmed[..trimmed.len() - 1], 1024),
        Some('m') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('g') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        Some(c) if c.is_ascii_digit() => (trimmed.as_str(), 1),
        _ => return Err(invalid()),
    };
    let value: i64 = digits.parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Err(invalid());
    }
    value.checked_mul(multiplier).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SandboxArgs {
        SandboxArgs {
            image: DEFAULT_IMAGE.to_string(),
            memory: DEFAULT_MEMORY.to_string(),
            network: "none".to_string(),
            compile_timeout: 15,
            run_timeout: 10,
            no_enforce_timeouts: false,
            workdir: DEFAULT_WORKDIR.to_string(),
            workspace_root: None,
            max_output: DEFAULT_MAX_OUTPUT.to_string(),
        }
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("128m"), Ok(128 * 1024 * 1024));
        assert_eq!(parse_size("1G"), Ok(1024 * 1024 * 1024));
        assert_eq!(parse_size("64k"), Ok(64 * 1024));
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("10b"), Ok(10));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        for bad in ["", "m", "-5m", "0", "12x", "lots"] {
            assert!(parse_size(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_network_mode_parse() {
        assert_eq!("none".parse::<NetworkMode>(), Ok(NetworkMode::None));
        assert_eq!("Bridge".parse::<NetworkMode>(), Ok(NetworkMode::Bridge));
        assert!("host".parse::<NetworkMode>().is_err());
        assert!(NetworkMode::None.is_disabled());
    }

    #[test]
    fn test_config_from_args_matches_defaults() {
        let config = SandboxConfig::try_from(args()).unwrap();
        let defaults = SandboxConfig::default();
        assert_eq!(config.image, defaults.image);
        assert_eq!(config.memory_limit_bytes, defaults.memory_limit_bytes);
        assert_eq!(config.network_mode, NetworkMode::None);
        assert_eq!(config.wall_clock_limit(), Some(Duration::from_secs(25)));
        assert_eq!(config.max_output_bytes, defaults.max_output_bytes);
    }

    #[test]
    fn test_max_output_from_args() {
        let mut a = args();
        a.max_output = "64k".to_string();
        assert_eq!(SandboxConfig::try_from(a).unwrap().max_output_bytes, 64 * 1024);

        let mut a = args();
        a.max_output = "plenty".to_string();
        assert_eq!(
            SandboxConfig::try_from(a).unwrap_err(),
            ConfigError::InvalidSize("plenty".to_string())
        );
    }

    #[test]
    fn test_advisory_timeouts() {
        let mut a = args();
        a.no_enforce_timeouts = true;
        let config = SandboxConfig::try_from(a).unwrap();
        assert_eq!(config.wall_clock_limit(), None);
    }

    #[test]
    fn test_relative_workdir_rejected() {
        let mut a = args();
        a.workdir = "sandbox".to_string();
        assert_eq!(
            SandboxConfig::try_from(a).unwrap_err(),
            ConfigError::RelativeWorkdir("sandbox".to_string())
        );
    }
}
