//! Container runtime control for the edge node
//!
//! Handles:
//! - Reachability check of the container runtime (fatal at startup)
//! - Volume and image preparation
//! - Running state queries, start and stop
//!
//! The Docker CLI is driven through child processes with a timeout; the
//! engine only ever sees the [`ContainerRuntime`] trait.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, error, info, warn};

use crate::config::ContainerConfig;

/// Container state as reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Stopped,
    Running,
}

impl ContainerStatus {
    pub fn from_running(running: bool) -> Self {
        if running {
            ContainerStatus::Running
        } else {
            ContainerStatus::Stopped
        }
    }

    pub fn is_running(self) -> bool {
        self == ContainerStatus::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Running => "running",
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container runtime unreachable: {0}")]
    Unreachable(String),
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("`{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare volume directory: {0}")]
    Volume(#[source] io::Error),
}

/// Control surface of the container runtime
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// Probe that the runtime service is installed and answering
    async fn check(&mut self) -> Result<(), RuntimeError>;
    async fn initialize(&mut self) -> Result<(), RuntimeError>;
    async fn is_running(&mut self) -> Result<bool, RuntimeError>;
    async fn start(&mut self) -> Result<(), RuntimeError>;
    async fn stop(&mut self) -> Result<(), RuntimeError>;
}

/// Docker CLI backed runtime
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
    container: String,
    image: String,
    volume_dir: PathBuf,
    mount_point: String,
    env_file: Option<PathBuf>,
    timeout: Duration,
    pull_timeout: Duration,
}

impl DockerRuntime {
    pub fn from_config(config: &ContainerConfig) -> Self {
        Self {
            binary: "docker".to_string(),
            container: config.name.clone(),
            image: config.image.clone(),
            volume_dir: config.volume_dir.clone(),
            mount_point: config.mount_point.clone(),
            env_file: config.env_file.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
        }
    }

    #[cfg(test)]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Arguments of the `docker run` invocation launching the node
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            self.container.clone(),
            "-v".to_string(),
            format!("{}:{}", self.volume_dir.display(), self.mount_point),
        ];
        if let Some(env_file) = &self.env_file {
            args.push("--env-file".to_string());
            args.push(env_file.display().to_string());
        }
        args.push(self.image.clone());
        args
    }

    async fn docker<S: AsRef<str>>(&self, args: &[S], timeout: Duration) -> Result<String, RuntimeError> {
        let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!("Executing: {} (timeout: {}s)", command, timeout.as_secs());

        let output = tokio::time::timeout(
            timeout,
            AsyncCommand::new(&self.binary)
                .args(&args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| RuntimeError::Timeout {
            command: command.clone(),
            timeout_secs: timeout.as_secs(),
        })?
        .map_err(|source| RuntimeError::Spawn {
            command: command.clone(),
            source,
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(RuntimeError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn check(&mut self) -> Result<(), RuntimeError> {
        let version = self
            .docker(&["version", "--format", "{{.Server.Version}}"], self.timeout)
            .await
            .map_err(|e| RuntimeError::Unreachable(e.to_string()))?;
        info!("Docker engine {} is reachable", version);
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), RuntimeError> {
        tokio::fs::create_dir_all(&self.volume_dir)
            .await
            .map_err(RuntimeError::Volume)?;
        info!("Using volume directory: {}", self.volume_dir.display());

        match self.docker(&["image", "inspect", self.image.as_str()], self.timeout).await {
            Ok(_) => debug!("Image {} already present", self.image),
            Err(RuntimeError::CommandFailed { .. }) => {
                info!("Pulling image {} ...", self.image);
                self.docker(&["pull", self.image.as_str()], self.pull_timeout).await?;
                info!("Image {} pulled", self.image);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn is_running(&mut self) -> Result<bool, RuntimeError> {
        match self
            .docker(&["inspect", "--format", "{{.State.Running}}", self.container.as_str()], self.timeout)
            .await
        {
            Ok(state) => Ok(state == "true"),
            Err(RuntimeError::CommandFailed { ref stderr, .. }) if is_missing_container(stderr) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn start(&mut self) -> Result<(), RuntimeError> {
        let args = self.run_args();
        let id = self.docker(&args, self.timeout).await?;
        info!("Container {} started ({})", self.container, id);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RuntimeError> {
        self.docker(&["stop", self.container.as_str()], self.timeout).await?;
        info!("Container {} stopped", self.container);
        Ok(())
    }
}

/// `docker inspect` output for a container that does not exist
fn is_missing_container(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such object") || stderr.contains("no such container")
}

/// Last observed container status plus the commands that change it.
///
/// Status is never assumed after a command: it is always re-queried.
#[derive(Debug)]
pub struct ContainerLifecycle<R> {
    runtime: R,
    last_status: Option<ContainerStatus>,
}

impl<R: ContainerRuntime> ContainerLifecycle<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            last_status: None,
        }
    }

    pub fn last_status(&self) -> Option<ContainerStatus> {
        self.last_status
    }

    #[cfg(test)]
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub async fn query(&mut self) -> Result<ContainerStatus, RuntimeError> {
        let status = ContainerStatus::from_running(self.runtime.is_running().await?);
        match (self.last_status, status) {
            (Some(ContainerStatus::Running), ContainerStatus::Stopped) => {
                warn!("Edge Node container is no longer running")
            }
            (Some(ContainerStatus::Stopped), ContainerStatus::Running) => {
                info!("Edge Node container is running")
            }
            _ => {}
        }
        self.last_status = Some(status);
        Ok(status)
    }

    /// Stop a running container, start a stopped one
    pub async fn toggle(&mut self) -> Result<ContainerStatus, RuntimeError> {
        match self.query().await? {
            ContainerStatus::Running => {
                info!("Edge Node is running, user requested stopping the container...");
                self.stop().await
            }
            ContainerStatus::Stopped => self.start().await,
        }
    }

    pub async fn start(&mut self) -> Result<ContainerStatus, RuntimeError> {
        info!("Launching Edge Node container...");
        let outcome = self.runtime.start().await;
        self.settle(outcome).await
    }

    pub async fn stop(&mut self) -> Result<ContainerStatus, RuntimeError> {
        info!("Stopping Edge Node container...");
        let outcome = self.runtime.stop().await;
        self.settle(outcome).await
    }

    async fn settle(&mut self, outcome: Result<(), RuntimeError>) -> Result<ContainerStatus, RuntimeError> {
        if let Err(e) = &outcome {
            error!("Container command failed: {}", e);
        }
        let status = self.query().await;
        outcome?;
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRuntime;

    #[tokio::test]
    async fn test_toggle_stops_running_container() {
        let runtime = MockRuntime::new(true);
        let calls = runtime.calls.clone();
        let mut lifecycle = ContainerLifecycle::new(runtime);

        let status = lifecycle.toggle().await.unwrap();
        assert_eq!(status, ContainerStatus::Stopped);
        assert_eq!(calls.calls(), vec!["is_running", "stop", "is_running"]);
    }

    #[tokio::test]
    async fn test_toggle_starts_stopped_container() {
        let runtime = MockRuntime::new(false);
        let calls = runtime.calls.clone();
        let mut lifecycle = ContainerLifecycle::new(runtime);

        let status = lifecycle.toggle().await.unwrap();
        assert_eq!(status, ContainerStatus::Running);
        assert_eq!(calls.count("start"), 1);
        assert_eq!(lifecycle.last_status(), Some(ContainerStatus::Running));
    }

    #[tokio::test]
    async fn test_failed_start_requeries_status() {
        let mut runtime = MockRuntime::new(false);
        runtime.fail_commands = true;
        let calls = runtime.calls.clone();
        let mut lifecycle = ContainerLifecycle::new(runtime);

        let result = lifecycle.toggle().await;
        assert!(matches!(result, Err(RuntimeError::CommandFailed { .. })));
        assert_eq!(calls.count("is_running"), 2);
        assert_eq!(lifecycle.last_status(), Some(ContainerStatus::Stopped));
    }

    #[tokio::test]
    async fn test_query_tracks_last_status() {
        let mut lifecycle = ContainerLifecycle::new(MockRuntime::new(true));
        assert_eq!(lifecycle.last_status(), None);

        lifecycle.query().await.unwrap();
        assert_eq!(lifecycle.last_status(), Some(ContainerStatus::Running));

        lifecycle.runtime_mut().running = false;
        assert_eq!(lifecycle.query().await.unwrap(), ContainerStatus::Stopped);
    }

    #[test]
    fn test_run_args() {
        let config = ContainerConfig {
            volume_dir: PathBuf::from("/srv/edge"),
            env_file: Some(PathBuf::from("/srv/edge/.env")),
            ..ContainerConfig::default()
        };
        let args = DockerRuntime::from_config(&config).run_args();

        assert_eq!(&args[..5], &["run", "-d", "--rm", "--name", "edge_node_container"]);
        assert!(args.contains(&"/srv/edge:/edge_node/_local_cache/_data".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--env-file" && w[1] == "/srv/edge/.env"));
        assert_eq!(args.last().unwrap(), "naeural/edge_node:latest");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unreachable() {
        let mut runtime = DockerRuntime::from_config(&ContainerConfig::default())
            .with_binary("edge-node-launcher-no-such-docker");

        assert!(matches!(runtime.check().await, Err(RuntimeError::Unreachable(_))));
        assert!(matches!(runtime.is_running().await, Err(RuntimeError::Spawn { .. })));
    }

    #[test]
    fn test_missing_container_detection() {
        assert!(is_missing_container("Error: No such object: edge_node_container"));
        assert!(is_missing_container("Error response from daemon: No such container: edge_node_container"));
        assert!(!is_missing_container(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_runtime_is_not_reported_stopped() {
        let mut runtime = DockerRuntime::from_config(&ContainerConfig::default()).with_binary("false");
        assert!(matches!(runtime.is_running().await, Err(RuntimeError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_absent_container_is_stopped() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = edge_node_devkit::VolumeFixture::new().unwrap();
        let script = fixture.path().join("docker");
        std::fs::write(&script, "#!/bin/sh\necho \"Error: No such object: $4\" >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut runtime = DockerRuntime::from_config(&ContainerConfig::default())
            .with_binary(script.display().to_string());
        assert!(!runtime.is_running().await.unwrap());
    }
}
