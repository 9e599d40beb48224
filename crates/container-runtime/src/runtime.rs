//! Container runtime built on the Docker daemon API
//!
//! All lifecycle operations go through [`ContainerRuntime`]. Stop and remove
//! tolerate containers that are already gone, so teardown paths can run more
//! than once without special casing.

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
};
use bollard::errors::Error as ApiError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, PortMap};
use futures_util::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::spec::ContainerSpec;

/// Seconds the daemon waits for a container to exit before killing it on stop
const STOP_GRACE_SECONDS: i64 = 10;

/// Handle to a container created by [`ContainerRuntime::start_container`]
///
/// The handle is plain data; the runtime that created the container must be
/// used to operate on it.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    id: String,
    name: String,
}

impl ContainerHandle {
    /// Full container ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Container name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Abbreviated container ID for logs
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(12)]
    }
}

/// Captured result of an in-container command execution
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Exit code of the command; `None` when the exec was interrupted before
    /// an exit code could be observed
    pub exit_code: Option<i64>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecOutput {
    /// Returns true if the command ran to completion with exit code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns true if the exec finished without reporting an exit code
    pub fn interrupted(&self) -> bool {
        self.exit_code.is_none()
    }
}

/// Client for container lifecycle operations against the local Docker daemon
pub struct ContainerRuntime {
    docker: Docker,
}

impl ContainerRuntime {
    /// Connect to the local Docker daemon
    ///
    /// Connection setup is lazy; use [`ContainerRuntime::ping`] to verify the
    /// daemon is actually reachable.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            Error::DaemonNotAccessible {
                reason: e.to_string(),
            }
        })?;
        Ok(Self { docker })
    }

    /// Verify the daemon answers
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| Error::DaemonNotAccessible {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Check whether an image is present locally
    pub async fn image_present(&self, reference: &str) -> Result<bool> {
        match self.docker.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(ApiError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Pull an image from its registry
    pub async fn pull_image(&self, reference: &str) -> Result<()> {
        info!("Pulling image {}", reference);

        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };

        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(update) = progress.next().await {
            let update = update?;
            if let Some(status) = update.status {
                debug!("{}: {}", reference, status);
            }
        }

        Ok(())
    }

    /// Pull an image unless it is already present locally
    pub async fn ensure_image(&self, reference: &str) -> Result<()> {
        if self.image_present(reference).await? {
            debug!("Image {} already present", reference);
            return Ok(());
        }
        self.pull_image(reference).await
    }

    /// Create and start a container from a spec
    pub async fn start_container(&self, spec: ContainerSpec) -> Result<ContainerHandle> {
        let env: Vec<String> = spec
            .env()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut port_bindings = PortMap::new();
        for port in spec.exposed_tcp_ports() {
            let key = format!("{}/tcp", port);
            exposed_ports.insert(key.clone(), HashMap::new());
            // Empty host port asks the daemon for an ephemeral one
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(String::new()),
                }]),
            );
        }

        let config = Config {
            image: Some(spec.image().to_string()),
            cmd: spec.command().map(|cmd| cmd.to_vec()),
            env: Some(env),
            exposed_ports: Some(exposed_ports),
            labels: Some(spec.labels().clone()),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = spec.name().map(|name| CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        });

        let created = self.docker.create_container(options, config).await?;
        for warning in &created.warnings {
            warn!("Container create warning: {}", warning);
        }

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        let name = spec
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| created.id.clone());
        let handle = ContainerHandle {
            id: created.id,
            name,
        };
        info!(
            "Started container {} ({}) from {}",
            handle.name(),
            handle.short_id(),
            spec.image()
        );
        Ok(handle)
    }

    /// Resolve the host port the daemon mapped for a container TCP port
    pub async fn mapped_port(&self, id: &str, container_port: u16) -> Result<u16> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_not_found(e, id))?;

        let key = format!("{}/tcp", container_port);
        let host_port = inspect
            .network_settings
            .and_then(|settings| settings.ports)
            .and_then(|ports| ports.get(&key).cloned().flatten())
            .and_then(|bindings| bindings.into_iter().find_map(|b| b.host_port))
            .ok_or(Error::MissingPortBinding {
                port: container_port,
            })?;

        host_port.parse::<u16>().map_err(|_| {
            Error::operation_failed(format!(
                "daemon reported invalid host port '{}' for container port {}",
                host_port, container_port
            ))
        })
    }

    /// Upload a tar archive into the container filesystem at `dest_path`
    pub async fn upload_archive(&self, id: &str, dest_path: &str, archive: Vec<u8>) -> Result<()> {
        let options = UploadToContainerOptions {
            path: dest_path.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id, Some(options), archive.into())
            .await
            .map_err(|e| map_not_found(e, id))?;
        Ok(())
    }

    /// Execute a command inside the container, capturing output and exit code
    pub async fn exec(&self, id: &str, cmd: &[&str]) -> Result<ExecOutput> {
        debug!("Executing in container {}: {:?}", &id[..id.len().min(12)], cmd);

        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(cmd.iter().map(|s| s.to_string()).collect()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| map_not_found(e, id))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        match self.docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    match chunk? {
                        LogOutput::StdOut { message } => stdout.extend_from_slice(&message),
                        LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                        _ => {}
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        Ok(ExecOutput {
            exit_code: inspect.exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Fetch the last `lines` log lines of a container
    pub async fn logs_tail(&self, id: &str, lines: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: lines.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(log) => collected.push_str(&log.to_string()),
                Err(e) => {
                    debug!("Log stream for {} ended: {}", &id[..id.len().min(12)], e);
                    break;
                }
            }
        }
        Ok(collected)
    }

    /// Stop a container; already-stopped or missing containers are a no-op
    pub async fn stop_container(&self, id: &str) -> Result<()> {
        match self
            .docker
            .stop_container(id, Some(StopContainerOptions { t: STOP_GRACE_SECONDS }))
            .await
        {
            Ok(()) => Ok(()),
            Err(ApiError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!("Container {} not found, nothing to stop", id);
                Ok(())
            }
            Err(ApiError::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} already stopped", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Force-remove a container and its volumes; missing containers are a no-op
    pub async fn remove_container(&self, id: &str) -> Result<()> {
        match self
            .docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => {
                debug!("Removed container {}", id);
                Ok(())
            }
            Err(ApiError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!("Container {} not found, nothing to remove", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Translate a daemon 404 into [`Error::ContainerNotFound`]
fn map_not_found(error: ApiError, id: &str) -> Error {
    match error {
        ApiError::DockerResponseServerError {
            status_code: 404, ..
        } => Error::ContainerNotFound { id: id.to_string() },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_output_success() {
        let output = ExecOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(output.success());
        assert!(!output.interrupted());
    }

    #[test]
    fn test_exec_output_failure() {
        let output = ExecOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        assert!(!output.success());
        assert!(!output.interrupted());
    }

    #[test]
    fn test_exec_output_interrupted() {
        let output = ExecOutput {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(!output.success());
        assert!(output.interrupted());
    }

    #[test]
    fn test_container_handle_short_id() {
        let handle = ContainerHandle {
            id: "0123456789abcdef0123".to_string(),
            name: "fixture".to_string(),
        };
        assert_eq!(handle.short_id(), "0123456789ab");

        let short = ContainerHandle {
            id: "abc".to_string(),
            name: "fixture".to_string(),
        };
        assert_eq!(short.short_id(), "abc");
    }
}
