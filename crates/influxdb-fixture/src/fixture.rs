//! Two-phase fixture lifecycle: configure, start, use, tear down.

use crate::config::{FixtureConfig, StartupOptions};
use crate::error::{FixtureError, Result};
use crate::image::ImageReference;
use crate::readiness::{HttpHealth, ListeningPort, ProbeTarget, WaitAll};
use container_runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, single_file_archive};
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Service port InfluxDB listens on inside the container
pub const INFLUXDB_PORT: u16 = 8086;

/// Health endpoint probed during startup
const PING_PATH: &str = "/ping";
/// Name under which the setup script lands in the container root
const SETUP_SCRIPT_NAME: &str = "influx-setup.sh";
/// One-time initialization script shipped into every fixture container
const SETUP_SCRIPT: &str = include_str!("../assets/influx-setup.sh");
/// Host name the mapped port is reachable under
const FIXTURE_HOST: &str = "localhost";
/// Log lines dumped when startup fails, to aid diagnosis
const FAILURE_LOG_TAIL: usize = 50;

/// A configured but not yet started fixture.
///
/// Holds only configuration; no container exists until [`start`] is called.
///
/// [`start`]: InfluxDbFixture::start
#[derive(Debug)]
pub struct InfluxDbFixture {
    config: FixtureConfig,
    image: ImageReference,
    options: StartupOptions,
}

impl InfluxDbFixture {
    /// Configure a fixture on the pinned default image
    pub fn configure(config: FixtureConfig) -> Self {
        Self {
            config,
            image: ImageReference::influxdb_default(),
            options: StartupOptions::default(),
        }
    }

    /// Configure a fixture on a custom image.
    ///
    /// Fails with [`FixtureError::ImageIncompatibility`] when the image does
    /// not share registry and repository with the pinned base; the check runs
    /// before any container is started.
    pub fn configure_with_image(config: FixtureConfig, image: ImageReference) -> Result<Self> {
        image.assert_compatible_with(&ImageReference::influxdb_default())?;
        Ok(Self {
            config,
            image,
            options: StartupOptions::default(),
        })
    }

    /// Override the startup deadline and poll interval
    pub fn with_startup_options(mut self, options: StartupOptions) -> Self {
        self.options = options;
        self
    }

    /// The image this fixture will run
    pub fn image(&self) -> &ImageReference {
        &self.image
    }

    /// The configuration this fixture will seed
    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Start the container, wait until it is ready, and run the one-time
    /// setup script.
    ///
    /// On any failure after the container started, the container is removed
    /// before the error is returned; a running-but-unconfigured instance is
    /// never left reachable.
    pub async fn start(self) -> Result<RunningFixture> {
        let runtime = ContainerRuntime::connect()?;
        runtime.ensure_image(&self.image.reference()).await?;

        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("influxdb-fixture-{}", &suffix[..12]);
        let spec = ContainerSpec::new(self.image.reference())
            .with_name(&name)
            .with_envs(self.config.env_vars())
            .with_exposed_tcp_port(INFLUXDB_PORT)
            .with_label("org.influxdb.fixture", "true");

        info!("Starting InfluxDB fixture container {} from {}", name, self.image);
        let container = runtime.start_container(spec).await?;

        match self.bring_up(&runtime, &container).await {
            Ok(url) => {
                info!("InfluxDB fixture ready on {}", url);
                Ok(RunningFixture {
                    runtime,
                    container,
                    url,
                    torn_down: false,
                })
            }
            Err(e) => {
                warn!(
                    "Fixture startup failed, removing container {}: {}",
                    container.short_id(),
                    e
                );
                if let Ok(logs) = runtime.logs_tail(container.id(), FAILURE_LOG_TAIL).await {
                    if !logs.is_empty() {
                        debug!("Container logs before teardown:\n{}", logs.trim_end());
                    }
                }
                if let Err(teardown) = runtime.remove_container(container.id()).await {
                    warn!(
                        "Failed to remove container {} after startup failure: {}",
                        container.short_id(),
                        teardown
                    );
                }
                Err(e)
            }
        }
    }

    /// Readiness wait and setup, separated out so `start` can tear down on
    /// any error in one place
    async fn bring_up(
        &self,
        runtime: &ContainerRuntime,
        container: &ContainerHandle,
    ) -> Result<String> {
        let port = runtime.mapped_port(container.id(), INFLUXDB_PORT).await?;
        let target = ProbeTarget {
            host: FIXTURE_HOST.to_string(),
            port,
        };

        let readiness = WaitAll::new()
            .with_strategy(ListeningPort)
            .with_strategy(HttpHealth::new(
                PING_PATH,
                self.config.username.as_str(),
                self.config.password.as_str(),
                StatusCode::NO_CONTENT,
            ));
        readiness
            .wait_until_ready(
                &target,
                self.options.startup_timeout,
                self.options.poll_interval,
            )
            .await?;

        self.run_setup_script(runtime, container).await?;
        Ok(format!("http://{}:{}", FIXTURE_HOST, port))
    }

    async fn run_setup_script(
        &self,
        runtime: &ContainerRuntime,
        container: &ContainerHandle,
    ) -> Result<()> {
        debug!(
            "Running setup script {} in container {}",
            SETUP_SCRIPT_NAME,
            container.short_id()
        );

        let archive = single_file_archive(SETUP_SCRIPT_NAME, SETUP_SCRIPT.as_bytes(), 0o644)
            .map_err(|e| FixtureError::ScriptTransfer {
                reason: e.to_string(),
            })?;
        runtime
            .upload_archive(container.id(), "/", archive)
            .await
            .map_err(|e| FixtureError::ScriptTransfer {
                reason: e.to_string(),
            })?;

        // The script's permission bits are unsuitable for direct execution in
        // this image: clear them and hand the script to an explicit
        // interpreter instead.
        let script_path = format!("/{}", SETUP_SCRIPT_NAME);
        self.exec_checked(runtime, container, &["chmod", "-x", &script_path])
            .await?;
        self.exec_checked(runtime, container, &["/bin/bash", &script_path])
            .await?;
        Ok(())
    }

    /// Run a setup command and require exit code 0.
    ///
    /// An exec that finishes without an exit code was interrupted; that is an
    /// error here, never silently ignored.
    async fn exec_checked(
        &self,
        runtime: &ContainerRuntime,
        container: &ContainerHandle,
        cmd: &[&str],
    ) -> Result<()> {
        let output = runtime.exec(container.id(), cmd).await?;
        match output.exit_code {
            Some(0) => Ok(()),
            Some(exit_code) => {
                if !output.stderr.is_empty() {
                    debug!("Setup stderr: {}", output.stderr.trim_end());
                }
                Err(FixtureError::ScriptExecution {
                    script: SETUP_SCRIPT_NAME.to_string(),
                    exit_code,
                })
            }
            None => Err(FixtureError::Interrupted {
                command: cmd.join(" "),
            }),
        }
    }
}

/// A started, initialized fixture with a reachable connection URL.
///
/// The fixture owns its container exclusively; dropping the value reclaims
/// the container if [`shutdown`] was not called first.
///
/// [`shutdown`]: RunningFixture::shutdown
pub struct RunningFixture {
    runtime: ContainerRuntime,
    container: ContainerHandle,
    url: String,
    torn_down: bool,
}

impl RunningFixture {
    /// Externally reachable base URL of the instance,
    /// `http://host:mappedPort`.
    ///
    /// Valid from the moment [`InfluxDbFixture::start`] returned.
    pub fn connection_url(&self) -> &str {
        &self.url
    }

    /// Handle of the owned container
    pub fn container(&self) -> &ContainerHandle {
        &self.container
    }

    /// Stop and remove the container. Safe to call more than once; a
    /// container that is already gone is a no-op.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.torn_down {
            debug!("Fixture container {} already torn down", self.container.short_id());
            return Ok(());
        }

        info!(
            "Tearing down InfluxDB fixture container {}",
            self.container.short_id()
        );
        self.runtime.stop_container(self.container.id()).await?;
        self.runtime.remove_container(self.container.id()).await?;
        self.torn_down = true;
        Ok(())
    }
}

impl Drop for RunningFixture {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        // Drop cannot await, so scope-exit cleanup falls back to a
        // synchronous forced removal. `shutdown` remains the path that
        // reports errors.
        let status = std::process::Command::new("docker")
            .args(["rm", "-f", self.container.id()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => {
                debug!(
                    "Removed fixture container {} on drop",
                    self.container.short_id()
                );
            }
            Ok(status) => {
                warn!(
                    "Removing fixture container {} on drop exited with {}",
                    self.container.short_id(),
                    status
                );
            }
            Err(e) => {
                warn!(
                    "Failed to remove fixture container {} on drop: {}",
                    self.container.short_id(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_keeps_pinned_image() {
        let fixture = InfluxDbFixture::configure(FixtureConfig::default());
        assert_eq!(
            fixture.image().reference(),
            "quay.io/influxdb/influxdb:v2.0.2"
        );
    }

    #[test]
    fn test_configure_with_compatible_tag() {
        let image = ImageReference::influxdb_default().with_tag("v2.0.4");
        let fixture =
            InfluxDbFixture::configure_with_image(FixtureConfig::default(), image).unwrap();
        assert_eq!(fixture.image().tag(), "v2.0.4");
    }

    #[test]
    fn test_configure_rejects_foreign_image_before_start() {
        let image = ImageReference::new("docker.io", "library/postgres", "16");
        let err =
            InfluxDbFixture::configure_with_image(FixtureConfig::default(), image).unwrap_err();
        assert!(matches!(err, FixtureError::ImageIncompatibility { .. }));
    }

    #[test]
    fn test_setup_script_is_embedded() {
        assert!(SETUP_SCRIPT.starts_with("#!"));
        assert!(SETUP_SCRIPT.contains("influx setup"));
    }

    #[test]
    fn test_startup_options_override() {
        use std::time::Duration;

        let fixture = InfluxDbFixture::configure(FixtureConfig::default()).with_startup_options(
            StartupOptions::default().with_startup_timeout(Duration::from_secs(5)),
        );
        assert_eq!(fixture.options.startup_timeout, Duration::from_secs(5));
    }
}
