//! Container specification builder
//!
//! A [`ContainerSpec`] describes WHAT to run — image, name, environment,
//! ports — while [`crate::ContainerRuntime`] decides how to realize it
//! against the daemon.

use std::collections::HashMap;

/// Description of a container to be created and started
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Image reference to run
    image: String,
    /// Optional container name
    name: Option<String>,
    /// Environment variables
    env: HashMap<String, String>,
    /// TCP ports to publish to ephemeral host ports
    exposed_tcp_ports: Vec<u16>,
    /// Command overriding the image default
    command: Option<Vec<String>>,
    /// Labels attached to the container
    labels: HashMap<String, String>,
}

impl ContainerSpec {
    /// Create a new spec for the given image reference
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: None,
            env: HashMap::new(),
            exposed_tcp_ports: Vec::new(),
            command: None,
            labels: HashMap::new(),
        }
    }

    /// Set the container name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.env.insert(key.into(), value.into());
        }
        self
    }

    /// Publish a container TCP port to an ephemeral host port
    pub fn with_exposed_tcp_port(mut self, port: u16) -> Self {
        self.exposed_tcp_ports.push(port);
        self
    }

    /// Override the image's default command
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(command.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a label to the container
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Get the image reference
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Get the container name, if one was set
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the environment variables
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Get the published TCP ports
    pub fn exposed_tcp_ports(&self) -> &[u16] {
        &self.exposed_tcp_ports
    }

    /// Get the command override, if one was set
    pub fn command(&self) -> Option<&[String]> {
        self.command.as_deref()
    }

    /// Get the container labels
    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }
}
