//! Fixture configuration types.
//!
//! [`FixtureConfig`] is constructed once, passed into the bootstrapper, and
//! never mutated afterwards; the `Default` impl carries the fixed credentials
//! shared by all tests of a run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable carrying the admin user name
pub const ENV_USERNAME: &str = "INFLUXDB_USER";
/// Environment variable carrying the admin password
pub const ENV_PASSWORD: &str = "INFLUXDB_PASSWORD";
/// Environment variable carrying the admin access token
pub const ENV_TOKEN: &str = "INFLUXDB_TOKEN";
/// Environment variable carrying the default bucket name
pub const ENV_BUCKET: &str = "INFLUXDB_BUCKET";
/// Environment variable carrying the organization name
pub const ENV_ORGANIZATION: &str = "INFLUXDB_ORG";
/// Environment variable carrying the retention amount
pub const ENV_RETENTION: &str = "INFLUXDB_RETENTION";
/// Environment variable carrying the retention unit
pub const ENV_RETENTION_UNIT: &str = "INFLUXDB_RETENTION_UNIT";

/// Credentials and tenant state seeded into a fixture instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Admin user name
    pub username: String,
    /// Admin password, also used by the authenticated readiness probe
    pub password: String,
    /// Admin access token for the HTTP API
    pub auth_token: String,
    /// Default bucket created during setup
    pub bucket: String,
    /// Organization created during setup
    pub organization: String,
    /// Retention amount for the default bucket; 0 keeps data forever
    pub retention: u64,
    /// Unit of the retention amount, e.g. `ns`
    pub retention_unit: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            username: "test-user".to_string(),
            password: "test-password".to_string(),
            auth_token: "access-token".to_string(),
            bucket: "test-bucket".to_string(),
            organization: "test-org".to_string(),
            retention: 0,
            retention_unit: "ns".to_string(),
        }
    }
}

impl FixtureConfig {
    /// Render the configuration as the environment variables consumed by the
    /// container image and the setup script
    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![
            (ENV_USERNAME.to_string(), self.username.clone()),
            (ENV_PASSWORD.to_string(), self.password.clone()),
            (ENV_TOKEN.to_string(), self.auth_token.clone()),
            (ENV_BUCKET.to_string(), self.bucket.clone()),
            (ENV_ORGANIZATION.to_string(), self.organization.clone()),
            (ENV_RETENTION.to_string(), self.retention.to_string()),
            (ENV_RETENTION_UNIT.to_string(), self.retention_unit.clone()),
        ]
    }
}

/// Knobs for the startup wait loop
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Deadline for the composite readiness check
    pub startup_timeout: Duration,
    /// Pause between readiness probe rounds
    pub poll_interval: Duration,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl StartupOptions {
    /// Set the startup deadline
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Set the pause between probe rounds
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FixtureConfig::default();
        assert_eq!(config.username, "test-user");
        assert_eq!(config.password, "test-password");
        assert_eq!(config.auth_token, "access-token");
        assert_eq!(config.bucket, "test-bucket");
        assert_eq!(config.organization, "test-org");
        assert_eq!(config.retention, 0);
        assert_eq!(config.retention_unit, "ns");
    }

    #[test]
    fn test_env_vars_rendering() {
        let config = FixtureConfig::default();
        let env = config.env_vars();

        assert_eq!(env.len(), 7);
        let lookup = |key: &str| {
            env.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap_or_else(|| panic!("missing env key {}", key))
        };
        assert_eq!(lookup(ENV_USERNAME), "test-user");
        assert_eq!(lookup(ENV_PASSWORD), "test-password");
        assert_eq!(lookup(ENV_TOKEN), "access-token");
        assert_eq!(lookup(ENV_BUCKET), "test-bucket");
        assert_eq!(lookup(ENV_ORGANIZATION), "test-org");
        assert_eq!(lookup(ENV_RETENTION), "0");
        assert_eq!(lookup(ENV_RETENTION_UNIT), "ns");
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = FixtureConfig {
            retention: 52,
            retention_unit: "w".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: FixtureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_startup_options_defaults() {
        let options = StartupOptions::default();
        assert_eq!(options.startup_timeout, Duration::from_secs(60));
        assert_eq!(options.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_startup_options_builder() {
        let options = StartupOptions::default()
            .with_startup_timeout(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(50));
        assert_eq!(options.startup_timeout, Duration::from_secs(5));
        assert_eq!(options.poll_interval, Duration::from_millis(50));
    }
}
