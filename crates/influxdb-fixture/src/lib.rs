//! Disposable InfluxDB 2.x containers for integration tests.
//!
//! The fixture deterministically brings up one database instance per test
//! run: it starts a container from a pinned image with the configured
//! credentials injected as environment variables, waits until the instance is
//! genuinely ready (TCP port accepting connections AND the authenticated HTTP
//! health endpoint answering), runs a one-time setup script inside the
//! container to seed user/org/bucket state, and exposes the host-mapped
//! connection URL to test code. Teardown is guaranteed on every path,
//! including startup failures.
//!
//! Construction is two-phase: [`InfluxDbFixture::configure`] validates and
//! captures the configuration without side effects, and
//! [`InfluxDbFixture::start`] performs the container work, so every failure
//! is observable as an error instead of being buried in a constructor.
//!
//! ## Example
//!
//! ```no_run
//! use influxdb_fixture::{FixtureConfig, InfluxDbFixture};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut fixture = InfluxDbFixture::configure(FixtureConfig::default())
//!     .start()
//!     .await?;
//!
//! let url = fixture.connection_url();
//! // run tests against `url` ...
//!
//! fixture.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod fixture;
mod image;
mod readiness;

pub use config::{
    ENV_BUCKET, ENV_ORGANIZATION, ENV_PASSWORD, ENV_RETENTION, ENV_RETENTION_UNIT, ENV_TOKEN,
    ENV_USERNAME, FixtureConfig, StartupOptions,
};
pub use error::{FixtureError, Result};
pub use fixture::{INFLUXDB_PORT, InfluxDbFixture, RunningFixture};
pub use image::ImageReference;
pub use readiness::{HttpHealth, ListeningPort, ProbeStatus, ProbeTarget, WaitAll, WaitStrategy};
