//! Pinned container image references.
//!
//! The fixture only ever runs images derived from one pinned base; a custom
//! reference must point at the same registry and repository (its tag is free)
//! and is rejected before any container exists.

use crate::error::FixtureError;
use std::fmt;
use std::str::FromStr;

const DEFAULT_REGISTRY: &str = "quay.io";
const DEFAULT_REPOSITORY: &str = "influxdb/influxdb";
const DEFAULT_TAG: &str = "v2.0.2";

/// A `registry/repository:tag` triple identifying a container image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    registry: String,
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Create an image reference from its parts
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// The pinned InfluxDB 2.x base image
    pub fn influxdb_default() -> Self {
        Self::new(DEFAULT_REGISTRY, DEFAULT_REPOSITORY, DEFAULT_TAG)
    }

    /// Same registry and repository, different pinned tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Registry host
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path within the registry
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Image tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Full reference string, `registry/repository:tag`
    pub fn reference(&self) -> String {
        format!("{}/{}:{}", self.registry, self.repository, self.tag)
    }

    /// Verify this reference can stand in for `base`.
    ///
    /// Compatible means same registry and same repository; the tag may
    /// differ. Called before any container is started.
    pub fn assert_compatible_with(&self, base: &ImageReference) -> Result<(), FixtureError> {
        if self.registry == base.registry && self.repository == base.repository {
            Ok(())
        } else {
            Err(FixtureError::ImageIncompatibility {
                expected: base.reference(),
                actual: self.reference(),
            })
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl FromStr for ImageReference {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FixtureError::InvalidImageReference {
            reference: s.to_string(),
        };

        let (rest, tag) = s.rsplit_once(':').ok_or_else(invalid)?;
        let (registry, repository) = rest.split_once('/').ok_or_else(invalid)?;
        if registry.is_empty() || repository.is_empty() || tag.is_empty() || tag.contains('/') {
            return Err(invalid());
        }

        Ok(Self::new(registry, repository, tag))
    }
}
