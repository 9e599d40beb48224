//! Error types for container lifecycle operations

use thiserror::Error;

/// Unified error type for container runtime operations
#[derive(Error, Debug)]
pub enum Error {
    /// Docker daemon not accessible
    #[error("Docker daemon not accessible: {reason}")]
    DaemonNotAccessible {
        /// Why the daemon connection could not be established
        reason: String,
    },

    /// Container not found
    #[error("container not found: {id}")]
    ContainerNotFound {
        /// The container ID or name that was not found
        id: String,
    },

    /// No host port was published for a container port
    #[error("no host port bound for container port {port}")]
    MissingPortBinding {
        /// The container-side port that has no host binding
        port: u16,
    },

    /// Container operation failed
    #[error("container operation failed: {reason}")]
    OperationFailed {
        /// The detailed reason for the failure
        reason: String,
    },

    /// Docker API error
    #[error(transparent)]
    Api(#[from] bollard::errors::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an operation failed error
    pub fn operation_failed(reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
