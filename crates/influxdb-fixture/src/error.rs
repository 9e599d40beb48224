//! Error types for fixture creation and teardown

use std::time::Duration;
use thiserror::Error;

/// Unified error type for fixture operations
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The requested image cannot stand in for the pinned base image
    #[error("image {actual} is not compatible with the pinned base image {expected}")]
    ImageIncompatibility {
        /// The pinned base image reference
        expected: String,
        /// The incompatible reference that was requested
        actual: String,
    },

    /// A string could not be parsed as a `registry/repository:tag` reference
    #[error("invalid image reference: {reference}")]
    InvalidImageReference {
        /// The string that failed to parse
        reference: String,
    },

    /// Readiness was not reached within the startup deadline
    #[error("container did not become ready within {timeout:?} (last status: {last_status})")]
    StartupTimeout {
        /// The deadline that elapsed
        timeout: Duration,
        /// The most recent probe outcome before the deadline
        last_status: String,
    },

    /// The setup script could not be copied into the container
    #[error("failed to transfer setup script into the container: {reason}")]
    ScriptTransfer {
        /// Why the transfer failed
        reason: String,
    },

    /// The setup script ran and exited with a non-zero code
    #[error("setup script {script} exited with code {exit_code}")]
    ScriptExecution {
        /// Name of the script that failed
        script: String,
        /// The non-zero exit code
        exit_code: i64,
    },

    /// Setup was cut short before an exit code was observed
    #[error("setup command `{command}` was interrupted before completion")]
    Interrupted {
        /// The command that did not run to completion
        command: String,
    },

    /// Container runtime failure
    #[error(transparent)]
    Runtime(#[from] container_runtime::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FixtureError>;
