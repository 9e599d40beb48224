//! Async Docker container lifecycle management for disposable test instances.
//!
//! This crate is the thin layer between test fixtures and the Docker daemon:
//! it starts containers with injected environment and published ports, resolves
//! host-mapped ports, delivers files into the container filesystem, executes
//! commands inside the container with captured output and exit codes, and
//! stops/removes containers with idempotent semantics so teardown paths can be
//! retried safely.
//!
//! Fixture policy (what to run, when it counts as ready, what to execute
//! inside) lives in the crates built on top of this one.

#![warn(missing_docs)]

mod archive;
mod error;
mod runtime;
mod spec;

pub use archive::single_file_archive;
pub use error::{Error, Result};
pub use runtime::{ContainerHandle, ContainerRuntime, ExecOutput};
pub use spec::ContainerSpec;
