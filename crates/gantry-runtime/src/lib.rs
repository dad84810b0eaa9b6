//! Image introspection backends for Gantry.
//!
//! This crate implements the registry/runtime collaborator consumed by the
//! manifest parser: a pluggable `ImageInspector` trait with a Docker CLI
//! backed implementation (which owns the pull retry budget) and an
//! in-memory mock for tests.

pub mod docker;
pub mod inspector;
pub mod mock;

pub use docker::DockerCliInspector;
pub use inspector::{select_inspector, ExposedPort, ImageInspector, ImageMetadata};
pub use mock::MockInspector;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("inspect I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("inspector '{0}' is not available")]
    InspectorUnavailable(String),
    #[error("failed to pull image '{image}': {reason}")]
    PullFailed { image: String, reason: String },
    #[error("failed to inspect image '{image}': {reason}")]
    InspectFailed { image: String, reason: String },
    #[error("malformed image config for '{image}': {source}")]
    MalformedConfig {
        image: String,
        source: serde_json::Error,
    },
    #[error("invalid exposed port '{0}'")]
    InvalidExposedPort(String),
    #[error("image '{0}' not found")]
    ImageNotFound(String),
}
