//! Compose manifest parsing core for Gantry.
//!
//! This crate turns a compose document into the canonical service model
//! consumed by the build pipeline: a two-phase `ComposeParser` builds one
//! draft per declared service from the manifest, reconciles each draft
//! against metadata introspected from its container image, and exports
//! flattened `ServiceInfo` records.

pub mod model;
pub mod parser;
pub mod protocol;

pub use model::{
    Env, ErrorSeverity, ParseError, ParseErrorList, Port, ServiceInfo, Volume, VolumeType,
};
pub use parser::ComposeParser;
pub use protocol::port_protocol;
