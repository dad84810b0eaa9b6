//! Compose document decoding and image reference parsing for Gantry.
//!
//! This crate defines the declaration layer: YAML compose decoding
//! (`ComposeFile`, `ServiceConfig`) tolerant of the format's flexible field
//! shapes, and the parsed image reference (`ImageName`) the rest of the
//! pipeline keys on.

pub mod compose;
pub mod image;

pub use compose::{
    parse_compose_file, parse_compose_str, CommandLine, ComposeError, ComposeFile, DependsOn,
    EnvEntry, Environment, MemoryLimit, PortMapping, ServiceConfig, VolumeMapping,
};
pub use image::ImageName;
