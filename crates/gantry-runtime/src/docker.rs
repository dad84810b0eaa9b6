use crate::inspector::{ExposedPort, ImageInspector, ImageMetadata};
use crate::InspectError;
use gantry_schema::ImageName;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{debug, warn};

const DEFAULT_PULL_RETRIES: u32 = 5;

/// Inspector backed by the local `docker` binary: pulls the image (with a
/// fixed retry budget) and decodes the `Config` section of
/// `docker image inspect`.
pub struct DockerCliInspector {
    binary: String,
    pull_retries: u32,
}

impl Default for DockerCliInspector {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
            pull_retries: DEFAULT_PULL_RETRIES,
        }
    }
}

impl DockerCliInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different client binary (e.g. a podman shim on hosts without
    /// docker).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    fn pull(&self, reference: &str) -> Result<(), InspectError> {
        let mut last_failure = String::new();
        for attempt in 1..=self.pull_retries {
            debug!(
                "pulling image {reference} (attempt {attempt}/{})",
                self.pull_retries
            );
            let output = Command::new(&self.binary)
                .args(["pull", reference])
                .output()?;
            if output.status.success() {
                return Ok(());
            }
            last_failure = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            warn!(
                "pull attempt {attempt}/{} for {reference} failed: {last_failure}",
                self.pull_retries
            );
        }
        Err(InspectError::PullFailed {
            image: reference.to_owned(),
            reason: last_failure,
        })
    }

    fn image_config(&self, reference: &str) -> Result<ImageConfig, InspectError> {
        let output = Command::new(&self.binary)
            .args(["image", "inspect", "--format", "{{json .Config}}", reference])
            .output()?;
        if !output.status.success() {
            return Err(InspectError::InspectFailed {
                image: reference.to_owned(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        parse_image_config(reference, &String::from_utf8_lossy(&output.stdout))
    }
}

impl ImageInspector for DockerCliInspector {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn inspect(&self, image: &ImageName) -> Result<ImageMetadata, InspectError> {
        let reference = image.to_string();
        self.pull(&reference)?;
        let config = self.image_config(&reference)?;
        metadata_from_config(&config)
    }
}

/// Subset of the docker image `Config` section this pipeline consumes.
/// All three fields are nullable in the payload.
#[derive(Debug, Clone, Default, Deserialize)]
struct ImageConfig {
    #[serde(rename = "ExposedPorts", default)]
    exposed_ports: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(rename = "Env", default)]
    env: Option<Vec<String>>,
    #[serde(rename = "Volumes", default)]
    volumes: Option<BTreeMap<String, serde_json::Value>>,
}

fn parse_image_config(reference: &str, payload: &str) -> Result<ImageConfig, InspectError> {
    let trimmed = payload.trim();
    // Images without a config section render as "null".
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(ImageConfig::default());
    }
    serde_json::from_str(trimmed).map_err(|source| InspectError::MalformedConfig {
        image: reference.to_owned(),
        source,
    })
}

fn metadata_from_config(config: &ImageConfig) -> Result<ImageMetadata, InspectError> {
    let mut exposed_ports = Vec::new();
    if let Some(ports) = &config.exposed_ports {
        for key in ports.keys() {
            exposed_ports.push(ExposedPort::parse_key(key)?);
        }
    }
    Ok(ImageMetadata {
        exposed_ports,
        volumes: config
            .volumes
            .as_ref()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default(),
        env: config.env.clone().unwrap_or_default(),
    })
}
