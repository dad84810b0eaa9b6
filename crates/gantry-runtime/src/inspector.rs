use crate::InspectError;
use gantry_schema::ImageName;
use serde::{Deserialize, Serialize};

/// Ground-truth metadata introspected from a container image.
///
/// `env` entries are raw `NAME=value` strings exactly as the image config
/// stores them; splitting them is the consumer's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageMetadata {
    pub exposed_ports: Vec<ExposedPort>,
    pub volumes: Vec<String>,
    pub env: Vec<String>,
}

/// One port the image declares as exposed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: String,
}

impl ExposedPort {
    /// Parse docker's `"8080/tcp"` exposed-port key form. A bare port number
    /// defaults to tcp.
    pub fn parse_key(key: &str) -> Result<Self, InspectError> {
        let (port_raw, protocol) = match key.split_once('/') {
            Some((port, proto)) if !proto.is_empty() => (port, proto.to_ascii_lowercase()),
            Some(_) => return Err(InspectError::InvalidExposedPort(key.to_owned())),
            None => (key, "tcp".to_owned()),
        };
        let port = port_raw
            .trim()
            .parse::<u16>()
            .map_err(|_| InspectError::InvalidExposedPort(key.to_owned()))?;
        Ok(Self { port, protocol })
    }
}

pub trait ImageInspector: Send + Sync {
    fn name(&self) -> &str;

    /// Pull the image if needed and return its exposed ports, declared
    /// volumes, and default environment variables. One blocking call; any
    /// retry policy is owned by the implementation.
    fn inspect(&self, image: &ImageName) -> Result<ImageMetadata, InspectError>;
}

impl<T: ImageInspector + ?Sized> ImageInspector for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn inspect(&self, image: &ImageName) -> Result<ImageMetadata, InspectError> {
        (**self).inspect(image)
    }
}

pub fn select_inspector(name: &str) -> Result<Box<dyn ImageInspector>, InspectError> {
    match name {
        "docker" => Ok(Box::new(crate::docker::DockerCliInspector::new())),
        "mock" => Ok(Box::new(crate::mock::MockInspector::new())),
        other => Err(InspectError::InspectorUnavailable(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exposed_port_keys() {
        let tcp = ExposedPort::parse_key("8080/tcp").unwrap();
        assert_eq!(tcp.port, 8080);
        assert_eq!(tcp.protocol, "tcp");

        let udp = ExposedPort::parse_key("53/udp").unwrap();
        assert_eq!(udp.protocol, "udp");

        let bare = ExposedPort::parse_key("9090").unwrap();
        assert_eq!(bare.port, 9090);
        assert_eq!(bare.protocol, "tcp");
    }

    #[test]
    fn invalid_exposed_port_keys_fail() {
        assert!(ExposedPort::parse_key("http/tcp").is_err());
        assert!(ExposedPort::parse_key("8080/").is_err());
        assert!(ExposedPort::parse_key("70000/tcp").is_err());
    }

    #[test]
    fn select_valid_inspectors() {
        assert!(select_inspector("docker").is_ok());
        assert!(select_inspector("mock").is_ok());
    }

    #[test]
    fn select_unknown_inspector_fails() {
        assert!(select_inspector("podman").is_err());
    }
}
