use gantry_schema::ImageName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A network port exposed by a service inside its container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    pub container_port: u16,
    pub protocol: String,
}

/// A storage mount attached to a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    pub volume_path: String,
    pub volume_type: String,
}

/// An environment variable of a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Env {
    pub name: String,
    pub value: String,
}

/// Volume kinds of the downstream service model. Compose declarations carry
/// no usable type information, so every parsed volume is a shared
/// filesystem mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeType {
    ShareFile,
}

impl VolumeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShareFile => "share-file",
        }
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a parse diagnostic. Every condition this parser reports is
/// terminal for the current parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Fatal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub severity: ErrorSeverity,
    pub message: String,
}

impl ParseError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Fatal,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal: {}", self.message)
    }
}

/// Ordered, append-only list of parse diagnostics. Errors are reported as
/// data, never thrown: callers decide success by checking emptiness.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseErrorList(Vec<ParseError>);

impl ParseErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ParseError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_fatal(&self) -> bool {
        self.0
            .iter()
            .any(|e| e.severity == ErrorSeverity::Fatal)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ParseErrorList {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Flattened, export-only snapshot of one parsed service. Sequence order is
/// not meaningful.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub ports: Vec<Port>,
    pub envs: Vec<Env>,
    pub volumes: Vec<Volume>,
    pub image: ImageName,
    pub args: Vec<String>,
    pub depends_services: Vec<String>,
    pub memory: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_type_string_form() {
        assert_eq!(VolumeType::ShareFile.as_str(), "share-file");
        assert_eq!(VolumeType::ShareFile.to_string(), "share-file");
    }

    #[test]
    fn error_list_accumulates_in_order() {
        let mut errors = ParseErrorList::new();
        assert!(errors.is_empty());
        assert!(!errors.is_fatal());

        errors.push(ParseError::fatal("first"));
        errors.push(ParseError::fatal("second"));
        assert_eq!(errors.len(), 2);
        assert!(errors.is_fatal());

        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn parse_error_display() {
        let error = ParseError::fatal("source can not be empty");
        assert_eq!(error.to_string(), "fatal: source can not be empty");
    }

    #[test]
    fn service_info_serializes() {
        let info = ServiceInfo {
            ports: vec![Port {
                container_port: 80,
                protocol: "http".to_owned(),
            }],
            envs: Vec::new(),
            volumes: Vec::new(),
            image: ImageName::parse("nginx"),
            args: Vec::new(),
            depends_services: Vec::new(),
            memory: 0,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["ports"][0]["container_port"], 80);
        assert_eq!(json["image"]["repository"], "nginx");
    }
}
