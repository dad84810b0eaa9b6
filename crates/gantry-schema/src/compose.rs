use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to read compose file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode compose document: {0}")]
    Decode(#[from] serde_yaml::Error),
    #[error("compose document is empty")]
    EmptyDocument,
}

/// A decoded compose document: the declared services keyed by name.
///
/// Both layouts of the format are accepted: the versioned one with a
/// top-level `services:` mapping, and the legacy one where service mappings
/// sit at the document root.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeFile {
    #[serde(default, deserialize_with = "de_version")]
    pub version: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

/// One service declaration as authored in the manifest.
///
/// Unknown keys are ignored: the compose format is a superset of what this
/// pipeline consumes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMapping>,
    pub environment: Environment,
    pub mem_limit: MemoryLimit,
    pub command: CommandLine,
    pub links: Vec<String>,
    /// `Some` whenever the key is present, even with an empty list: an
    /// empty `depends_on` still replaces `links` wholesale.
    pub depends_on: Option<DependsOn>,
}

impl ServiceConfig {
    /// Service names referenced by `links`, with `service:alias` suffixes
    /// stripped.
    pub fn link_names(&self) -> Vec<String> {
        self.links
            .iter()
            .map(|link| match link.split_once(':') {
                Some((name, _alias)) => name.to_owned(),
                None => link.clone(),
            })
            .collect()
    }
}

/// A declared port, decoded from an integer or a short-syntax string
/// (`8080`, `"80:8080"`, `"127.0.0.1:53:53/udp"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: Option<u16>,
    pub protocol: Option<String>,
}

impl PortMapping {
    fn from_short_syntax(spec: &str) -> Result<Self, String> {
        let (ports, protocol) = match spec.split_once('/') {
            Some((ports, proto)) if !proto.trim().is_empty() => {
                (ports, Some(proto.trim().to_ascii_lowercase()))
            }
            Some(_) => return Err(format!("invalid port declaration '{spec}'")),
            None => (spec, None),
        };
        let parse = |raw: &str| {
            raw.trim()
                .parse::<u16>()
                .map_err(|_| format!("invalid port number '{raw}' in '{spec}'"))
        };
        let parts: Vec<&str> = ports.split(':').collect();
        let (host_port, container_port) = match parts.as_slice() {
            [container] => (None, parse(container)?),
            [host, container] => (Some(parse(host)?), parse(container)?),
            [_ip, host, container] => (Some(parse(host)?), parse(container)?),
            _ => return Err(format!("invalid port declaration '{spec}'")),
        };
        Ok(Self {
            container_port,
            host_port,
            protocol,
        })
    }
}

impl<'de> Deserialize<'de> for PortMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PortVisitor;

        impl Visitor<'_> for PortVisitor {
            type Value = PortMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a port number or a short-syntax port string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PortMapping, E> {
                let container_port = u16::try_from(v)
                    .map_err(|_| E::custom(format!("port {v} out of range")))?;
                Ok(PortMapping {
                    container_port,
                    host_port: None,
                    protocol: None,
                })
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PortMapping, E> {
                let unsigned = u64::try_from(v)
                    .map_err(|_| E::custom(format!("port {v} out of range")))?;
                self.visit_u64(unsigned)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PortMapping, E> {
                PortMapping::from_short_syntax(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PortVisitor)
    }
}

/// A declared volume, decoded from `"/container/path"`,
/// `"host:/container/path"`, or `"host:/container/path:mode"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMapping {
    pub host: Option<String>,
    pub container_path: String,
    pub read_only: bool,
}

impl VolumeMapping {
    fn from_spec(spec: &str) -> Result<Self, String> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (host, container_path, mode) = match parts.as_slice() {
            [container] => (None, *container, None),
            [host, container] => (Some((*host).to_owned()), *container, None),
            [host, container, mode] => (Some((*host).to_owned()), *container, Some(*mode)),
            _ => return Err(format!("invalid volume declaration '{spec}'")),
        };
        let container_path = container_path.trim().to_owned();
        if container_path.is_empty() {
            return Err(format!("empty container path in volume '{spec}'"));
        }
        let read_only = mode.is_some_and(|m| m.split(',').any(|flag| flag == "ro"));
        Ok(Self {
            host,
            container_path,
            read_only,
        })
    }
}

impl<'de> Deserialize<'de> for VolumeMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VolumeVisitor;

        impl Visitor<'_> for VolumeVisitor {
            type Value = VolumeMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a volume string like 'host:/container/path'")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<VolumeMapping, E> {
                VolumeMapping::from_spec(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(VolumeVisitor)
    }
}

/// Declared environment variables in document order.
///
/// Decoded from either a `NAME=value` sequence or a name-to-value mapping;
/// a bare `NAME` list entry and a null mapping value both yield an empty
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    entries: Vec<EnvEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
}

impl Environment {
    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    fn into_string(self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EnvVisitor;

        impl<'de> Visitor<'de> for EnvVisitor {
            type Value = Environment;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a NAME=value sequence or a name-to-value mapping")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Environment, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(raw) = seq.next_element::<String>()? {
                    let (name, value) = match raw.split_once('=') {
                        Some((name, value)) => (name.to_owned(), value.to_owned()),
                        None => (raw, String::new()),
                    };
                    entries.push(EnvEntry { name, value });
                }
                Ok(Environment { entries })
            }

            fn visit_map<A>(self, mut map: A) -> Result<Environment, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, value)) = map.next_entry::<String, ScalarValue>()? {
                    entries.push(EnvEntry {
                        name,
                        value: value.into_string(),
                    });
                }
                Ok(Environment { entries })
            }
        }

        deserializer.deserialize_any(EnvVisitor)
    }
}

/// Declared memory limit in bytes, decoded from an integer or a string
/// with a `b`/`k`/`m`/`g` unit suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryLimit(u64);

impl MemoryLimit {
    pub fn bytes(self) -> u64 {
        self.0
    }

    fn from_text(raw: &str) -> Result<Self, String> {
        const KIB: u64 = 1 << 10;
        const MIB: u64 = 1 << 20;
        const GIB: u64 = 1 << 30;

        let text = raw.trim().to_ascii_lowercase();
        if text.is_empty() {
            return Err("empty memory limit".to_owned());
        }
        for (suffix, multiplier) in [
            ("gb", GIB),
            ("g", GIB),
            ("mb", MIB),
            ("m", MIB),
            ("kb", KIB),
            ("k", KIB),
            ("b", 1),
        ] {
            if let Some(digits) = text.strip_suffix(suffix) {
                return digits
                    .trim()
                    .parse::<u64>()
                    .map(|n| Self(n * multiplier))
                    .map_err(|_| format!("invalid memory limit '{raw}'"));
            }
        }
        text.parse::<u64>()
            .map(Self)
            .map_err(|_| format!("invalid memory limit '{raw}'"))
    }
}

impl<'de> Deserialize<'de> for MemoryLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MemVisitor;

        impl Visitor<'_> for MemVisitor {
            type Value = MemoryLimit;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte count or a string with a unit suffix")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MemoryLimit, E> {
                Ok(MemoryLimit(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MemoryLimit, E> {
                u64::try_from(v)
                    .map(MemoryLimit)
                    .map_err(|_| E::custom(format!("negative memory limit {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MemoryLimit, E> {
                MemoryLimit::from_text(v).map_err(E::custom)
            }

            fn visit_unit<E: de::Error>(self) -> Result<MemoryLimit, E> {
                Ok(MemoryLimit::default())
            }
        }

        deserializer.deserialize_any(MemVisitor)
    }
}

/// Declared container command, decoded from a whitespace-split string or a
/// sequence of arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    pub fn args(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CommandLine {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CommandVisitor;

        impl<'de> Visitor<'de> for CommandVisitor {
            type Value = CommandLine;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a command string or a sequence of arguments")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<CommandLine, E> {
                Ok(CommandLine(
                    v.split_whitespace().map(str::to_owned).collect(),
                ))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<CommandLine, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut args = Vec::new();
                while let Some(arg) = seq.next_element::<String>()? {
                    args.push(arg);
                }
                Ok(CommandLine(args))
            }

            fn visit_unit<E: de::Error>(self) -> Result<CommandLine, E> {
                Ok(CommandLine::default())
            }
        }

        deserializer.deserialize_any(CommandVisitor)
    }
}

/// Declared startup dependencies, decoded from a sequence of names or a
/// name-to-condition mapping (conditions are ignored).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependsOn(Vec<String>);

impl DependsOn {
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for DependsOn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DependsVisitor;

        impl<'de> Visitor<'de> for DependsVisitor {
            type Value = DependsOn;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sequence of service names or a name-to-condition mapping")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<DependsOn, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut names = Vec::new();
                while let Some(name) = seq.next_element::<String>()? {
                    names.push(name);
                }
                Ok(DependsOn(names))
            }

            fn visit_map<A>(self, mut map: A) -> Result<DependsOn, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut names = Vec::new();
                while let Some((name, IgnoredAny)) = map.next_entry::<String, IgnoredAny>()? {
                    names.push(name);
                }
                Ok(DependsOn(names))
            }
        }

        deserializer.deserialize_any(DependsVisitor)
    }
}

fn de_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(de::Error::custom("version must be a string or a number")),
    }
}

pub fn parse_compose_str(input: &str) -> Result<ComposeFile, ComposeError> {
    let root: serde_yaml::Value = serde_yaml::from_str(input)?;
    if root.is_null() {
        return Err(ComposeError::EmptyDocument);
    }
    if root.get("services").is_some() || root.get("version").is_some() {
        Ok(serde_yaml::from_value(root)?)
    } else {
        // Legacy layout: every top-level mapping is a service.
        let services: BTreeMap<String, ServiceConfig> = serde_yaml::from_value(root)?;
        Ok(ComposeFile {
            version: None,
            services,
        })
    }
}

pub fn parse_compose_file(path: impl AsRef<Path>) -> Result<ComposeFile, ComposeError> {
    let content = fs::read_to_string(path)?;
    parse_compose_str(&content)
}
