use crate::model::{Env, ParseError, ParseErrorList, Port, ServiceInfo, Volume, VolumeType};
use crate::protocol::port_protocol;
use gantry_runtime::{ImageInspector, ImageMetadata};
use gantry_schema::{parse_compose_str, ImageName, ServiceConfig};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Mutable per-service accumulator owned by the parser during its run.
///
/// Port numbers, mount paths, and env names are each unique within one
/// draft: they are the map keys, so a later declaration silently replaces
/// an earlier one.
struct ServiceDraft {
    ports: BTreeMap<u16, Port>,
    volumes: BTreeMap<String, Volume>,
    envs: BTreeMap<String, Env>,
    memory: u64,
    image: ImageName,
    args: Vec<String>,
    depends: Vec<String>,
}

impl ServiceDraft {
    fn to_info(&self) -> ServiceInfo {
        ServiceInfo {
            ports: self.ports.values().cloned().collect(),
            envs: self.envs.values().cloned().collect(),
            volumes: self.volumes.values().cloned().collect(),
            image: self.image.clone(),
            args: self.args.clone(),
            depends_services: self.depends.clone(),
            memory: self.memory,
        }
    }
}

/// Two-phase compose parser: builds one draft per declared service, then
/// reconciles each draft against metadata introspected from its image.
///
/// A parser instance is good for exactly one `parse` call; it is not safe
/// to reuse across overlapping invocations.
pub struct ComposeParser {
    source: String,
    inspector: Box<dyn ImageInspector>,
    services: BTreeMap<String, ServiceDraft>,
    errors: ParseErrorList,
}

impl ComposeParser {
    pub fn new(source: impl Into<String>, inspector: Box<dyn ImageInspector>) -> Self {
        Self {
            source: source.into(),
            inspector,
            services: BTreeMap::new(),
            errors: ParseErrorList::new(),
        }
    }

    /// Run both parse phases. The returned list is empty on full success;
    /// any entry means the parse is failed as a whole.
    pub fn parse(&mut self) -> &ParseErrorList {
        if self.source.is_empty() {
            self.errors.push(ParseError::fatal("source can not be empty"));
            return &self.errors;
        }
        let compose = match parse_compose_str(&self.source) {
            Ok(compose) => compose,
            Err(err) => {
                self.errors.push(ParseError::fatal(err.to_string()));
                return &self.errors;
            }
        };
        info!(
            "building drafts for {} declared service(s)",
            compose.services.len()
        );
        for (name, config) in &compose.services {
            self.services.insert(name.clone(), build_draft(name, config));
        }
        self.reconcile();
        &self.errors
    }

    /// One blocking inspection per service; the first failure aborts the
    /// whole parse with no partial-success mode.
    fn reconcile(&mut self) {
        for (name, draft) in &mut self.services {
            debug!("inspecting image {} for service {name}", draft.image);
            match self.inspector.inspect(&draft.image) {
                Ok(metadata) => merge_image_metadata(draft, &metadata),
                Err(err) => {
                    self.errors.push(ParseError::fatal(err.to_string()));
                    return;
                }
            }
        }
    }

    /// Export the parsed drafts. Returns an empty list unless `parse`
    /// completed with an empty error list.
    pub fn service_info(&self) -> Vec<ServiceInfo> {
        if !self.errors.is_empty() {
            return Vec::new();
        }
        self.services.values().map(ServiceDraft::to_info).collect()
    }

    pub fn errors(&self) -> &ParseErrorList {
        &self.errors
    }
}

fn build_draft(name: &str, config: &ServiceConfig) -> ServiceDraft {
    let mut ports = BTreeMap::new();
    for mapping in &config.ports {
        let protocol = match mapping.protocol.as_deref() {
            Some("udp") => "udp".to_owned(),
            // Any other declared protocol string is overridden by inference.
            _ => port_protocol(mapping.container_port).to_owned(),
        };
        ports.insert(
            mapping.container_port,
            Port {
                container_port: mapping.container_port,
                protocol,
            },
        );
    }

    let mut volumes = BTreeMap::new();
    for mapping in &config.volumes {
        volumes.insert(
            mapping.container_path.clone(),
            Volume {
                volume_path: mapping.container_path.clone(),
                volume_type: VolumeType::ShareFile.as_str().to_owned(),
            },
        );
    }

    let mut envs = BTreeMap::new();
    for entry in config.environment.entries() {
        envs.insert(
            entry.name.clone(),
            Env {
                name: entry.name.clone(),
                value: entry.value.clone(),
            },
        );
    }

    // links is the default; a present depends_on (even empty) replaces it.
    let depends = match &config.depends_on {
        Some(depends_on) => depends_on.names().to_vec(),
        None => config.link_names(),
    };

    debug!(
        "built draft for service {name}: {} port(s), {} volume(s), {} env var(s)",
        ports.len(),
        volumes.len(),
        envs.len()
    );
    ServiceDraft {
        ports,
        volumes,
        envs,
        memory: config.mem_limit.bytes(),
        image: ImageName::parse(&config.image),
        args: config.command.args().to_vec(),
        depends,
    }
}

/// Merge image-introspected metadata into a draft.
///
/// Declared config wins on the presence of env vars and volumes; the image
/// wins on the protocol of ports it exposes.
fn merge_image_metadata(draft: &mut ServiceDraft, metadata: &ImageMetadata) {
    for raw in &metadata.env {
        let Some((name, value)) = raw.split_once('=') else {
            continue;
        };
        if !draft.envs.contains_key(name) {
            draft.envs.insert(
                name.to_owned(),
                Env {
                    name: name.to_owned(),
                    value: value.to_owned(),
                },
            );
        }
    }

    for path in &metadata.volumes {
        if !draft.volumes.contains_key(path) {
            draft.volumes.insert(
                path.clone(),
                Volume {
                    volume_path: path.clone(),
                    volume_type: VolumeType::ShareFile.as_str().to_owned(),
                },
            );
        }
    }

    for exposed in &metadata.exposed_ports {
        let protocol = if exposed.protocol == "udp" {
            "udp".to_owned()
        } else {
            port_protocol(exposed.port).to_owned()
        };
        match draft.ports.get_mut(&exposed.port) {
            Some(port) => port.protocol = protocol,
            None => {
                draft.ports.insert(
                    exposed.port,
                    Port {
                        container_port: exposed.port,
                        protocol,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_runtime::{ExposedPort, MockInspector};

    fn parse_with(source: &str, inspector: MockInspector) -> ComposeParser {
        let mut parser = ComposeParser::new(source, Box::new(inspector));
        parser.parse();
        parser
    }

    #[test]
    fn empty_source_is_a_single_fatal_error() {
        let mut parser = ComposeParser::new("", Box::new(MockInspector::new()));
        let errors = parser.parse();
        assert_eq!(errors.len(), 1);
        assert!(errors.is_fatal());
        assert_eq!(errors.iter().next().unwrap().message, "source can not be empty");
        assert!(parser.service_info().is_empty());
    }

    #[test]
    fn decode_failure_carries_decoder_message() {
        let parser = parse_with("services:\n  svc:\n    ports: [", MockInspector::new());
        assert_eq!(parser.errors().len(), 1);
        assert!(parser
            .errors()
            .iter()
            .next()
            .unwrap()
            .message
            .contains("failed to decode compose document"));
    }

    #[test]
    fn one_draft_per_declared_service() {
        let parser = parse_with(
            "services:\n  a:\n    image: x\n  b:\n    image: y\n  c:\n    image: z\n",
            MockInspector::new(),
        );
        assert!(parser.errors().is_empty());
        assert_eq!(parser.service_info().len(), 3);
    }

    #[test]
    fn declared_udp_port_survives_both_phases() {
        let inspector = MockInspector::new().with_image(
            "dns",
            ImageMetadata {
                exposed_ports: vec![ExposedPort {
                    port: 53,
                    protocol: "udp".to_owned(),
                }],
                volumes: Vec::new(),
                env: Vec::new(),
            },
        );
        let parser = parse_with(
            "services:\n  dns:\n    image: dns\n    ports:\n      - \"53:53/udp\"\n",
            inspector,
        );
        let info = parser.service_info();
        assert_eq!(info[0].ports[0].protocol, "udp");
    }

    #[test]
    fn declared_non_udp_protocol_is_overridden_by_inference() {
        let parser = parse_with(
            "services:\n  web:\n    image: web\n    ports:\n      - \"8080/tcp\"\n",
            MockInspector::new(),
        );
        // 8080 is in the well-known table as http, whatever was declared.
        assert_eq!(parser.service_info()[0].ports[0].protocol, "http");
    }

    #[test]
    fn depends_on_replaces_links_wholesale() {
        let parser = parse_with(
            "services:\n  svc:\n    image: x\n    links: [c, d]\n    depends_on: [a, b]\n",
            MockInspector::new(),
        );
        assert_eq!(parser.service_info()[0].depends_services, vec!["a", "b"]);
    }

    #[test]
    fn empty_depends_on_still_replaces_links() {
        let parser = parse_with(
            "services:\n  svc:\n    image: x\n    links: [c, d]\n    depends_on: []\n",
            MockInspector::new(),
        );
        assert!(parser.service_info()[0].depends_services.is_empty());
    }

    #[test]
    fn links_used_when_no_depends_on() {
        let parser = parse_with(
            "services:\n  svc:\n    image: x\n    links: [\"db:alias\", cache]\n",
            MockInspector::new(),
        );
        assert_eq!(parser.service_info()[0].depends_services, vec!["db", "cache"]);
    }

    #[test]
    fn inspection_failure_aborts_the_whole_parse() {
        let parser = parse_with(
            "services:\n  a:\n    image: good\n  b:\n    image: bad\n",
            MockInspector::new()
                .with_failure("bad")
                .with_image("good", ImageMetadata::default()),
        );
        assert_eq!(parser.errors().len(), 1);
        assert!(parser.errors().is_fatal());
        assert!(parser.service_info().is_empty());
    }

    #[test]
    fn duplicate_declared_port_last_wins() {
        let parser = parse_with(
            "services:\n  svc:\n    image: x\n    ports:\n      - \"80:9000\"\n      - \"81:9000\"\n",
            MockInspector::new(),
        );
        let ports = &parser.service_info()[0].ports;
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].container_port, 9000);
    }

    #[test]
    fn memory_and_args_propagate() {
        let parser = parse_with(
            "services:\n  svc:\n    image: x\n    mem_limit: 1g\n    command: run --fast\n",
            MockInspector::new(),
        );
        let info = &parser.service_info()[0];
        assert_eq!(info.memory, 1 << 30);
        assert_eq!(info.args, vec!["run", "--fast"]);
    }
}
