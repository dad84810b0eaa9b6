use serde::{Deserialize, Serialize};
use std::fmt;

/// Default tag when a reference carries none.
const DEFAULT_TAG: &str = "latest";

/// Parsed container image reference, reduced to the repository and tag the
/// service model keys on.
///
/// Parsing is pure string manipulation, no I/O. A digest suffix
/// (`@sha256:...`) is stripped; registries with ports
/// (`registry.local:5000/app`) are not mistaken for tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageName {
    pub repository: String,
    pub tag: String,
}

impl ImageName {
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        let name = match reference.rsplit_once('@') {
            Some((name, digest)) if digest.contains(':') => name,
            _ => reference,
        };
        let last_slash = name.rfind('/');
        match name.rfind(':') {
            Some(i) if last_slash.map_or(true, |s| i > s) => {
                let tag = &name[i + 1..];
                Self {
                    repository: name[..i].to_owned(),
                    tag: if tag.is_empty() {
                        DEFAULT_TAG.to_owned()
                    } else {
                        tag.to_owned()
                    },
                }
            }
            _ => Self {
                repository: name.to_owned(),
                tag: DEFAULT_TAG.to_owned(),
            },
        }
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_gets_default_tag() {
        let image = ImageName::parse("nginx");
        assert_eq!(image.repository, "nginx");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn explicit_tag_is_kept() {
        let image = ImageName::parse("nginx:1.25");
        assert_eq!(image.repository, "nginx");
        assert_eq!(image.tag, "1.25");
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let image = ImageName::parse("registry.local:5000/team/app");
        assert_eq!(image.repository, "registry.local:5000/team/app");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn registry_port_with_tag() {
        let image = ImageName::parse("registry.local:5000/team/app:v2");
        assert_eq!(image.repository, "registry.local:5000/team/app");
        assert_eq!(image.tag, "v2");
    }

    #[test]
    fn digest_suffix_is_stripped() {
        let image = ImageName::parse("ghcr.io/org/app@sha256:deadbeef");
        assert_eq!(image.repository, "ghcr.io/org/app");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn trailing_colon_falls_back_to_default_tag() {
        let image = ImageName::parse("nginx:");
        assert_eq!(image.repository, "nginx");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(ImageName::parse("redis:7").to_string(), "redis:7");
        assert_eq!(ImageName::parse("redis").to_string(), "redis:latest");
    }
}
