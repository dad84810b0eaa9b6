use crate::inspector::{ImageInspector, ImageMetadata};
use crate::InspectError;
use gantry_schema::ImageName;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory inspector for tests: preloaded per-image metadata, injected
/// failures, and a recorded inspection order.
///
/// Images are keyed by their canonical `repository:tag` form, so
/// `with_image("nginx", ...)` matches a manifest that declares `nginx`.
pub struct MockInspector {
    images: HashMap<String, ImageMetadata>,
    failures: HashSet<String>,
    inspected: Mutex<Vec<String>>,
}

impl Default for MockInspector {
    fn default() -> Self {
        Self {
            images: HashMap::new(),
            failures: HashSet::new(),
            inspected: Mutex::new(Vec::new()),
        }
    }
}

impl MockInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, reference: &str, metadata: ImageMetadata) -> Self {
        self.images
            .insert(ImageName::parse(reference).to_string(), metadata);
        self
    }

    /// Make inspection of the given image fail.
    pub fn with_failure(mut self, reference: &str) -> Self {
        self.failures.insert(ImageName::parse(reference).to_string());
        self
    }

    /// Canonical references in the order they were inspected.
    pub fn inspected(&self) -> Vec<String> {
        self.inspected
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl ImageInspector for MockInspector {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn inspect(&self, image: &ImageName) -> Result<ImageMetadata, InspectError> {
        let reference = image.to_string();
        self.inspected
            .lock()
            .map_err(|e| InspectError::InspectFailed {
                image: reference.clone(),
                reason: format!("mutex poisoned: {e}"),
            })?
            .push(reference.clone());
        if self.failures.contains(&reference) {
            return Err(InspectError::ImageNotFound(reference));
        }
        // Unregistered images behave like images without a config section.
        Ok(self.images.get(&reference).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::ExposedPort;

    #[test]
    fn canonical_keying_matches_bare_references() {
        let inspector = MockInspector::new().with_image(
            "nginx",
            ImageMetadata {
                exposed_ports: vec![ExposedPort {
                    port: 80,
                    protocol: "tcp".to_owned(),
                }],
                volumes: Vec::new(),
                env: Vec::new(),
            },
        );
        let metadata = inspector.inspect(&ImageName::parse("nginx:latest")).unwrap();
        assert_eq!(metadata.exposed_ports.len(), 1);
    }

    #[test]
    fn unregistered_image_yields_empty_metadata() {
        let inspector = MockInspector::new();
        let metadata = inspector.inspect(&ImageName::parse("unknown")).unwrap();
        assert_eq!(metadata, ImageMetadata::default());
    }

    #[test]
    fn injected_failure_surfaces() {
        let inspector = MockInspector::new().with_failure("broken:v1");
        assert!(inspector.inspect(&ImageName::parse("broken:v1")).is_err());
    }

    #[test]
    fn inspection_order_is_recorded() {
        let inspector = MockInspector::new();
        inspector.inspect(&ImageName::parse("a")).unwrap();
        inspector.inspect(&ImageName::parse("b:v2")).unwrap();
        assert_eq!(inspector.inspected(), vec!["a:latest", "b:v2"]);
    }
}
