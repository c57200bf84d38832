use std::collections::HashMap;

use super::backend::DetectorBackend;

/// Named detector backends available to a session.
///
/// The session takes exactly one backend out of the registry when it builds
/// its `DetectionPipeline`; after that the pipeline owns it.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn DetectorBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its `name()`. A later backend with the same
    /// name replaces the earlier one.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.backends.insert(name.clone(), Box::new(backend)).is_some() {
            log::warn!("detector backend '{}' registered twice; keeping the latest", name);
        }
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove and return a backend by name.
    pub fn take(&mut self, name: &str) -> Option<Box<dyn DetectorBackend>> {
        self.backends.remove(name)
    }
}
