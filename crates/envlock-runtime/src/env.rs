use crate::backend::PackageManager;
use crate::RuntimeError;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

/// A throwaway package-manager environment that is removed on drop.
///
/// Removal runs on every exit path, including early returns through `?`
/// after a failed create or export. A failed removal is logged, not raised.
pub struct EphemeralEnv<'a> {
    backend: &'a dyn PackageManager,
    name: String,
}

impl<'a> EphemeralEnv<'a> {
    pub fn new(backend: &'a dyn PackageManager, name: impl Into<String>) -> Self {
        Self {
            backend,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create(&self, manifest_path: &Path) -> Result<(), RuntimeError> {
        debug!(
            "creating environment {} from {}",
            self.name,
            manifest_path.display()
        );
        self.backend.create_env(&self.name, manifest_path)
    }

    pub fn export(&self) -> Result<String, RuntimeError> {
        debug!("exporting environment {}", self.name);
        self.backend.export_env(&self.name)
    }
}

impl Drop for EphemeralEnv<'_> {
    fn drop(&mut self) {
        debug!("removing environment {}", self.name);
        if let Err(e) = self.backend.remove_env(&self.name) {
            warn!("failed to remove environment {}: {e}", self.name);
        }
    }
}

/// A fresh environment name carrying 128 random bits.
pub fn random_env_name() -> String {
    format!("envlock-{}", Uuid::new_v4().simple())
}

/// An [`EphemeralEnv`] with a random name.
pub fn random_env(backend: &dyn PackageManager) -> EphemeralEnv<'_> {
    EphemeralEnv::new(backend, random_env_name())
}
