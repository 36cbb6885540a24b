use crate::RuntimeError;
use std::path::Path;

/// The four operations envlock needs from an external package manager.
///
/// Every call blocks until the underlying process exits. Implementations
/// never retry.
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Create environment `env_name` from the manifest file at `manifest_path`.
    fn create_env(&self, env_name: &str, manifest_path: &Path) -> Result<(), RuntimeError>;

    /// Export `env_name` as manifest text with exact versions and no build
    /// strings.
    fn export_env(&self, env_name: &str) -> Result<String, RuntimeError>;

    fn remove_env(&self, env_name: &str) -> Result<(), RuntimeError>;

    /// Whether `query` is published for `platform` on any of `channels`.
    ///
    /// A missing package and an unreachable index look the same: both return
    /// `false`.
    fn search(&self, query: &str, platform: &str, channels: &[String]) -> bool;
}

/// Build a backend by name. `executable` overrides the binary invoked by the
/// conda-family backends.
pub fn select_backend(
    name: &str,
    executable: Option<&str>,
) -> Result<Box<dyn PackageManager>, RuntimeError> {
    match name {
        "conda" | "mamba" => Ok(Box::new(crate::conda::CondaBackend::new(
            executable.unwrap_or(name),
        ))),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
