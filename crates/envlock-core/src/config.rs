use crate::CoreError;
use envlock_runtime::PlatformTargets;
use envlock_schema::MergePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "ENVLOCK_CONFIG";

/// Settings for a lock run. Every engine call reads these explicitly; there
/// are no process-wide defaults behind its back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Backend name: `conda`, `mamba` or `mock`.
    pub backend: String,
    /// Binary to run instead of the backend's default executable.
    pub executable: Option<String>,
    /// Channels used for probing when a manifest declares none.
    pub default_channels: Vec<String>,
    pub policy: MergePolicy,
    /// Interpreter for `setup.py --name` on local dependencies.
    pub python: String,
    pub probe: PlatformTargets,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: "conda".to_owned(),
            executable: None,
            default_channels: vec!["defaults".to_owned()],
            policy: MergePolicy::default(),
            python: "python".to_owned(),
            probe: PlatformTargets::default(),
        }
    }
}

impl LockConfig {
    /// Load from `$ENVLOCK_CONFIG`, else `~/.config/envlock/config.toml`,
    /// else fall back to defaults when neither file exists.
    pub fn load_default() -> Result<Self, CoreError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The binary the backend runs.
    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(&self.backend)
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/envlock/config.toml"))
}
