use super::{base_dir, read_input, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use envlock_core::{LockConfig, Locker};
use envlock_schema::MergePolicy;
use std::path::Path;

/// Per-invocation settings that replace the configured ones when given.
#[derive(Debug, Default)]
pub struct Overrides {
    pub platforms: Vec<String>,
    pub channels: Vec<String>,
    pub policy: Option<MergePolicy>,
}

impl Overrides {
    fn apply(self, config: &mut LockConfig) {
        if !self.platforms.is_empty() {
            config.probe.platforms = self.platforms;
        }
        if !self.channels.is_empty() {
            config.default_channels = self.channels;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
    }
}

pub fn run(mut config: LockConfig, manifest_path: &Path, overrides: Overrides) -> Result<u8, String> {
    overrides.apply(&mut config);
    let input = read_input(manifest_path)?;
    let locker = Locker::new(config).map_err(|e| e.to_string())?;

    let pb = spinner("resolving environment...");
    match locker.lock_manifest_str(&input, base_dir(manifest_path)) {
        Ok(locked) => {
            spin_ok(&pb, "environment locked");
            print!("{locked}");
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            spin_fail(&pb, "lock failed");
            Err(e.to_string())
        }
    }
}
