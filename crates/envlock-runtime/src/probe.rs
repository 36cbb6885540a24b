use crate::backend::PackageManager;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Platforms a package must be published for to count as independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformTargets {
    /// Subdir of universal packages; a hit here short-circuits the probe.
    pub noarch: String,
    pub platforms: Vec<String>,
}

impl Default for PlatformTargets {
    fn default() -> Self {
        Self {
            noarch: "noarch".to_owned(),
            platforms: vec![
                "linux-64".to_owned(),
                "osx-64".to_owned(),
                "win-64".to_owned(),
            ],
        }
    }
}

/// Whether `query` (a package spec, usually pinned) can be locked once for
/// every target platform.
///
/// True when the package is published as noarch, or published for each of
/// `targets.platforms` on `channels`. Nothing is cached between calls, and an
/// unreachable index counts as unavailable, so a flaky network errs towards
/// "platform specific".
pub fn is_independent(
    backend: &dyn PackageManager,
    query: &str,
    channels: &[String],
    targets: &PlatformTargets,
) -> bool {
    if backend.search(query, &targets.noarch, channels) {
        debug!("{query} is {}", targets.noarch);
        return true;
    }
    let independent = targets
        .platforms
        .iter()
        .all(|platform| backend.search(query, platform, channels));
    debug!("{query} independent across {:?}: {independent}", targets.platforms);
    independent
}
