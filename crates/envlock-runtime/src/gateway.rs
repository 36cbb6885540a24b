use crate::backend::PackageManager;
use crate::env::random_env;
use crate::RuntimeError;
use envlock_schema::{parse_manifest_str, Manifest};
use std::io::Write;
use tracing::info;

/// Resolve `manifest_text` into a fully pinned manifest.
///
/// The text is written to a private temporary `.yml` file, an environment with
/// a random name is created from it and exported without build strings. The
/// environment is removed and the file deleted before this returns, whether
/// or not resolution succeeded. A failed create is reported as-is; the export
/// of a half-built environment is never used.
pub fn resolve(backend: &dyn PackageManager, manifest_text: &str) -> Result<Manifest, RuntimeError> {
    let mut file = tempfile::Builder::new()
        .prefix("envlock-")
        .suffix(".yml")
        .tempfile()?;
    file.write_all(manifest_text.as_bytes())?;
    file.flush()?;

    let exported = {
        let env = random_env(backend);
        info!("resolving in ephemeral environment {}", env.name());
        env.create(file.path())?;
        env.export()?
    };

    Ok(parse_manifest_str(&exported)?)
}

pub fn resolve_manifest(
    backend: &dyn PackageManager,
    manifest: &Manifest,
) -> Result<Manifest, RuntimeError> {
    resolve(backend, &manifest.to_yaml()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockCall};

    const INPUT: &str = "channels:\n  - conda-forge\ndependencies:\n  - python\n  - requests\n";
    const EXPORT: &str = "name: scratch\nchannels:\n  - conda-forge\ndependencies:\n  - python=3.11\n  - requests=2.31\n  - certifi=2024.1\nprefix: /opt/conda/envs/scratch\n";

    fn removals(backend: &MockBackend) -> Vec<String> {
        backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Remove { env_name } => Some(env_name),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn resolve_returns_parsed_export() {
        let backend = MockBackend::new().with_export(EXPORT);
        let resolved = resolve(&backend, INPUT).unwrap();
        assert_eq!(
            resolved.conda_dependencies(),
            ["python=3.11", "requests=2.31", "certifi=2024.1"]
        );
        assert_eq!(removals(&backend).len(), 1);
    }

    #[test]
    fn create_export_remove_share_one_name() {
        let backend = MockBackend::new().with_export(EXPORT);
        resolve(&backend, INPUT).unwrap();

        let calls = backend.calls();
        let MockCall::Create {
            env_name, manifest, ..
        } = &calls[0]
        else {
            panic!("expected create first, got {calls:?}");
        };
        assert_eq!(manifest, INPUT);
        assert_eq!(calls[1], MockCall::Export { env_name: env_name.clone() });
        assert_eq!(calls[2], MockCall::Remove { env_name: env_name.clone() });
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn export_failure_still_tears_down_once() {
        let backend = MockBackend::new().failing_export();
        let err = resolve(&backend, INPUT).unwrap_err();
        assert!(matches!(err, RuntimeError::Resolution(_)));
        assert_eq!(removals(&backend).len(), 1);
    }

    #[test]
    fn create_failure_tears_down_and_skips_export() {
        let backend = MockBackend::new().failing_create();
        assert!(resolve(&backend, INPUT).is_err());
        let calls = backend.calls();
        assert!(!calls.iter().any(|c| matches!(c, MockCall::Export { .. })));
        assert_eq!(removals(&backend).len(), 1);
    }

    #[test]
    fn temporary_manifest_is_deleted() {
        let backend = MockBackend::new().with_export(EXPORT);
        resolve(&backend, INPUT).unwrap();
        let calls = backend.calls();
        let MockCall::Create { manifest_path, .. } = &calls[0] else {
            panic!("expected create");
        };
        assert_eq!(manifest_path.extension().and_then(|e| e.to_str()), Some("yml"));
        assert!(!manifest_path.exists());
    }

    #[test]
    fn invalid_export_is_reported_after_teardown() {
        let backend = MockBackend::new().with_export("- not\n- a mapping\n");
        let err = resolve(&backend, INPUT).unwrap_err();
        assert!(matches!(err, RuntimeError::Export(_)));
        assert_eq!(removals(&backend).len(), 1);
    }

    #[test]
    fn each_call_uses_a_fresh_environment() {
        let backend = MockBackend::new().with_export(EXPORT);
        resolve(&backend, INPUT).unwrap();
        resolve(&backend, INPUT).unwrap();
        let names = removals(&backend);
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn resolve_manifest_serializes_input() {
        let backend = MockBackend::new();
        let input = parse_manifest_str(INPUT).unwrap();
        let resolved = resolve_manifest(&backend, &input).unwrap();
        assert_eq!(
            resolved.conda_dependencies(),
            ["python=0.0.0-mock", "requests=0.0.0-mock"]
        );
    }
}
