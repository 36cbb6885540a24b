use crate::config::LockConfig;
use crate::interrupt::check_interrupt;
use crate::CoreError;
use envlock_runtime::{
    is_independent, package_name, resolve_manifest, select_backend, PackageManager,
};
use envlock_schema::{
    is_local, merge, parse_manifest_str, parse_requirements, pip_manifest, Ecosystem, Manifest,
    Requirement,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Produces lock files by round-tripping manifests through a package manager.
///
/// Holds no state between calls: every lock run resolves and probes afresh.
pub struct Locker {
    backend: Arc<dyn PackageManager>,
    config: LockConfig,
}

impl Locker {
    /// A locker using the backend named in `config`.
    pub fn new(config: LockConfig) -> Result<Self, CoreError> {
        let backend = select_backend(&config.backend, config.executable.as_deref())?;
        Ok(Self {
            backend: Arc::from(backend),
            config,
        })
    }

    pub fn with_backend(backend: Arc<dyn PackageManager>, config: LockConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Lock a conda-style manifest.
    ///
    /// Local entries are left out of the resolution request. Resolved conda
    /// pins are kept only when platform independent, resolved pip pins only
    /// when not local; both are then merged with the declared entries under
    /// the configured policy. Local paths resolve relative to `base_dir`.
    pub fn lock_manifest(
        &self,
        manifest: &Manifest,
        base_dir: &Path,
    ) -> Result<Manifest, CoreError> {
        info!("locking manifest {}", manifest.name().unwrap_or("<unnamed>"));
        let declared_conda = self.declared(&manifest.conda_dependencies(), base_dir)?;
        let declared_pip = self.declared(&manifest.pip_dependencies(), base_dir)?;
        check_interrupt()?;

        let request = manifest.retain_dependencies(|spec| !is_local(spec));
        let resolved = resolve_manifest(self.backend.as_ref(), &request)?;
        check_interrupt()?;

        let channels = if manifest.channels().is_empty() {
            self.config.default_channels.as_slice()
        } else {
            manifest.channels()
        };
        let mut independent = Vec::new();
        for spec in resolved.conda_dependencies() {
            check_interrupt()?;
            if is_local(&spec) {
                continue;
            }
            if is_independent(self.backend.as_ref(), &spec, channels, &self.config.probe) {
                independent.push(Requirement::parse(&spec));
            } else {
                debug!("{spec} is platform specific, not pinning");
            }
        }
        info!(
            "{} of {} resolved conda packages are platform independent",
            independent.len(),
            resolved.conda_dependencies().len()
        );

        let resolved_pip: Vec<Requirement> = resolved
            .pip_dependencies()
            .iter()
            .filter(|spec| !is_local(spec))
            .map(|spec| Requirement::parse(spec))
            .collect();

        let policy = self.config.policy;
        let conda = merge(&declared_conda, &independent, Ecosystem::Conda, policy);
        let pip = merge(&declared_pip, &resolved_pip, Ecosystem::Pip, policy);
        Ok(manifest.with_dependencies(conda, pip))
    }

    /// Parse, lock and re-serialize manifest text.
    pub fn lock_manifest_str(&self, input: &str, base_dir: &Path) -> Result<String, CoreError> {
        let manifest = parse_manifest_str(input)?;
        Ok(self.lock_manifest(&manifest, base_dir)?.to_yaml()?)
    }

    /// Pin a flat pip requirements list.
    ///
    /// The requirements are installed on top of `python` and `pip` (each
    /// optionally pinned) and the export's pip list is returned as is. There is
    /// no platform probing or local-path handling on this path.
    pub fn lock_requirements(
        &self,
        requirements: &str,
        python: Option<&str>,
        pip: Option<&str>,
    ) -> Result<Vec<String>, CoreError> {
        let requirements = parse_requirements(requirements);
        info!("locking {} pip requirements", requirements.len());
        let manifest = pip_manifest(requirements, python, pip);
        let resolved = resolve_manifest(self.backend.as_ref(), &manifest)?;
        check_interrupt()?;
        Ok(resolved.pip_dependencies())
    }

    fn declared(&self, specs: &[String], base_dir: &Path) -> Result<Vec<Requirement>, CoreError> {
        specs
            .iter()
            .map(|spec| {
                if is_local(spec) {
                    let name = package_name(spec, base_dir, &self.config.python)?;
                    debug!("local dependency {spec} is package {name}");
                    Ok(Requirement::local(spec, name))
                } else {
                    Ok(Requirement::parse(spec))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envlock_runtime::mock::{MockBackend, MockCall};
    use envlock_schema::MergePolicy;

    fn locker(backend: &Arc<MockBackend>) -> Locker {
        Locker::with_backend(backend.clone(), LockConfig::default())
    }

    #[test]
    fn new_selects_configured_backend() {
        let config = LockConfig {
            backend: "mock".to_owned(),
            ..LockConfig::default()
        };
        assert!(Locker::new(config).is_ok());

        let config = LockConfig {
            backend: "spack".to_owned(),
            ..LockConfig::default()
        };
        assert!(matches!(Locker::new(config), Err(CoreError::Runtime(_))));
    }

    #[test]
    fn declared_pins_survive_and_specific_packages_are_skipped() {
        let backend = Arc::new(
            MockBackend::new()
                .with_export("dependencies:\n  - numpy=1.24\n  - scipy=1.9\n  - libgcc=13.2\n")
                .with_platforms("libgcc", &["linux-64"]),
        );
        let manifest = parse_manifest_str("dependencies:\n  - numpy=1.20\n  - scipy\n").unwrap();
        let locked = locker(&backend).lock_manifest(&manifest, Path::new(".")).unwrap();
        assert_eq!(locked.conda_dependencies(), ["numpy==1.20", "scipy"]);
    }

    #[test]
    fn resolved_wins_policy_pins_declared_packages() {
        let backend = Arc::new(MockBackend::new().with_export("dependencies:\n  - numpy=1.24\n"));
        let config = LockConfig {
            policy: MergePolicy::ResolvedWins,
            ..LockConfig::default()
        };
        let locker = Locker::with_backend(backend, config);
        let manifest = parse_manifest_str("dependencies:\n  - numpy=1.20\n").unwrap();
        let locked = locker.lock_manifest(&manifest, Path::new(".")).unwrap();
        assert_eq!(locked.conda_dependencies(), ["numpy==1.24"]);
    }

    #[test]
    fn probes_with_default_channels_when_manifest_has_none() {
        let backend = Arc::new(MockBackend::new().with_export("dependencies:\n  - zlib=1.3\n"));
        let manifest = parse_manifest_str("dependencies:\n  - zlib\n").unwrap();
        locker(&backend).lock_manifest(&manifest, Path::new(".")).unwrap();

        let searches: Vec<Vec<String>> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Search { channels, .. } => Some(channels),
                _ => None,
            })
            .collect();
        assert!(!searches.is_empty());
        assert!(searches.iter().all(|c| c == &["defaults"]));
    }

    #[test]
    fn local_entries_are_not_sent_to_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("tools");
        std::fs::create_dir(&pkg).unwrap();
        std::fs::write(pkg.join("pyproject.toml"), "[project]\nname = \"tools\"\n").unwrap();

        let backend = Arc::new(MockBackend::new().with_export(
            "dependencies:\n  - python=3.11\n  - pip:\n      - tools==0.1.0\n      - rich==13.7.0\n",
        ));
        let manifest = parse_manifest_str(
            "dependencies:\n  - python\n  - pip:\n      - -e ./tools\n      - rich\n",
        )
        .unwrap();
        let locked = locker(&backend).lock_manifest(&manifest, dir.path()).unwrap();

        let calls = backend.calls();
        let MockCall::Create { manifest: sent, .. } = &calls[0] else {
            panic!("expected create first");
        };
        assert!(!sent.contains("./tools"), "{sent}");
        assert_eq!(locked.pip_dependencies(), ["-e ./tools", "rich"]);
    }

    #[test]
    fn resolved_pip_pins_are_added() {
        let backend = Arc::new(MockBackend::new().with_export(
            "dependencies:\n  - python=3.11\n  - pip:\n      - requests==2.31.0\n      - idna==3.6\n",
        ));
        let manifest =
            parse_manifest_str("dependencies:\n  - python\n  - pip:\n      - requests\n").unwrap();
        let locked = locker(&backend).lock_manifest(&manifest, Path::new(".")).unwrap();
        assert_eq!(locked.pip_dependencies(), ["requests", "idna==3.6"]);
    }

    #[test]
    fn unresolvable_local_dependency_fails_before_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let manifest =
            parse_manifest_str("dependencies:\n  - pip:\n      - -e ../missing\n").unwrap();
        let err = locker(&backend).lock_manifest(&manifest, dir.path()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Runtime(envlock_runtime::RuntimeError::LocalMetadata { .. })
        ));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn conda_spellings_of_one_name_are_both_kept() {
        let backend = Arc::new(MockBackend::new().with_export(
            "dependencies:\n  - python=3.12\n  - typing-extensions=4.9.0\n  - typing_extensions=4.9.0\n",
        ));
        let manifest = parse_manifest_str("dependencies:\n  - python\n  - typing-extensions\n").unwrap();
        let locked = locker(&backend).lock_manifest(&manifest, Path::new(".")).unwrap();
        assert_eq!(
            locked.conda_dependencies(),
            ["python", "typing-extensions", "typing_extensions==4.9.0"]
        );
    }

    #[test]
    fn resolved_wins_keeps_local_and_direct_references() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("tools");
        std::fs::create_dir(&pkg).unwrap();
        std::fs::write(pkg.join("pyproject.toml"), "[project]\nname = \"tools\"\n").unwrap();

        let backend = Arc::new(MockBackend::new().with_export(
            "dependencies:\n  - python=3.11\n  - pip:\n      - tools==0.1.0\n      - rich==13.7.0\n      - requests==2.31.0\n",
        ));
        let config = LockConfig {
            policy: MergePolicy::ResolvedWins,
            ..LockConfig::default()
        };
        let locker = Locker::with_backend(backend.clone(), config);
        let manifest = parse_manifest_str(
            "dependencies:\n  - python\n  - pip:\n      - -e ./tools\n      - requests @ https://example.org/requests-2.31.0-py3-none-any.whl\n      - rich\n",
        )
        .unwrap();
        let locked = locker.lock_manifest(&manifest, dir.path()).unwrap();
        assert_eq!(
            locked.pip_dependencies(),
            [
                "-e ./tools",
                "requests @ https://example.org/requests-2.31.0-py3-none-any.whl",
                "rich==13.7.0",
            ]
        );

        let calls = backend.calls();
        let MockCall::Create { manifest: sent, .. } = &calls[0] else {
            panic!("expected create first");
        };
        assert!(!sent.contains("example.org"), "{sent}");
    }

    #[test]
    fn resolution_failure_propagates() {
        let backend = Arc::new(MockBackend::new().failing_export());
        let manifest = parse_manifest_str("dependencies:\n  - python\n").unwrap();
        let err = locker(&backend).lock_manifest(&manifest, Path::new(".")).unwrap_err();
        assert!(err.to_string().starts_with("resolution error:"));
    }

    #[test]
    fn requirements_return_export_pip_list() {
        let backend = Arc::new(MockBackend::new().with_export(
            "dependencies:\n  - python=3.11.7\n  - pip=24.0\n  - pip:\n      - requests==2.31.0\n      - urllib3==2.1.0\n",
        ));
        let pinned = locker(&backend)
            .lock_requirements("# web\nrequests\n", Some("3.11"), None)
            .unwrap();
        assert_eq!(pinned, ["requests==2.31.0", "urllib3==2.1.0"]);

        let calls = backend.calls();
        let MockCall::Create { manifest: sent, .. } = &calls[0] else {
            panic!("expected create first");
        };
        let sent = parse_manifest_str(sent).unwrap();
        assert_eq!(sent.conda_dependencies(), ["python==3.11", "pip"]);
        assert_eq!(sent.pip_dependencies(), ["requests"]);
        assert!(!calls.iter().any(|c| matches!(c, MockCall::Search { .. })));
    }

    #[test]
    fn lock_manifest_str_rejects_bad_input() {
        let backend = Arc::new(MockBackend::new());
        let err = locker(&backend)
            .lock_manifest_str("dependencies:\n  - [nested]\n", Path::new("."))
            .unwrap_err();
        assert!(matches!(err, CoreError::Manifest(_)));
        assert!(backend.calls().is_empty());
    }
}
