use crate::backend::PackageManager;
use crate::RuntimeError;
use envlock_schema::{parse_manifest_str, Ecosystem, Requirement};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const MOCK_VERSION: &str = "0.0.0-mock";

/// A call received by [`MockBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create {
        env_name: String,
        manifest_path: PathBuf,
        manifest: String,
    },
    Export {
        env_name: String,
    },
    Remove {
        env_name: String,
    },
    Search {
        query: String,
        platform: String,
        channels: Vec<String>,
    },
}

/// In-process backend that records calls and answers from a script.
///
/// Without a scripted export, exporting an environment echoes the manifest it
/// was created from with every unpinned entry pinned to `0.0.0-mock`.
pub struct MockBackend {
    export: Option<String>,
    fail_create: bool,
    fail_export: bool,
    availability: HashMap<String, Vec<String>>,
    default_available: bool,
    calls: Mutex<Vec<MockCall>>,
    created: Mutex<HashMap<String, String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            export: None,
            fail_create: false,
            fail_export: false,
            availability: HashMap::new(),
            default_available: true,
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(HashMap::new()),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `text` from every export.
    #[must_use]
    pub fn with_export(mut self, text: &str) -> Self {
        self.export = Some(text.to_owned());
        self
    }

    #[must_use]
    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    #[must_use]
    pub fn failing_export(mut self) -> Self {
        self.fail_export = true;
        self
    }

    /// Publish `package` for exactly `platforms` (use `noarch` for universal).
    #[must_use]
    pub fn with_platforms(mut self, package: &str, platforms: &[&str]) -> Self {
        self.availability.insert(
            Requirement::parse(package).key(Ecosystem::Conda),
            platforms.iter().map(|p| (*p).to_owned()).collect(),
        );
        self
    }

    /// Availability answer for packages without an explicit entry.
    #[must_use]
    pub fn with_default_availability(mut self, available: bool) -> Self {
        self.default_available = available;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: MockCall) -> Result<(), RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?
            .push(call);
        Ok(())
    }

    fn echo_export(manifest: &str) -> Result<String, RuntimeError> {
        let manifest = parse_manifest_str(manifest)?;
        let pin = |spec: &String, separator: &str| match Requirement::parse(spec) {
            Requirement::Package {
                name,
                constraint: None,
            } => format!("{name}{separator}{MOCK_VERSION}"),
            _ => spec.clone(),
        };
        let conda = manifest
            .conda_dependencies()
            .iter()
            .map(|s| pin(s, "="))
            .collect();
        let pip = manifest
            .pip_dependencies()
            .iter()
            .map(|s| pin(s, "=="))
            .collect();
        Ok(manifest.with_dependencies(conda, pip).to_yaml()?)
    }
}

impl PackageManager for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn create_env(&self, env_name: &str, manifest_path: &Path) -> Result<(), RuntimeError> {
        let manifest = std::fs::read_to_string(manifest_path)?;
        self.record(MockCall::Create {
            env_name: env_name.to_owned(),
            manifest_path: manifest_path.to_path_buf(),
            manifest: manifest.clone(),
        })?;
        if self.fail_create {
            return Err(RuntimeError::Resolution(
                "mock create failed: constraints are unsatisfiable".to_owned(),
            ));
        }
        self.created
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?
            .insert(env_name.to_owned(), manifest);
        Ok(())
    }

    fn export_env(&self, env_name: &str) -> Result<String, RuntimeError> {
        self.record(MockCall::Export {
            env_name: env_name.to_owned(),
        })?;
        if self.fail_export {
            return Err(RuntimeError::Resolution(format!(
                "mock export failed for '{env_name}'"
            )));
        }
        if let Some(text) = &self.export {
            return Ok(text.clone());
        }
        let created = self
            .created
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?;
        let manifest = created.get(env_name).ok_or_else(|| {
            RuntimeError::Resolution(format!("environment '{env_name}' does not exist"))
        })?;
        Self::echo_export(manifest)
    }

    fn remove_env(&self, env_name: &str) -> Result<(), RuntimeError> {
        self.record(MockCall::Remove {
            env_name: env_name.to_owned(),
        })?;
        self.created
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?
            .remove(env_name);
        Ok(())
    }

    fn search(&self, query: &str, platform: &str, channels: &[String]) -> bool {
        let _ = self.record(MockCall::Search {
            query: query.to_owned(),
            platform: platform.to_owned(),
            channels: channels.to_vec(),
        });
        let key = Requirement::parse(query).key(Ecosystem::Conda);
        self.availability
            .get(&key)
            .map_or(self.default_available, |platforms| {
                platforms.iter().any(|p| p == platform)
            })
    }
}
