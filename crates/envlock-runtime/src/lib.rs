//! Package-manager integration for envlock.
//!
//! This crate implements the process boundary: the pluggable `PackageManager`
//! trait with conda/mamba and mock backends, the `EphemeralEnv` guard that
//! always removes its throwaway environment, the resolver gateway that turns a
//! manifest into a fully pinned export, platform-independence probing, local
//! package metadata lookup, and prerequisite checks.

pub mod backend;
pub mod conda;
pub mod env;
pub mod gateway;
pub mod local;
pub mod mock;
pub mod prereq;
pub mod probe;

pub use backend::{select_backend, PackageManager};
pub use env::{random_env, random_env_name, EphemeralEnv};
pub use gateway::{resolve, resolve_manifest};
pub use local::package_name;
pub use prereq::{check_backend_prereqs, format_missing, MissingPrereq};
pub use probe::{is_independent, PlatformTargets};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("package manager invocation failed: {0}")]
    ExecFailed(String),
    #[error("resolution error: {0}")]
    Resolution(String),
    #[error("resolution error: exported environment is not a valid manifest: {0}")]
    Export(#[from] envlock_schema::ManifestError),
    #[error("local dependency error: cannot determine the package name of '{spec}': {reason}")]
    LocalMetadata { spec: String, reason: String },
}
