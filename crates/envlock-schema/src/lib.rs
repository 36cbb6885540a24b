//! Manifest codec, dependency specs, and the merge engine for envlock.
//!
//! This crate is the pure layer: YAML environment manifests (`Manifest`),
//! dependency spec parsing and local-path classification (`Requirement`,
//! `is_local`), the declared/resolved merge (`merge`), and helpers for flat
//! pip requirements lists. Nothing here spawns processes or touches the
//! network.

pub mod manifest;
pub mod merge;
pub mod requirements;
pub mod spec;

pub use manifest::{
    parse_manifest_file, parse_manifest_str, DependencyEntry, Manifest, ManifestError,
};
pub use merge::{merge, MergePolicy};
pub use requirements::{parse_requirements, pip_manifest};
pub use spec::{is_local, normalize_name, strip_editable, Constraint, Ecosystem, Requirement};
