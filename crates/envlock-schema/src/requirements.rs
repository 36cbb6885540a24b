//! Flat pip requirements lists and the manifest synthesized around them.

use crate::manifest::{DependencyEntry, Manifest};

/// Requirement lines of a requirements file, without comments or blank lines.
pub fn parse_requirements(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim_start().starts_with('#') && !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

/// A minimal manifest that installs `requirements` with pip on top of an
/// interpreter and pip, each optionally pinned.
pub fn pip_manifest(requirements: Vec<String>, python: Option<&str>, pip: Option<&str>) -> Manifest {
    let pinned = |name: &str, version: Option<&str>| match version {
        Some(v) => format!("{name}=={v}"),
        None => name.to_owned(),
    };
    Manifest::from_dependencies(vec![
        DependencyEntry::Spec(pinned("python", python)),
        DependencyEntry::Spec(pinned("pip", pip)),
        DependencyEntry::Pip { pip: requirements },
    ])
}
