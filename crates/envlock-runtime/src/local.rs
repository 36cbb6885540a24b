//! Package names of local (path or editable) dependencies.
//!
//! Sources are tried in order: the name of a `name @ url` direct reference,
//! an `#egg=` fragment, a wheel or sdist file name, `pyproject.toml`,
//! `setup.cfg`, and finally `setup.py --name`.

use crate::RuntimeError;
use envlock_schema::strip_editable;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

const SDIST_SUFFIXES: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz", ".zip", ".tgz"];

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: Option<NameTable>,
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    poetry: Option<NameTable>,
}

#[derive(Debug, Default, Deserialize)]
struct NameTable {
    #[serde(default)]
    name: Option<String>,
}

/// Package name declared by the local dependency `spec`.
///
/// Relative locations are taken from `base_dir`. `python` is the interpreter
/// used for `setup.py --name` when no static metadata names the package.
pub fn package_name(spec: &str, base_dir: &Path, python: &str) -> Result<String, RuntimeError> {
    let error = |reason: String| RuntimeError::LocalMetadata {
        spec: spec.trim().to_owned(),
        reason,
    };

    let location = strip_editable(spec);
    if let Some(name) = direct_reference_name(location) {
        return Ok(name.to_owned());
    }
    if let Some(name) = egg_fragment(location) {
        return Ok(name.to_owned());
    }

    let location = location.strip_prefix("file://").unwrap_or(location);
    let location = location.split(['#', '?']).next().unwrap_or(location);
    let path = if Path::new(location).is_absolute() {
        PathBuf::from(location)
    } else {
        base_dir.join(location)
    };
    debug!("reading local metadata of {spec} from {}", path.display());

    if path.is_file() {
        return archive_name(&path)
            .ok_or_else(|| error(format!("{} is not a wheel or sdist archive", path.display())));
    }
    if !path.is_dir() {
        return Err(error(format!("{} does not exist", path.display())));
    }

    if let Some(name) = pyproject_name(&path).map_err(error)? {
        return Ok(name);
    }
    if let Some(name) = setup_cfg_name(&path).map_err(error)? {
        return Ok(name);
    }
    if path.join("setup.py").is_file() {
        return setup_py_name(&path, python).map_err(error);
    }
    Err(error(format!(
        "no pyproject.toml, setup.cfg or setup.py in {}",
        path.display()
    )))
}

fn direct_reference_name(location: &str) -> Option<&str> {
    let (name, url) = location.split_once('@')?;
    let name = name.split_once('[').map_or(name, |(n, _)| n).trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    (valid && url.contains("://")).then_some(name)
}

fn egg_fragment(location: &str) -> Option<&str> {
    let (_, fragment) = location.split_once('#')?;
    fragment
        .split('&')
        .find_map(|part| part.strip_prefix("egg="))
        .filter(|name| !name.is_empty())
}

fn archive_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if let Some(stem) = file_name.strip_suffix(".whl") {
        return stem.split('-').next().map(str::to_owned);
    }
    SDIST_SUFFIXES.iter().find_map(|suffix| {
        let stem = file_name.strip_suffix(suffix)?;
        stem.rsplit_once('-').map(|(name, _)| name.to_owned())
    })
}

fn pyproject_name(dir: &Path) -> Result<Option<String>, String> {
    let path = dir.join("pyproject.toml");
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    let pyproject: PyProject =
        toml::from_str(&content).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(pyproject
        .project
        .and_then(|p| p.name)
        .or_else(|| pyproject.tool.and_then(|t| t.poetry).and_then(|p| p.name)))
}

fn setup_cfg_name(dir: &Path) -> Result<Option<String>, String> {
    let path = dir.join("setup.cfg");
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))?;

    let mut in_metadata = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_metadata = line == "[metadata]";
            continue;
        }
        if !in_metadata || line.starts_with(['#', ';']) {
            continue;
        }
        if let Some((key, value)) = line.split_once(['=', ':']) {
            if key.trim() == "name" && !value.trim().is_empty() {
                return Ok(Some(value.trim().to_owned()));
            }
        }
    }
    Ok(None)
}

fn setup_py_name(dir: &Path, python: &str) -> Result<String, String> {
    debug!("running {python} setup.py --name in {}", dir.display());
    let output = Command::new(python)
        .args(["setup.py", "--name"])
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("{python} setup.py --name: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "'{python} setup.py --name' exited with {}",
            output.status
        ));
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| "'setup.py --name' printed nothing".to_owned())
}
