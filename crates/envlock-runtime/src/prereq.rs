use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    if name.contains('/') {
        return std::path::Path::new(name).is_file();
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check that the executable behind `backend` can be found.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_backend_prereqs(backend: &str, executable: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if backend == "mock" {
        return missing;
    }

    if !command_exists(executable) {
        missing.push(MissingPrereq {
            name: executable.to_owned(),
            purpose: "creating, exporting and searching conda environments",
            install_hint: "install Miniforge (https://conda-forge.org/download/) or pass --backend/--executable",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nenvlock resolves dependencies by running a real package manager.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "conda".to_owned(),
            purpose: "resolving environments",
            install_hint: "install Miniforge",
        };
        let s = format!("{m}");
        assert!(s.contains("conda"));
        assert!(s.contains("resolving environments"));
        assert!(s.contains("install Miniforge"));
    }

    #[test]
    fn mock_backend_needs_nothing() {
        assert!(check_backend_prereqs("mock", "envlock-test-no-such-conda").is_empty());
    }

    #[test]
    fn absent_executable_is_reported() {
        let missing = check_backend_prereqs("conda", "/nonexistent/bin/conda");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "/nonexistent/bin/conda");
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![MissingPrereq {
            name: "mamba".to_owned(),
            purpose: "resolution",
            install_hint: "install Miniforge",
        }];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("mamba"));
    }
}
