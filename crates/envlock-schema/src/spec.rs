//! Dependency spec strings: name extraction, version constraints, and
//! classification of local (path or editable) entries.

const EDITABLE_FLAGS: &[&str] = &["-e", "--editable"];
const INCLUDE_FLAGS: &[&str] = &["-r", "--requirement"];

/// Characters that end the package name in a spec.
fn ends_name(c: char) -> bool {
    matches!(c, '=' | '<' | '>' | '!' | '~' | ';') || c.is_whitespace()
}

/// Argument of `flag <arg>` when `spec` starts with one of `flags`.
fn flag_argument<'a>(spec: &'a str, flags: &[&str]) -> Option<&'a str> {
    flags.iter().find_map(|flag| {
        let rest = spec.strip_prefix(flag)?;
        rest.starts_with(char::is_whitespace).then_some(rest.trim())
    })
}

/// `-r <file>` / `--requirement <file>`: a reference to another manifest.
pub fn is_requirements_include(spec: &str) -> bool {
    flag_argument(spec.trim(), INCLUDE_FLAGS).is_some()
}

pub fn is_editable(spec: &str) -> bool {
    flag_argument(spec.trim(), EDITABLE_FLAGS).is_some()
}

/// Whether a spec points at the filesystem instead of a published package.
///
/// Editable installs, parent-directory references and anything containing a
/// path separator are local. Requirements-file includes never are, and
/// neither are other installer options (`--index-url`, `--find-links`).
pub fn is_local(spec: &str) -> bool {
    let spec = spec.trim();
    if is_editable(spec) {
        return true;
    }
    if is_requirements_include(spec) || spec.starts_with('-') {
        return false;
    }
    spec.contains("..") || spec.contains('/') || spec.contains('\\')
}

/// The location part of a local spec, without the editable flag.
pub fn strip_editable(spec: &str) -> &str {
    let spec = spec.trim();
    flag_argument(spec, EDITABLE_FLAGS).unwrap_or(spec)
}

/// Which installer a dependency list belongs to. Decides how names compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ecosystem {
    /// Conda names compare literally: `typing-extensions` and
    /// `typing_extensions` are two packages.
    Conda,
    /// pip names compare case-insensitively with `_` and `.` equal to `-`.
    Pip,
}

/// Package name without a channel prefix (`conda-forge::`) or a bracketed
/// suffix (pip extras, conda match-spec options).
fn bare_name(name: &str) -> &str {
    let name = name.rsplit_once("::").map_or(name, |(_, n)| n);
    name.split_once('[').map_or(name, |(n, _)| n).trim()
}

/// Normalized pip lookup key for a package name.
///
/// Channel prefixes and extras (`[socks]`) are dropped, case is folded, and
/// `_`/`.` compare equal to `-`.
pub fn normalize_name(name: &str) -> String {
    bare_name(name)
        .chars()
        .map(|c| match c {
            '_' | '.' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Version constraint attached to a package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `name=1.2`, `name==1.2`; a trailing conda build string is dropped.
    Exact(String),
    /// Any other constraint, kept exactly as written (including leading
    /// whitespace) so it re-renders unchanged.
    Other(String),
}

/// A parsed dependency entry, ready for merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// A published package, optionally constrained.
    Package {
        name: String,
        constraint: Option<Constraint>,
    },
    /// A path or editable entry whose package name came from local metadata.
    Local { name: String, spec: String },
    /// An installer option such as `-r base.txt` or `--index-url ...`.
    Directive(String),
}

impl Requirement {
    /// Parse a registry spec. Local specs need [`Requirement::local`], since
    /// their name cannot be read from the text.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.starts_with('-') {
            return Self::Directive(spec.to_owned());
        }

        let split = spec.find(ends_name).unwrap_or(spec.len());
        let (name, rest) = spec.split_at(split);
        let constraint = if rest.is_empty() {
            None
        } else {
            Some(parse_constraint(rest))
        };
        Self::Package {
            name: name.to_owned(),
            constraint,
        }
    }

    pub fn local(spec: &str, name: impl Into<String>) -> Self {
        Self::Local {
            name: name.into(),
            spec: spec.trim().to_owned(),
        }
    }

    /// Key under which two entries of `ecosystem` count as the same
    /// dependency.
    pub fn key(&self, ecosystem: Ecosystem) -> String {
        match (self, ecosystem) {
            (Self::Package { name, .. } | Self::Local { name, .. }, Ecosystem::Pip) => {
                normalize_name(name)
            }
            (Self::Package { name, .. } | Self::Local { name, .. }, Ecosystem::Conda) => {
                bare_name(name).to_owned()
            }
            (Self::Directive(raw), _) => raw.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Package { name, .. } | Self::Local { name, .. } => name,
            Self::Directive(raw) => raw,
        }
    }

    /// Pinned version, if the entry carries an exact one.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Package {
                constraint: Some(Constraint::Exact(version)),
                ..
            } => Some(version),
            _ => None,
        }
    }

    /// Spec text for the output manifest: `name==version` for pins, the bare
    /// name when unconstrained, and local or directive entries verbatim.
    pub fn render(&self) -> String {
        match self {
            Self::Package {
                name,
                constraint: None,
            } => name.clone(),
            Self::Package {
                name,
                constraint: Some(Constraint::Exact(version)),
            } => format!("{name}=={version}"),
            Self::Package {
                name,
                constraint: Some(Constraint::Other(raw)),
            } => format!("{name}{raw}"),
            Self::Local { spec, .. } => spec.clone(),
            Self::Directive(raw) => raw.clone(),
        }
    }
}

fn parse_constraint(rest: &str) -> Constraint {
    let Some(pinned) = rest.strip_prefix('=') else {
        return Constraint::Other(rest.to_owned());
    };
    let pinned = pinned.trim_start_matches('=');
    let version = pinned.split('=').next().unwrap_or_default();
    if version.is_empty() || version.contains(&[';', ',', ' ', '<', '>', '!'][..]) {
        return Constraint::Other(rest.to_owned());
    }
    Constraint::Exact(version.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editable_and_relative_paths_are_local() {
        assert!(is_local("-e ../foo"));
        assert!(is_local("../foo/bar"));
        assert!(is_local("C:\\foo\\bar"));
        assert!(is_local("-e ."));
        assert!(is_local("--editable ./pkg"));
        assert!(is_local("./dist/tool-1.0-py3-none-any.whl"));
    }

    #[test]
    fn requirement_includes_are_never_local() {
        assert!(!is_local("-r base.txt"));
        assert!(!is_local("-r ../shared/base.txt"));
        assert!(!is_local("--requirement ../base.txt"));
    }

    #[test]
    fn installer_options_are_not_local() {
        assert!(!is_local("--index-url https://example.org/simple"));
        assert!(!is_local("--find-links ../wheels"));
    }

    #[test]
    fn registry_specs_are_not_local() {
        assert!(!is_local("numpy==1.2"));
        assert!(!is_local("numpy"));
        assert!(!is_local("python=3.11"));
        assert!(!is_local("-e"));
    }

    #[test]
    fn strip_editable_leaves_location() {
        assert_eq!(strip_editable("-e ../foo"), "../foo");
        assert_eq!(strip_editable("  --editable   ./x "), "./x");
        assert_eq!(strip_editable("../foo"), "../foo");
    }

    #[test]
    fn parses_conda_and_pip_pins() {
        assert_eq!(Requirement::parse("numpy=1.20").version(), Some("1.20"));
        assert_eq!(Requirement::parse("numpy==1.20").version(), Some("1.20"));
        assert_eq!(Requirement::parse("numpy=1.20=py311_0").version(), Some("1.20"));
        assert_eq!(Requirement::parse("numpy==1.20").name(), "numpy");
    }

    #[test]
    fn bare_name_has_no_version() {
        let req = Requirement::parse("requests");
        assert_eq!(req.name(), "requests");
        assert_eq!(req.version(), None);
        assert_eq!(req.render(), "requests");
    }

    #[test]
    fn ranges_render_unchanged() {
        for spec in ["numpy>=1.2,<2", "attrs~=23.1", "scipy 1.11.*", "six!=1.0", "numpy==1.2; python_version<'3.8'"] {
            let req = Requirement::parse(spec);
            assert_eq!(req.version(), None, "{spec}");
            assert_eq!(req.render(), spec);
        }
    }

    #[test]
    fn pins_render_with_double_equals() {
        assert_eq!(Requirement::parse("certifi=2024.1").render(), "certifi==2024.1");
    }

    #[test]
    fn directives_pass_through() {
        let req = Requirement::parse("--index-url https://example.org/simple");
        assert_eq!(req.render(), "--index-url https://example.org/simple");
        assert_eq!(req.key(Ecosystem::Pip), "--index-url https://example.org/simple");
    }

    #[test]
    fn local_requirement_renders_original_spec() {
        let req = Requirement::local("-e ../tools ", "my-tools");
        assert_eq!(req.key(Ecosystem::Pip), "my-tools");
        assert_eq!(req.render(), "-e ../tools");
    }

    #[test]
    fn pip_keys_are_normalized() {
        let key = |spec: &str| Requirement::parse(spec).key(Ecosystem::Pip);
        assert_eq!(key("PyYAML==6.0"), "pyyaml");
        assert_eq!(key("typing_extensions"), "typing-extensions");
        assert_eq!(key("requests[socks]==2.31"), "requests");
    }

    #[test]
    fn conda_keys_are_literal_names() {
        let key = |spec: &str| Requirement::parse(spec).key(Ecosystem::Conda);
        assert_eq!(key("conda-forge::numpy=1.26"), "numpy");
        assert_eq!(key("typing_extensions=4.9.0"), "typing_extensions");
        assert_eq!(key("typing-extensions=4.9.0"), "typing-extensions");
        assert_eq!(key("ruamel.yaml=0.17"), "ruamel.yaml");
    }
}
