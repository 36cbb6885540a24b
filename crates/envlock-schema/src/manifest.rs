use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CHANNELS_KEY: &str = "channels";
pub const DEPENDENCIES_KEY: &str = "dependencies";
pub const PIP_KEY: &str = "pip";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to serialize manifest: {0}")]
    Serialize(serde_yaml::Error),
    #[error("manifest error: top-level document must be a mapping")]
    NotAMapping,
    #[error("manifest error: top-level keys must be strings, found {0}")]
    NonStringKey(String),
    #[error("manifest error: 'channels' must be a list of strings")]
    InvalidChannels,
    #[error("manifest error: 'dependencies' must be a list")]
    InvalidDependencies,
    #[error("manifest error: invalid dependency entry #{index}: {reason}")]
    InvalidDependency { index: usize, reason: String },
    #[error("manifest error: more than one pip sub-list in 'dependencies'")]
    DuplicatePipSection,
}

/// One item of the `dependencies` list: a bare spec string, or the single
/// `{pip: [...]}` sub-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    Spec(String),
    Pip { pip: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
enum Section {
    Channels(Vec<String>),
    Dependencies(Vec<DependencyEntry>),
    Other(String, Value),
}

/// A conda-style environment manifest.
///
/// Top-level keys keep their original order. `channels` and `dependencies`
/// are validated and typed; every other key is carried through verbatim so
/// the serialized output only differs where dependencies were rewritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    sections: Vec<Section>,
}

impl Manifest {
    /// A manifest holding nothing but a `dependencies` list.
    pub fn from_dependencies(entries: Vec<DependencyEntry>) -> Self {
        Self {
            sections: vec![Section::Dependencies(entries)],
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        let Value::Mapping(mapping) = value else {
            return Err(ManifestError::NotAMapping);
        };

        let mut sections = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let Value::String(key) = key else {
                return Err(ManifestError::NonStringKey(describe(&key)));
            };
            let section = match key.as_str() {
                CHANNELS_KEY => Section::Channels(parse_channels(value)?),
                DEPENDENCIES_KEY => Section::Dependencies(parse_dependencies(value)?),
                _ => Section::Other(key, value),
            };
            sections.push(section);
        }
        Ok(Self { sections })
    }

    /// The `name` key, when present and a string.
    pub fn name(&self) -> Option<&str> {
        self.sections.iter().find_map(|s| match s {
            Section::Other(key, Value::String(name)) if key == "name" => Some(name.as_str()),
            _ => None,
        })
    }

    /// Channels in priority order. Empty when the key is absent.
    pub fn channels(&self) -> &[String] {
        self.sections
            .iter()
            .find_map(|s| match s {
                Section::Channels(channels) => Some(channels.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn has_dependencies(&self) -> bool {
        self.sections
            .iter()
            .any(|s| matches!(s, Section::Dependencies(_)))
    }

    pub fn dependencies(&self) -> &[DependencyEntry] {
        self.sections
            .iter()
            .find_map(|s| match s {
                Section::Dependencies(entries) => Some(entries.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Plain (non-pip) dependency specs, in declaration order.
    pub fn conda_dependencies(&self) -> Vec<String> {
        self.dependencies()
            .iter()
            .filter_map(|entry| match entry {
                DependencyEntry::Spec(spec) => Some(spec.clone()),
                DependencyEntry::Pip { .. } => None,
            })
            .collect()
    }

    /// Specs of the pip sub-list, empty when there is none.
    pub fn pip_dependencies(&self) -> Vec<String> {
        self.dependencies()
            .iter()
            .find_map(|entry| match entry {
                DependencyEntry::Pip { pip } => Some(pip.clone()),
                DependencyEntry::Spec(_) => None,
            })
            .unwrap_or_default()
    }

    /// Return a copy with the `dependencies` list replaced in place.
    ///
    /// The pip sub-list is appended after the plain specs and omitted when
    /// empty. A manifest without a `dependencies` key is returned unchanged.
    #[must_use]
    pub fn with_dependencies(&self, conda: Vec<String>, pip: Vec<String>) -> Self {
        let mut entries: Vec<DependencyEntry> =
            conda.into_iter().map(DependencyEntry::Spec).collect();
        if !pip.is_empty() {
            entries.push(DependencyEntry::Pip { pip });
        }

        let mut replacement = Some(entries);
        let sections = self
            .sections
            .iter()
            .map(|section| match section {
                Section::Dependencies(_) => {
                    Section::Dependencies(replacement.take().unwrap_or_default())
                }
                other => other.clone(),
            })
            .collect();
        Self { sections }
    }

    /// Return a copy keeping only the specs (plain and pip) accepted by `keep`.
    #[must_use]
    pub fn retain_dependencies(&self, keep: impl Fn(&str) -> bool) -> Self {
        let conda = self
            .conda_dependencies()
            .into_iter()
            .filter(|spec| keep(spec))
            .collect();
        let pip = self
            .pip_dependencies()
            .into_iter()
            .filter(|spec| keep(spec))
            .collect();
        self.with_dependencies(conda, pip)
    }

    /// Canonical YAML rendering. Key order is preserved, never sorted, and
    /// block sequences are indented under their key as conda writes them.
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        let text = serde_yaml::to_string(self).map_err(ManifestError::Serialize)?;
        Ok(indent_sequences(&text))
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            match section {
                Section::Channels(channels) => map.serialize_entry(CHANNELS_KEY, channels)?,
                Section::Dependencies(entries) => map.serialize_entry(DEPENDENCIES_KEY, entries)?,
                Section::Other(key, value) => map.serialize_entry(key, value)?,
            }
        }
        map.end()
    }
}

fn parse_channels(value: Value) -> Result<Vec<String>, ManifestError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(channel) => Ok(channel),
                _ => Err(ManifestError::InvalidChannels),
            })
            .collect(),
        _ => Err(ManifestError::InvalidChannels),
    }
}

fn parse_dependencies(value: Value) -> Result<Vec<DependencyEntry>, ManifestError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        _ => return Err(ManifestError::InvalidDependencies),
    };

    let mut entries = Vec::with_capacity(items.len());
    let mut seen_pip = false;
    for (index, item) in items.into_iter().enumerate() {
        let entry = match item {
            Value::String(spec) => DependencyEntry::Spec(spec),
            Value::Mapping(mapping) => {
                let pip = parse_pip_section(index, mapping)?;
                if seen_pip {
                    return Err(ManifestError::DuplicatePipSection);
                }
                seen_pip = true;
                DependencyEntry::Pip { pip }
            }
            other => {
                return Err(ManifestError::InvalidDependency {
                    index,
                    reason: format!("expected a string or a pip mapping, found {}", describe(&other)),
                })
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_pip_section(index: usize, mapping: Mapping) -> Result<Vec<String>, ManifestError> {
    let invalid = |reason: &str| ManifestError::InvalidDependency {
        index,
        reason: reason.to_owned(),
    };

    if mapping.len() != 1 {
        return Err(invalid("a nested mapping must have exactly one key, 'pip'"));
    }
    let Some(value) = mapping.get(PIP_KEY) else {
        return Err(invalid("the only nested mapping allowed is 'pip'"));
    };
    let Value::Sequence(items) = value else {
        return Err(invalid("'pip' must be a list of strings"));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(spec) => Ok(spec.clone()),
            _ => Err(invalid("'pip' must be a list of strings")),
        })
        .collect()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string '{s}'"),
        Value::Sequence(_) => "a list".to_owned(),
        Value::Mapping(_) => "a mapping".to_owned(),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}

/// Column where the content of `line` starts, after any `- ` item markers.
fn content_column(line: &str) -> usize {
    let mut rest = line.trim_start();
    let mut column = line.len() - rest.len();
    while let Some(item) = rest.strip_prefix("- ") {
        column += 2;
        rest = item;
    }
    column
}

/// Column the content of a block scalar must exceed, when `line` opens one.
fn block_scalar_owner(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let (head, token) = line.rsplit_once(' ').unwrap_or(("", line));
    let is_header = token.starts_with(['|', '>'])
        && token.len() <= 3
        && token[1..].chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-');
    if !is_header {
        return None;
    }
    let column = content_column(line);
    if head.ends_with(':') {
        Some(column)
    } else if line.len() - token.len() == column {
        // `- |`: the item itself is the scalar
        Some(column.saturating_sub(1))
    } else {
        None
    }
}

/// Re-indent serde_yaml output so block sequences that are mapping values
/// sit two columns right of their key (`key:\n  - a`) instead of level with it.
fn indent_sequences(yaml: &str) -> String {
    struct Sequence {
        column: usize,
        shift: usize,
    }

    let mut open: Vec<Sequence> = Vec::new();
    let mut key_column: Option<usize> = None;
    let mut scalar_owner: Option<usize> = None;
    let mut out = String::with_capacity(yaml.len() + yaml.len() / 4);

    for line in yaml.lines() {
        let rest = line.trim_start();
        let column = line.len() - rest.len();

        if let Some(owner) = scalar_owner {
            if rest.is_empty() || column > owner {
                let shift: usize = open.iter().map(|s| s.shift).sum();
                if !rest.is_empty() {
                    out.push_str(&" ".repeat(shift));
                }
                out.push_str(line);
                out.push('\n');
                continue;
            }
            scalar_owner = None;
        }

        let is_item = rest == "-" || rest.starts_with("- ");
        while let Some(top) = open.last() {
            if column < top.column || (column == top.column && !is_item) {
                open.pop();
            } else {
                break;
            }
        }
        if is_item && open.last().map_or(true, |top| top.column != column) {
            let shift = if key_column == Some(column) { 2 } else { 0 };
            open.push(Sequence { column, shift });
        }

        let shift: usize = open.iter().map(|s| s.shift).sum();
        out.push_str(&" ".repeat(shift));
        out.push_str(line);
        out.push('\n');

        key_column = line.trim_end().ends_with(':').then(|| content_column(line));
        scalar_owner = block_scalar_owner(line);
    }
    out
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    let value: Value = serde_yaml::from_str(input)?;
    Manifest::from_value(value)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
