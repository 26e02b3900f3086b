//! Scripts and patterns documents.
//!
//! Loading is two-phase: the JSON documents are deserialized into raw serde
//! records, then validated into the immutable domain types the harness runs
//! on ([`ScriptSpec`], [`PatternSet`]). Map order in both documents is
//! preserved (`serde_json` is built with `preserve_order`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

// ---------------------------------------------------------------------------
// Raw documents
// ---------------------------------------------------------------------------

/// The scripts document: `{"scripts": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptsDocument {
    #[serde(default)]
    pub scripts: Vec<RawScript>,
}

/// One entry of the scripts document, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScript {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub default_arguments: Option<Vec<String>>,
    #[serde(default)]
    pub extra_arguments: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
}

/// The patterns document: `{"result_patterns": {...}, "error_patterns": {...}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternsDocument {
    #[serde(default)]
    pub result_patterns: Map<String, Value>,
    #[serde(default)]
    pub error_patterns: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// One sweep point: flag name to value, in document order.
///
/// An empty value denotes a bare (boolean-style) flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentSet {
    entries: Vec<(String, String)>,
}

impl ArgumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair. A repeated key replaces the earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ArgumentSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ArgumentSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl fmt::Display for ArgumentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", k, v)?;
        }
        f.write_str("}")
    }
}

/// A benchmark program and its sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSpec {
    /// Report label (`Model` column).
    pub name: String,

    /// Executable or script location.
    pub path: PathBuf,

    /// Optional launcher, e.g. `python`; the command becomes `interpreter path args...`.
    pub interpreter: Option<String>,

    /// Base invocation tokens. Empty means the script is skipped.
    pub default_arguments: Vec<String>,

    /// Sweep points, in document order.
    pub extra_arguments: Vec<ArgumentSet>,

    /// Environment overlay applied to every execution of this script.
    pub env: BTreeMap<String, String>,
}

impl ScriptSpec {
    /// Validate a raw document entry.
    pub fn from_raw(raw: RawScript) -> ConfigResult<Self> {
        let mut extra_arguments = Vec::new();
        for raw_set in raw.extra_arguments.unwrap_or_default() {
            let mut set = ArgumentSet::new();
            for (key, value) in raw_set {
                let value = argument_value(&value).ok_or_else(|| {
                    ConfigError::InvalidArgumentValue {
                        script: raw.name.clone(),
                        key: key.clone(),
                    }
                })?;
                set.insert(key, value);
            }
            extra_arguments.push(set);
        }

        Ok(Self {
            name: raw.name,
            path: PathBuf::from(raw.path),
            interpreter: raw.interpreter.filter(|i| !i.is_empty()),
            default_arguments: raw.default_arguments.unwrap_or_default(),
            extra_arguments,
            env: raw.env.unwrap_or_default(),
        })
    }

    /// Number of executions this script contributes (at least one).
    pub fn sweep_len(&self) -> usize {
        self.extra_arguments.len().max(1)
    }
}

/// Render a JSON extra-argument value as a command-line token.
fn argument_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// A named regular expression with exactly one capturing group.
#[derive(Debug, Clone)]
pub struct Pattern {
    name: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source`, rejecting anything without exactly one capturing group.
    pub fn compile(name: impl Into<String>, source: &str) -> ConfigResult<Self> {
        let name = name.into();
        let regex = Regex::new(source).map_err(|source| ConfigError::InvalidPattern {
            name: name.clone(),
            source,
        })?;
        // captures_len counts the implicit whole-match group.
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(ConfigError::CaptureGroups { name, groups });
        }
        Ok(Self { name, regex })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Result and error patterns, each in configured order.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    pub result_patterns: Vec<Pattern>,
    pub error_patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Validate a raw patterns document.
    pub fn from_document(doc: PatternsDocument) -> ConfigResult<Self> {
        Ok(Self {
            result_patterns: compile_all(doc.result_patterns)?,
            error_patterns: compile_all(doc.error_patterns)?,
        })
    }

    /// Result pattern names, in configured order.
    pub fn result_names(&self) -> impl Iterator<Item = &str> {
        self.result_patterns.iter().map(Pattern::name)
    }

    pub fn result_pattern(&self, name: &str) -> Option<&Pattern> {
        self.result_patterns.iter().find(|p| p.name() == name)
    }

    pub fn error_pattern(&self, name: &str) -> Option<&Pattern> {
        self.error_patterns.iter().find(|p| p.name() == name)
    }
}

fn compile_all(map: Map<String, Value>) -> ConfigResult<Vec<Pattern>> {
    map.into_iter()
        .map(|(name, value)| match value {
            Value::String(source) => Pattern::compile(name, &source),
            _ => Err(ConfigError::PatternNotString { name }),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse a scripts document already held in memory. `origin` is only used
/// in error messages.
pub fn parse_scripts(content: &str, origin: &Path) -> ConfigResult<Vec<ScriptSpec>> {
    let doc: ScriptsDocument =
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
    doc.scripts.into_iter().map(ScriptSpec::from_raw).collect()
}

/// Parse a patterns document already held in memory.
pub fn parse_patterns(content: &str, origin: &Path) -> ConfigResult<PatternSet> {
    let doc: PatternsDocument =
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
    PatternSet::from_document(doc)
}

/// Load and validate the scripts document at `path`.
pub fn load_scripts(path: &Path) -> ConfigResult<Vec<ScriptSpec>> {
    let content = read(path)?;
    parse_scripts(&content, path)
}

/// Load and validate the patterns document at `path`.
pub fn load_patterns(path: &Path) -> ConfigResult<PatternSet> {
    let content = read(path)?;
    parse_patterns(&content, path)
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
