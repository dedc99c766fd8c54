//! Layered settings.
//!
//! A [`Config`] is built from three layers, later layers winning:
//!
//! 1. caller-supplied defaults
//! 2. the first config file found (TOML, YAML, JSON, INI or `.env`)
//! 3. `MYGIS_*` environment variables
//!
//! Values are kept as JSON so that nested tables from structured formats
//! survive and `mygis config show` can print them unchanged.

use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of environment variables that override file values.
pub const DEFAULT_ENV_PREFIX: &str = "MYGIS_";

/// Files probed, in order, when no explicit paths are given.
pub const DEFAULT_SEARCH_ORDER: &[&str] = &[
    "mygis.toml",
    "mygis.yaml",
    "mygis.yml",
    "mygis.json",
    "mygis.ini",
    ".env",
];

/// Name of the table (or INI section) that scopes mygis settings inside a
/// shared config file.
const SCOPE_TABLE: &str = "mygis";

/// Options for [`load_config`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Values used when neither the file nor the environment sets a key.
    pub defaults: Map<String, Value>,
    /// Candidate files; the first existing one is read. `None` probes
    /// [`DEFAULT_SEARCH_ORDER`] in the working directory.
    pub paths: Option<Vec<PathBuf>>,
    pub env_prefix: String,
    /// Let environment variables override file values and defaults.
    pub env_override: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            defaults: Map::new(),
            paths: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env_override: true,
        }
    }
}

/// Effective settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    data: Map<String, Value>,
    source: Option<PathBuf>,
}

impl Config {
    /// Wraps an existing map (no file source).
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data, source: None }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// A scalar value rendered as a string. Numbers and booleans are
    /// formatted; tables, arrays and null give `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A boolean, accepting `1/true/yes/on` (case-insensitive) for strings
    /// and non-zero for numbers.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.data.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(is_truthy(s)),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.data.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The file the settings were read from; `None` when no file was found
    /// or the one found was skipped.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The effective settings as a JSON object.
    pub fn as_json(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

/// What happened to the config file during [`load_config_with_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// No candidate file exists.
    NotFound,
    Loaded { path: PathBuf, keys: usize },
    /// The file exists but could not be read or parsed.
    Skipped { path: PathBuf, reason: String },
}

impl FileOutcome {
    /// Emits the outcome as a log event.
    pub fn log(&self) {
        match self {
            FileOutcome::NotFound => debug!("No config file found"),
            FileOutcome::Loaded { path, keys } => {
                info!(path = %path.display(), keys, "Loaded config file");
            }
            FileOutcome::Skipped { path, reason } => {
                warn!(path = %path.display(), error = %reason, "Ignoring unreadable config file");
            }
        }
    }
}

/// Loads settings from defaults, the first config file found and the
/// environment, logging what happened to the file.
///
/// A file that cannot be read or parsed is logged and skipped; loading
/// itself never fails.
pub fn load_config(options: &LoadOptions) -> Config {
    let (config, outcome) = load_config_with_outcome(options);
    outcome.log();
    config
}

/// Like [`load_config`], but returns the file outcome instead of logging
/// it, for callers that install logging only after reading the config.
pub fn load_config_with_outcome(options: &LoadOptions) -> (Config, FileOutcome) {
    let mut data = options.defaults.clone();

    let candidates: Vec<PathBuf> = match &options.paths {
        Some(paths) => paths.clone(),
        None => DEFAULT_SEARCH_ORDER.iter().map(PathBuf::from).collect(),
    };

    let outcome = match candidates.into_iter().find(|p| p.is_file()) {
        None => FileOutcome::NotFound,
        Some(path) => match read_file(&path) {
            Ok(file_layer) => {
                let keys = file_layer.len();
                deep_merge(&mut data, file_layer);
                FileOutcome::Loaded { path, keys }
            }
            Err(e) => FileOutcome::Skipped {
                path,
                reason: e.to_string(),
            },
        },
    };

    if options.env_override {
        apply_env(&mut data, &options.env_prefix, std::env::vars());
    }

    let source = match &outcome {
        FileOutcome::Loaded { path, .. } => Some(path.clone()),
        _ => None,
    };
    (Config { data, source }, outcome)
}

/// Reads one config file into a key/value layer, scoped to the `mygis`
/// table when the file has one.
fn read_file(path: &Path) -> ConfigResult<Map<String, Value>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let parse_err = |reason: String| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = match extension.as_str() {
        "toml" => toml::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| parse_err(e.to_string()))?,
        "yaml" | "yml" => serde_yaml::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| parse_err(e.to_string()))?,
        "json" => serde_json::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| parse_err(e.to_string()))?,
        "ini" => Value::Object(parse_ini(&std::fs::read_to_string(path)?)),
        _ => Value::Object(read_env_file(path)?),
    };

    match value {
        Value::Object(mut map) => match map.remove(SCOPE_TABLE) {
            Some(Value::Object(scoped)) => Ok(scoped),
            Some(other) => {
                map.insert(SCOPE_TABLE.to_string(), other);
                Ok(map)
            }
            None => Ok(map),
        },
        // An empty YAML document.
        Value::Null => Ok(Map::new()),
        _ => Err(parse_err("top level is not a table".to_string())),
    }
}

/// Parses INI text.
///
/// `[DEFAULT]` keys always apply. Then the `[mygis]` section is used if
/// present, otherwise the first section's keys are flattened as
/// `section.key`. Keys are lowercased; values stay strings.
pub(crate) fn parse_ini(text: &str) -> Map<String, Value> {
    let mut defaults: Vec<(String, String)> = Vec::new();
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    let mut current: Option<usize> = None;
    let mut in_default = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            if name == "DEFAULT" {
                in_default = true;
                current = None;
            } else {
                in_default = false;
                current = Some(match sections.iter().position(|(n, _)| n == name) {
                    Some(index) => index,
                    None => {
                        sections.push((name.to_string(), Vec::new()));
                        sections.len() - 1
                    }
                });
            }
            continue;
        }
        let Some(split) = line.find(['=', ':']) else {
            debug!(line, "Skipping INI line without a key");
            continue;
        };
        let key = line[..split].trim().to_lowercase();
        let value = line[split + 1..].trim().to_string();
        if in_default {
            defaults.push((key, value));
        } else if let Some(index) = current {
            sections[index].1.push((key, value));
        }
    }

    let mut result = Map::new();
    for (key, value) in &defaults {
        result.insert(key.clone(), Value::String(value.clone()));
    }
    if let Some((_, entries)) = sections.iter().find(|(name, _)| name == SCOPE_TABLE) {
        for (key, value) in entries {
            result.insert(key.clone(), Value::String(value.clone()));
        }
    } else if let Some((section, entries)) = sections.first() {
        for (key, value) in entries {
            result.insert(format!("{section}.{key}"), Value::String(value.clone()));
        }
    }
    result
}

fn read_env_file(path: &Path) -> ConfigResult<Map<String, Value>> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut result = Map::new();
    for item in iter {
        let (key, value) = item.map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        result.insert(key, Value::String(value));
    }
    Ok(result)
}

/// Merges `layer` into `base`; nested tables merge key by key, anything
/// else replaces.
pub(crate) fn deep_merge(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Applies `PREFIX_NAME=value` variables as key `name`.
pub(crate) fn apply_env(
    data: &mut Map<String, Value>,
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let key = rest.to_lowercase();
        let value = coerce(&raw, data.get(&key));
        debug!(key, "Config value overridden from environment");
        data.insert(key, value);
    }
}

/// Converts an environment string using the type of the value it
/// replaces. With nothing to replace, `true`/`false` become booleans and
/// numeric text becomes a number.
pub(crate) fn coerce(raw: &str, like: Option<&Value>) -> Value {
    match like {
        None | Some(Value::Null) => {
            let lowered = raw.trim().to_lowercase();
            if lowered == "true" || lowered == "false" {
                return Value::Bool(lowered == "true");
            }
            let number = if raw.contains('.') {
                raw.trim().parse::<f64>().ok().and_then(Number::from_f64)
            } else {
                raw.trim().parse::<i64>().ok().map(Number::from)
            };
            number.map_or_else(|| Value::String(raw.to_string()), Value::Number)
        }
        Some(Value::Bool(_)) => Value::Bool(is_truthy(raw)),
        Some(Value::Number(n)) if n.is_f64() => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(|| Value::Number(n.clone()), Value::Number),
        Some(Value::Number(n)) => raw
            .trim()
            .parse::<i64>()
            .map_or_else(|_| Value::Number(n.clone()), |i| Value::Number(i.into())),
        Some(_) => Value::String(raw.to_string()),
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
