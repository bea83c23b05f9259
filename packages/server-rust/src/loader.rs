//! Configuration loading: turns JSON documents, properties files and
//! command-line assignments into a validated [`ServerConfig`].
//!
//! Sources are merged key by key in the order given, later sources winning,
//! and the merged document is validated once. An invalid value is never
//! replaced by a default: resolution fails and startup must abort.

use std::fs;
use std::path::{Path, PathBuf};

use queryserver_core::{ProcessorCount, ServerConfig, ServerConfigOverrides, ValidationError};
use serde_json::{Map, Value};
use tracing::{debug, info, trace};

/// Prefix selecting server HTTP keys in a shared properties file.
pub const DEFAULT_PROPERTY_PREFIX: &str = "server.http";

/// Errors from loading or resolving the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{key}: {source}")]
    Field {
        key: String,
        source: serde_json::Error,
    },
    #[error("properties line {line}: {message}")]
    Properties { line: usize, message: String },
    #[error("invalid server configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Parses a JSON configuration document.
///
/// # Errors
///
/// Returns [`LoadError::Parse`] if the text is not a JSON object, or
/// [`LoadError::Field`] naming the first key whose value has the wrong type.
pub fn parse_json(text: &str) -> Result<ServerConfigOverrides, LoadError> {
    let object: Map<String, Value> = serde_json::from_str(text)?;
    object
        .into_iter()
        .try_fold(ServerConfigOverrides::default(), |acc, (key, value)| {
            match single_key(key.clone(), value) {
                Ok(entry) => Ok(acc.merge(entry)),
                Err(source) => Err(LoadError::Field { key, source }),
            }
        })
}

/// Reads and parses a JSON configuration document from `path`.
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the file cannot be read, or
/// [`LoadError::Parse`] if its contents are malformed.
pub fn load_json_file(path: &Path) -> Result<ServerConfigOverrides, LoadError> {
    let text = read(path)?;
    let overrides = parse_json(&text)?;
    debug!(path = %path.display(), "loaded JSON server configuration");
    Ok(overrides)
}

/// Parses properties text, keeping only keys under `prefix`.
///
/// Lines are `key=value` or `key: value`; blank lines and lines starting
/// with `#` or `!` are skipped. `prefix.numThreads=64` sets `numThreads`.
/// `true`/`false` are read case-insensitively; other values stay text and
/// numeric keys accept integer text.
///
/// # Errors
///
/// Returns [`LoadError::Properties`] with the line number for a line without
/// a separator or a value of the wrong type for its key.
pub fn parse_properties(text: &str, prefix: &str) -> Result<ServerConfigOverrides, LoadError> {
    let scope = format!("{prefix}.");
    let mut overrides = ServerConfigOverrides::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = split_assignment(line) else {
            return Err(LoadError::Properties {
                line: index + 1,
                message: format!("expected key=value, got {line:?}"),
            });
        };
        let Some(field) = key.strip_prefix(&scope) else {
            trace!(key, "skipping property outside server scope");
            continue;
        };
        let entry = single_key(field.to_string(), scalar(value)).map_err(|err| {
            LoadError::Properties {
                line: index + 1,
                message: format!("{field}: {err}"),
            }
        })?;
        overrides = overrides.merge(entry);
    }

    Ok(overrides)
}

/// Reads properties from `path`; see [`parse_properties`].
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse_properties`].
pub fn load_properties_file(path: &Path, prefix: &str) -> Result<ServerConfigOverrides, LoadError> {
    let text = read(path)?;
    let overrides = parse_properties(&text, prefix)?;
    debug!(path = %path.display(), prefix, "loaded server properties");
    Ok(overrides)
}

/// Builds a document from `key=value` assignments given on the command line.
/// Values are typed like properties values.
///
/// # Errors
///
/// Returns [`LoadError::Field`] naming the first key whose value has the
/// wrong type.
pub fn from_assignments(assignments: &[(String, String)]) -> Result<ServerConfigOverrides, LoadError> {
    assignments
        .iter()
        .try_fold(ServerConfigOverrides::default(), |acc, (key, value)| {
            match single_key(key.clone(), scalar(value)) {
                Ok(entry) => Ok(acc.merge(entry)),
                Err(source) => Err(LoadError::Field {
                    key: key.clone(),
                    source,
                }),
            }
        })
}

/// Splits one `key=value` assignment. Used as a command-line value parser.
///
/// # Errors
///
/// Returns a message if there is no `=` or the key is empty.
pub fn parse_assignment(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {text:?}")),
    }
}

/// Merges `sources` in order and validates the result.
///
/// # Errors
///
/// Returns [`LoadError::Validation`] naming the first invalid field.
pub fn resolve(
    sources: impl IntoIterator<Item = ServerConfigOverrides>,
    processors: &dyn ProcessorCount,
) -> Result<ServerConfig, LoadError> {
    let merged = sources
        .into_iter()
        .fold(ServerConfigOverrides::default(), ServerConfigOverrides::merge);
    let config = ServerConfig::with_processors(&merged, processors)?;
    info!(config = %config, "resolved server configuration");
    Ok(config)
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Splits at the first `=` or `:`, whichever comes first.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let at = line.find(['=', ':'])?;
    let key = line[..at].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[at + 1..].trim()))
}

/// Reads one key on its own so a type error can be tied to that key.
fn single_key(key: String, value: Value) -> Result<ServerConfigOverrides, serde_json::Error> {
    let mut object = Map::new();
    object.insert(key, value);
    serde_json::from_value(Value::Object(object))
}

fn scalar(text: &str) -> Value {
    if text.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if text.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else {
        Value::String(text.to_string())
    }
}
