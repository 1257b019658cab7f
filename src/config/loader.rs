//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Prefix of the inline-JSON, stdin and path variables.
const SOURCE_PREFIX: &str = "SERVER_IDENTITY_CONFIG";
/// Prefix of per-field overrides, e.g. `SERVER_IDENTITY__IDENTITY__KEY_BITS=4096`.
const OVERRIDE_PREFIX: &str = "SERVER_IDENTITY__";

/// Load configuration with the following precedence (highest first):
/// 1) `SERVER_IDENTITY_CONFIG_JSON` env var containing raw JSON
/// 2) If `SERVER_IDENTITY_CONFIG_STDIN=true/1`, read JSON from stdin
/// 3) File pointed by `SERVER_IDENTITY_CONFIG_PATH` env var
/// 4) config.json in current working directory
/// 5) config.json next to the executable
/// 6) Defaults compiled into the binary
///
/// Individual fields can then be overridden with `SERVER_IDENTITY__SECTION__FIELD`,
/// e.g. `SERVER_IDENTITY__LOGGING__LEVEL=debug` or `SERVER_IDENTITY__IDENTITY__SERVERS=1,2`.
/// Read and parse errors are printed to stderr and the affected source is skipped.
///
/// Validation problems are reported on stderr but not returned; callers that must
/// refuse a bad configuration call [`validate_config`] themselves.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged = serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(Map::new()));

    for source in sources() {
        merge_values(&mut merged, source);
    }
    apply_env_overrides(&mut merged, env::vars());

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

/// Configuration documents in merge order; later documents win field by field.
fn sources() -> Vec<Value> {
    let mut documents = Vec::new();

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            documents.extend(read_file_source(&exe_dir.join("config.json")));
        }
    }

    documents.extend(read_file_source(Path::new("config.json")));

    if let Ok(path) = env::var(format!("{SOURCE_PREFIX}_PATH")) {
        documents.extend(read_file_source(&PathBuf::from(path)));
    }

    if env::var(format!("{SOURCE_PREFIX}_STDIN")).is_ok_and(|v| env_var_truthy(&v)) {
        let mut buf = String::new();
        match std::io::stdin().read_to_string(&mut buf) {
            Ok(_) => documents.extend(parse_json_document(&buf, "stdin")),
            Err(e) => eprintln!("Failed to read config from stdin: {e}"),
        }
    }

    let inline_var = format!("{SOURCE_PREFIX}_JSON");
    if let Ok(json) = env::var(&inline_var) {
        documents.extend(parse_json_document(&json, &inline_var));
    }

    documents
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

fn read_file_source(path: &Path) -> Option<Value> {
    if path.as_os_str().is_empty() || !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(contents) => parse_json_document(&contents, &format!("file {}", path.display())),
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
            None
        }
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides(root: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(OVERRIDE_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_env_value(&raw_value));
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') {
        return Value::Array(
            trimmed
                .split(',')
                .map(|segment| parse_scalar(segment.trim()))
                .collect(),
        );
    }

    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.insert(head.clone(), value);
    } else {
        let entry = map
            .entry(head.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        set_nested_value(entry, rest, value);
    }
}
