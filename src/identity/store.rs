//! Per-server key-value configuration the provisioner reads from and writes back to.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// PEM certificate (may also carry the key).
pub const CERTIFICATE_KEY: &str = "certificate";
/// PEM private key (may also carry the certificate).
pub const KEY_KEY: &str = "key";
/// Passphrase for an encrypted private key.
pub const PASSPHRASE_KEY: &str = "passphrase";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access configuration store: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode or decode configuration store: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration store has an unexpected layout: {0}")]
    Layout(String),
}

pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write several values as one update.
    ///
    /// Stores that can commit atomically override this; the default writes one at a time.
    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        entries.iter().try_for_each(|(key, value)| self.set(key, value))
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }
}

/// In-memory store that counts writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    values: HashMap<String, String>,
    writes: usize,
}

impl MemoryConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }

    /// Number of write operations since construction. A `set_many` counts once.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value.to_owned());
        self.writes += 1;
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.values.insert((*key).to_owned(), (*value).to_owned());
        }
        self.writes += 1;
        Ok(())
    }
}

/// JSON file holding one object per virtual server:
///
/// ```json
/// { "1": { "certificate": "-----BEGIN CERTIFICATE-----...", "key": "..." } }
/// ```
///
/// Every write rewrites the whole document through a temporary file and a rename.
/// The file holds private keys, so on unix it is created owner-only (0600).
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    server_id: String,
    document: Map<String, Value>,
}

impl JsonFileStore {
    /// Open the store for `server_id`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>, server_id: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let server_id = server_id.into();

        let document = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => map,
                other => {
                    return Err(StoreError::Layout(format!(
                        "expected a JSON object at the top level of {}, found {}",
                        path.display(),
                        json_kind(&other)
                    )))
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(err.into()),
        };

        if let Some(section) = document.get(&server_id) {
            if !section.is_object() {
                return Err(StoreError::Layout(format!(
                    "entry for server {server_id} in {} is {}, expected an object",
                    path.display(),
                    json_kind(section)
                )));
            }
        }

        Ok(Self {
            path,
            server_id,
            document,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let encoded = serde_json::to_vec_pretty(&self.document)?;
        fs::write(&tmp, encoded)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn section_mut(&mut self) -> Result<&mut Map<String, Value>, StoreError> {
        let section = self
            .document
            .entry(self.server_id.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        match section {
            Value::Object(section) => Ok(section),
            _ => Err(StoreError::Layout(format!(
                "entry for server {} is not an object",
                self.server_id
            ))),
        }
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.document
            .get(&self.server_id)
            .and_then(|section| section.get(key))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_many(&[(key, value)])
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let section = self.section_mut()?;
        for (key, value) in entries {
            section.insert((*key).to_owned(), Value::String((*value).to_owned()));
        }
        self.persist()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
