//! Local key-value storage.
//!
//! Values are plain strings, the way browser local storage keeps them. The
//! table only ever writes one entry (the column order), but the store itself
//! does not care which keys are used.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, trace, warn};

use crate::domain::CrmError;

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "crm-table";
const APPLICATION: &str = "crm-table";
const STORAGE_FILE: &str = "storage.json";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), CrmError>;
}

/// Volatile store, used when nothing should outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CrmError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single json object on disk. Every `set` rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store, and so is
    /// a file that can not be parsed.
    pub fn open(path: PathBuf) -> Result<Self, CrmError> {
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable storage file {:?}: {e}", path);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened storage {:?} with {} entries", path, entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CrmError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        trace!("Wrote storage {:?}", self.path);
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CrmError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// `<config dir>/crm-table/storage.json`, or None without a home directory.
pub fn default_storage_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(STORAGE_FILE))
}

/// `<cache dir>/crm-table/latest.log`
pub fn default_log_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().join("latest.log"))
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, CrmError> {
    shellexpand::full(raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| CrmError::LoadingFailed(format!("can not expand {raw:?}: {e}")))
}
