//! JSON-file preferences.

use super::{PrefValue, PreferenceStore};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Preferences persisted as a flat JSON object.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written file behind.
pub struct FilePreferences {
    path: PathBuf,
    values: DashMap<String, PrefValue>,
    write_lock: Mutex<()>,
}

impl FilePreferences {
    /// Open (or lazily create) the preference file at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let path = path.as_ref().to_path_buf();
        let values = DashMap::new();

        if path.exists() {
            let json = fs::read_to_string(&path).file_context("read preferences")?;
            let stored: BTreeMap<String, PrefValue> =
                serde_json::from_str(&json).map_err(|e| NetError::io("parse preferences", e))?;
            for (k, v) in stored {
                values.insert(k, v);
            }
        }

        Ok(Self {
            path,
            values,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), NetError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| NetError::io("write preferences", "lock poisoned"))?;

        let snapshot: BTreeMap<String, PrefValue> = self
            .values
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| NetError::io("serialize preferences", e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).file_context("create preferences directory")?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).file_context("write preferences")?;
        fs::rename(&tmp, &self.path).file_context("replace preferences")
    }
}

impl PreferenceStore for FilePreferences {
    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)?.value() {
            PrefValue::Bool(b) => Some(*b),
            PrefValue::String(_) => None,
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), NetError> {
        self.values.insert(key.to_string(), PrefValue::Bool(value));
        self.save()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)?.value() {
            PrefValue::String(s) => Some(s.clone()),
            PrefValue::Bool(_) => None,
        }
    }

    fn set_string(&self, key: &str, value: Option<&str>) -> Result<(), NetError> {
        match value {
            Some(v) => {
                self.values
                    .insert(key.to_string(), PrefValue::String(v.to_string()));
            }
            None => {
                self.values.remove(key);
            }
        }
        self.save()
    }
}
