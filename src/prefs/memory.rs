use super::{PrefValue, PreferenceStore};
use crate::base::neterror::NetError;
use dashmap::DashMap;

/// In-memory preferences. Never fails.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: DashMap<String, PrefValue>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)?.value() {
            PrefValue::Bool(b) => Some(*b),
            PrefValue::String(_) => None,
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), NetError> {
        self.values.insert(key.to_string(), PrefValue::Bool(value));
        Ok(())
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
        Ok(())
    }
}
