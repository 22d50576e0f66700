use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::stat_error::{StatError, StatResult};

/// Persistent key/value storage for unlocks and currency balances.
///
/// Reads of a missing key return `None`; callers pick the default.
pub trait SettingsStore {
    fn get_int(&self, key: &str) -> Option<i32>;
    fn set_int(&mut self, key: &str, value: i32) -> StatResult<()>;
    fn get_float(&self, key: &str) -> Option<f32>;
    fn set_float(&mut self, key: &str, value: f32) -> StatResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i32),
    Float(f32),
}

impl SettingValue {
    fn as_int(self) -> i32 {
        match self {
            SettingValue::Int(value) => value,
            SettingValue::Float(value) => value as i32,
        }
    }

    fn as_float(self) -> f32 {
        match self {
            SettingValue::Int(value) => value as f32,
            SettingValue::Float(value) => value,
        }
    }
}

/// In-process settings that are lost on drop.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<String, SettingValue>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_int(&self, key: &str) -> Option<i32> {
        self.values.get(key).map(|v| v.as_int())
    }

    fn set_int(&mut self, key: &str, value: i32) -> StatResult<()> {
        self.values.insert(key.to_string(), SettingValue::Int(value));
        Ok(())
    }

    fn get_float(&self, key: &str) -> Option<f32> {
        self.values.get(key).map(|v| v.as_float())
    }

    fn set_float(&mut self, key: &str, value: f32) -> StatResult<()> {
        self.values.insert(key.to_string(), SettingValue::Float(value));
        Ok(())
    }
}

/// Settings kept in a JSON object on disk, rewritten after every change.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: BTreeMap<String, SettingValue>,
}

impl JsonFileSettings {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> StatResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|err| StatError::io(&path, err))?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };
        debug!("Opened settings '{}' with {} keys", path.display(), values.len());
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> StatResult<()> {
        let text = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, text).map_err(|err| {
            error!("Failed to write settings '{}': {}", self.path.display(), err);
            StatError::io(&self.path, err)
        })
    }

    fn store(&mut self, key: &str, value: SettingValue) -> StatResult<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

impl SettingsStore for JsonFileSettings {
    fn get_int(&self, key: &str) -> Option<i32> {
        self.values.get(key).map(|v| v.as_int())
    }

    fn set_int(&mut self, key: &str, value: i32) -> StatResult<()> {
        self.store(key, SettingValue::Int(value))
    }

    fn get_float(&self, key: &str) -> Option<f32> {
        self.values.get(key).map(|v| v.as_float())
    }

    fn set_float(&mut self, key: &str, value: f32) -> StatResult<()> {
        self.store(key, SettingValue::Float(value))
    }
}
