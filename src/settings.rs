/// Extension settings and their defaults
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShelfError};

/// Which domain list decides whether a tab is saved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Save everything except hosts on the deny list
    #[default]
    Blacklist,
    /// Save only hosts on the allow list
    Whitelist,
    /// A stored mode this build does not know; filtering fails open
    #[serde(other)]
    Unrecognized,
}

/// Selects one of the two domain lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainList {
    Deny,
    Allow,
}

impl FilterMode {
    /// The list this mode edits, if any
    pub fn active_list(self) -> Option<DomainList> {
        match self {
            FilterMode::Blacklist => Some(DomainList::Deny),
            FilterMode::Whitelist => Some(DomainList::Allow),
            FilterMode::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralSettings {
    pub show_favicons: bool,
    pub auto_deduplicate: bool,
    /// Remove an unpinned group (or tab) from the shelf once it is opened
    pub consume_on_open: bool,
    pub focus_on_open: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        GeneralSettings {
            show_favicons: true,
            auto_deduplicate: false,
            consume_on_open: true,
            focus_on_open: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Hours,
    #[default]
    Days,
    Weeks,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupSettings {
    pub enabled: bool,
    pub interval_value: f64,
    pub interval_unit: IntervalUnit,
}

impl Default for BackupSettings {
    fn default() -> Self {
        BackupSettings {
            enabled: false,
            interval_value: 1.0,
            interval_unit: IntervalUnit::Days,
        }
    }
}

/// Everything the extension persists besides the groups themselves
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub mode: FilterMode,
    pub blacklist: Vec<String>,
    pub whitelist: Vec<String>,
    pub general: GeneralSettings,
    pub backup: BackupSettings,
    /// Epoch milliseconds of the last successful automatic backup
    pub last_backup_timestamp: Option<i64>,
}

impl Settings {
    pub fn list(&self, which: DomainList) -> &[String] {
        match which {
            DomainList::Deny => &self.blacklist,
            DomainList::Allow => &self.whitelist,
        }
    }

    pub fn list_mut(&mut self, which: DomainList) -> &mut Vec<String> {
        match which {
            DomainList::Deny => &mut self.blacklist,
            DomainList::Allow => &mut self.whitelist,
        }
    }
}

/// Apply a partial JSON object on top of `current`
///
/// Keys present in `patch` replace the current values; absent keys keep
/// theirs. A patch that is not an object, or that produces an invalid value,
/// is rejected and `current` is left as it was.
pub fn merge_patch<T>(current: &T, patch: &Value) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let Value::Object(patch) = patch else {
        return Err(ShelfError::Format("settings patch must be an object".to_string()));
    };

    let mut merged = serde_json::to_value(current)?;
    if let Value::Object(fields) = &mut merged {
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
    }

    Ok(serde_json::from_value(merged)?)
}
