/// Backup documents: JSON export/import and the "URL | Title" text format
use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShelfError};
use crate::settings::{FilterMode, Settings};
use crate::tab_data::{Group, TabEntry};

/// Version written into every exported document
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Full export of the shelf
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub exported_at: String,
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<FilterSnapshot>,
}

/// The part of the settings carried by a backup
///
/// General and backup preferences stay with the installation and are not
/// exported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FilterSnapshot {
    pub blacklist: Vec<String>,
    pub whitelist: Vec<String>,
    pub mode: FilterMode,
}

/// Build the export document for the current groups and settings
pub fn encode(groups: &[Group], settings: &Settings, exported_at: DateTime<Utc>) -> BackupDocument {
    BackupDocument {
        version: BACKUP_FORMAT_VERSION.to_string(),
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        groups: groups.to_vec(),
        settings: Some(FilterSnapshot {
            blacklist: settings.blacklist.clone(),
            whitelist: settings.whitelist.clone(),
            mode: settings.mode,
        }),
    }
}

pub fn to_json(document: &BackupDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Parse an import file's text
pub fn decode_str(text: &str) -> Result<BackupDocument> {
    let value: Value = serde_json::from_str(text)?;
    decode(value)
}

/// Read a parsed import document
///
/// Only the presence of a `groups` array is required. Group entries that
/// cannot be read (no numeric `id`, for instance) are skipped; missing tab
/// fields fall back to empty strings.
pub fn decode(document: Value) -> Result<BackupDocument> {
    let Value::Object(mut fields) = document else {
        return Err(ShelfError::Format("'groups' array missing".to_string()));
    };

    let Some(Value::Array(entries)) = fields.remove("groups") else {
        return Err(ShelfError::Format("'groups' array missing".to_string()));
    };

    let groups = entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value::<Group>(entry) {
            Ok(group) => Some(group),
            Err(e) => {
                warn!("Skipping unreadable group #{} in import: {}", i, e);
                None
            }
        })
        .collect();

    let settings = match fields.remove("settings") {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value::<FilterSnapshot>(value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Ignoring unreadable settings in import: {}", e);
                None
            }
        },
    };

    let text_field = |value: Option<Value>| match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };

    Ok(BackupDocument {
        version: text_field(fields.remove("version")),
        exported_at: text_field(fields.remove("exportedAt")),
        groups,
        settings,
    })
}

/// Result of merging imported groups into the existing ones
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub groups: Vec<Group>,
    /// Imported groups that were new
    pub accepted: usize,
}

/// Combine imported groups with existing ones
///
/// Imported groups whose id is already present are dropped, never
/// overwriting what is there. The rest go ahead of the existing groups, in
/// their imported order.
pub fn merge(existing: Vec<Group>, imported: Vec<Group>) -> MergeOutcome {
    let mut known: HashSet<i64> = existing.iter().map(|g| g.id).collect();

    let mut groups: Vec<Group> = imported
        .into_iter()
        .filter(|g| known.insert(g.id))
        .collect();
    let accepted = groups.len();

    groups.extend(existing);
    MergeOutcome { groups, accepted }
}

/// Replace the domain lists and mode with an imported snapshot
pub fn apply_filter_snapshot(settings: &mut Settings, snapshot: &FilterSnapshot) {
    let normalize = |list: &[String]| {
        let mut list = list.to_vec();
        list.sort();
        list.dedup();
        list
    };

    settings.blacklist = normalize(&snapshot.blacklist);
    settings.whitelist = normalize(&snapshot.whitelist);
    settings.mode = snapshot.mode;
}

/// Write groups as "URL | Title" lines, a blank line between groups
pub fn to_line_format(groups: &[Group]) -> String {
    groups
        .iter()
        .filter(|g| !g.tabs.is_empty())
        .map(|g| {
            g.tabs
                .iter()
                .map(|tab| format!("{} | {}", tab.url, tab.title))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim_end()
        .to_string()
}

/// Read "URL | Title" lines into tabs
///
/// Each line splits on its first `|`. A missing or empty title falls back to
/// the URL; lines with no URL part are skipped. Favicons are not carried.
pub fn from_line_format(text: &str) -> Vec<TabEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (url, title) = match line.split_once('|') {
                Some((url, title)) => (url.trim(), title.trim()),
                None => (line, ""),
            };

            if url.is_empty() {
                return None;
            }

            let title = if title.is_empty() { url } else { title };
            Some(TabEntry::new(url, title))
        })
        .collect()
}
