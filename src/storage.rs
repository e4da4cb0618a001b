/// Storage layout in the browser's local key-value area
use std::cell::RefCell;

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::groups::GroupStore;
use crate::settings::Settings;
use crate::tab_data::Group;

pub type StorageMap = Map<String, Value>;

/// Top-level keys, shared with earlier JavaScript builds of the extension
pub mod keys {
    pub const TAB_GROUPS: &str = "tabGroups";
    pub const LAST_GROUP_ID: &str = "lastGroupId";
    pub const FILTER_MODE: &str = "filterMode";
    pub const BLACKLIST: &str = "blacklistedDomains";
    pub const WHITELIST: &str = "whitelistedDomains";
    pub const GENERAL: &str = "generalSettings";
    pub const BACKUP: &str = "backupSettings";
    pub const LAST_BACKUP: &str = "lastBackupTimestamp";
}

pub const GROUP_KEYS: [&str; 2] = [keys::TAB_GROUPS, keys::LAST_GROUP_ID];

pub const SETTINGS_KEYS: [&str; 6] = [
    keys::FILTER_MODE,
    keys::BLACKLIST,
    keys::WHITELIST,
    keys::GENERAL,
    keys::BACKUP,
    keys::LAST_BACKUP,
];

/// Asynchronous key-value area holding whole JSON values per key
///
/// `get` returns only the keys that are present; `set` writes the given keys
/// and leaves the others alone.
#[allow(async_fn_in_trait)]
pub trait StorageArea {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap>;
    async fn set(&self, items: StorageMap) -> Result<()>;
}

/// In-process storage area
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RefCell<StorageMap>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StorageMap) -> Self {
        MemoryStorage {
            data: RefCell::new(data),
        }
    }

    /// Copy of everything stored
    pub fn snapshot(&self) -> StorageMap {
        self.data.borrow().clone()
    }
}

impl StorageArea for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        let data = self.data.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        self.data.borrow_mut().extend(items);
        Ok(())
    }
}

fn field<T>(map: &StorageMap, key: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let value = map.get(key)?;
    if value.is_null() {
        return None;
    }

    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring unreadable {} in storage: {}", key, e);
            None
        }
    }
}

// Timestamps written by JavaScript may come back as floats
fn millis(map: &StorageMap, key: &str) -> Option<i64> {
    let value = map.get(key)?;
    value.as_i64().or_else(|| value.as_f64().map(|ms| ms as i64))
}

/// Load the group collection; a missing key is an empty collection
pub fn decode_groups(map: &StorageMap) -> Result<GroupStore> {
    let groups: Vec<Group> = match map.get(keys::TAB_GROUPS) {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value.clone())?,
    };
    let watermark = millis(map, keys::LAST_GROUP_ID).unwrap_or(0);

    Ok(GroupStore::from_groups(groups, watermark))
}

pub fn encode_groups(store: &GroupStore) -> Result<StorageMap> {
    let mut map = StorageMap::new();
    map.insert(keys::TAB_GROUPS.to_string(), serde_json::to_value(store.groups())?);
    map.insert(keys::LAST_GROUP_ID.to_string(), Value::from(store.watermark()));
    Ok(map)
}

/// Load settings, filling defaults for anything missing or unreadable
pub fn decode_settings(map: &StorageMap) -> Settings {
    let defaults = Settings::default();

    Settings {
        mode: field(map, keys::FILTER_MODE).unwrap_or(defaults.mode),
        blacklist: field(map, keys::BLACKLIST).unwrap_or(defaults.blacklist),
        whitelist: field(map, keys::WHITELIST).unwrap_or(defaults.whitelist),
        general: field(map, keys::GENERAL).unwrap_or(defaults.general),
        backup: field(map, keys::BACKUP).unwrap_or(defaults.backup),
        last_backup_timestamp: millis(map, keys::LAST_BACKUP),
    }
}

pub fn encode_settings(settings: &Settings) -> Result<StorageMap> {
    let mut map = StorageMap::new();
    map.insert(keys::FILTER_MODE.to_string(), serde_json::to_value(settings.mode)?);
    map.insert(keys::BLACKLIST.to_string(), serde_json::to_value(&settings.blacklist)?);
    map.insert(keys::WHITELIST.to_string(), serde_json::to_value(&settings.whitelist)?);
    map.insert(keys::GENERAL.to_string(), serde_json::to_value(&settings.general)?);
    map.insert(keys::BACKUP.to_string(), serde_json::to_value(&settings.backup)?);
    map.insert(
        keys::LAST_BACKUP.to_string(),
        settings.last_backup_timestamp.map_or(Value::Null, Value::from),
    );
    Ok(map)
}

/// Entries of `next` that differ from `previous`
pub fn changed_entries(previous: &StorageMap, next: StorageMap) -> StorageMap {
    next.into_iter()
        .filter(|(key, value)| match previous.get(key) {
            Some(old) => old != value,
            None => !value.is_null(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FilterMode;
    use crate::tab_data::TabEntry;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_memory_storage_get_set() {
        let storage = MemoryStorage::new();
        let mut items = StorageMap::new();
        items.insert("a".to_string(), json!(1));
        items.insert("b".to_string(), json!([2]));

        block_on(storage.set(items)).unwrap();
        let got = block_on(storage.get(&["a", "missing"])).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], json!(1));
        assert_eq!(storage.snapshot()["b"], json!([2]));
    }

    #[test]
    fn test_decode_empty_storage() {
        let store = decode_groups(&StorageMap::new()).unwrap();
        let settings = decode_settings(&StorageMap::new());

        assert!(store.is_empty());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_decode_original_layout() {
        let map = json!({
            "tabGroups": [{"id": 1700000000000i64, "date": "11/14/2023", "tabs": [{"title": "A", "url": "https://a.com", "favIconUrl": ""}]}],
            "filterMode": "whitelist",
            "blacklistedDomains": ["x.com"],
            "whitelistedDomains": ["docs.rs"],
            "generalSettings": {"autoDeduplicate": true},
            "lastBackupTimestamp": 1700000000123.0
        });
        let Value::Object(map) = map else { unreachable!() };

        let store = decode_groups(&map).unwrap();
        let settings = decode_settings(&map);

        assert_eq!(store.len(), 1);
        assert_eq!(store.watermark(), 1700000000000);
        assert_eq!(settings.mode, FilterMode::Whitelist);
        assert_eq!(settings.blacklist, vec!["x.com"]);
        assert!(settings.general.auto_deduplicate);
        assert!(settings.general.show_favicons);
        assert_eq!(settings.last_backup_timestamp, Some(1700000000123));
    }

    #[test]
    fn test_decode_settings_tolerates_garbage() {
        let map = json!({"blacklistedDomains": "not-a-list", "filterMode": 7});
        let Value::Object(map) = map else { unreachable!() };

        let settings = decode_settings(&map);

        assert!(settings.blacklist.is_empty());
        assert_eq!(settings.mode, FilterMode::Blacklist);
    }

    #[test]
    fn test_decode_groups_rejects_corrupt_collection() {
        let map = json!({"tabGroups": {"id": 1}});
        let Value::Object(map) = map else { unreachable!() };

        assert!(decode_groups(&map).is_err());
    }

    #[test]
    fn test_encode_groups_layout() {
        let mut store = GroupStore::new();
        store.restore_group(Group {
            id: 42,
            date: String::new(),
            tabs: vec![TabEntry::new("https://a.com", "A")],
            pinned: false,
            custom_title: None,
        });

        let map = encode_groups(&store).unwrap();

        assert_eq!(map[keys::TAB_GROUPS][0]["id"], json!(42));
        assert_eq!(map[keys::LAST_GROUP_ID], json!(42));
    }

    #[test]
    fn test_changed_entries() {
        let before = encode_settings(&Settings::default()).unwrap();
        let mut settings = Settings::default();
        settings.blacklist.push("a.com".to_string());

        let diff = changed_entries(&before, encode_settings(&settings).unwrap());

        assert_eq!(diff.len(), 1);
        assert_eq!(diff[keys::BLACKLIST], json!(["a.com"]));
    }

    #[test]
    fn test_changed_entries_skips_absent_nulls() {
        let diff = changed_entries(&StorageMap::new(), encode_settings(&Settings::default()).unwrap());

        assert!(!diff.contains_key(keys::LAST_BACKUP));
        assert!(diff.contains_key(keys::FILTER_MODE));
    }
}
