/// Data structures for Tab Shelf
use serde::{Deserialize, Deserializer, Serialize};

/// A candidate tab reported by the browser's tab inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: i32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fav_icon_url: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub index: i32,
}

impl TabInfo {
    pub fn new(id: i32, url: String, title: String, pinned: bool, index: i32) -> TabInfo {
        TabInfo {
            id,
            url,
            title,
            fav_icon_url: String::new(),
            pinned,
            index,
        }
    }

    /// The saved form of this tab
    pub fn to_entry(&self) -> TabEntry {
        TabEntry {
            title: self.title.clone(),
            url: self.url.clone(),
            fav_icon_url: self.fav_icon_url.clone(),
        }
    }
}

/// A saved tab within a group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TabEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(rename = "favIconUrl", default, deserialize_with = "null_as_empty")]
    pub fav_icon_url: String,
}

impl TabEntry {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> TabEntry {
        TabEntry {
            title: title.into(),
            url: url.into(),
            fav_icon_url: String::new(),
        }
    }

    /// URL form used when comparing tabs for duplicates
    pub fn normalized_url(&self) -> &str {
        self.url.trim()
    }
}

/// A saved group of tabs
///
/// `id` is the creation timestamp in milliseconds and doubles as the group's
/// identity. `date` is the creation time formatted for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date: String,
    #[serde(default)]
    pub tabs: Vec<TabEntry>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub custom_title: Option<String>,
}

impl Group {
    /// Custom title if one is set and non-empty
    pub fn title(&self) -> Option<&str> {
        self.custom_title.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

// Stored documents written by older builds carry `null` where a string is expected
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
