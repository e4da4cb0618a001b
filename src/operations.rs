/// Tab operations: picking tabs to send, searching and ordering groups

use regex::RegexBuilder;
use serde_json::{Value, json};

use crate::error::Result;
use crate::filters::should_save_from;
use crate::settings::Settings;
use crate::tab_data::{Group, TabEntry, TabInfo};

/// Which open tabs a "send" action collects from the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabQuery {
    /// Every visible, unpinned tab
    Workspace,
    /// Highlighted (multi-selected) unpinned tabs
    Selected,
    /// Every unpinned tab, hidden ones included
    All,
}

impl TabQuery {
    pub fn parse(name: &str) -> Option<TabQuery> {
        match name {
            "workspace" => Some(TabQuery::Workspace),
            "selected" => Some(TabQuery::Selected),
            "all" => Some(TabQuery::All),
            _ => None,
        }
    }

    /// Query object for `tabs.query`
    pub fn to_query(self) -> Value {
        match self {
            TabQuery::Workspace => json!({"currentWindow": true, "hidden": false, "pinned": false}),
            TabQuery::Selected => json!({"currentWindow": true, "highlighted": true, "pinned": false}),
            TabQuery::All => json!({"currentWindow": true, "pinned": false}),
        }
    }
}

/// The browser's open tabs
#[allow(async_fn_in_trait)]
pub trait TabInventory {
    async fn query(&self, query: TabQuery) -> Result<Vec<TabInfo>>;
    async fn close(&self, tab_ids: &[i32]) -> Result<()>;
    async fn open(&self, url: &str, active: bool) -> Result<()>;
    /// Open `url` as the only tab of a new focused window; returns the window id
    async fn open_in_window(&self, url: &str) -> Result<i32>;
    /// Open `url` in the background in the given window
    async fn open_in(&self, window_id: i32, url: &str) -> Result<()>;
}

/// Tabs that passed the filter, with the browser ids to close afterwards
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabSelection {
    pub tabs: Vec<TabEntry>,
    pub close_ids: Vec<i32>,
}

/// Keep the candidates the filter allows, in their window order
pub fn select_tabs(candidates: &[TabInfo], settings: &Settings, own_origin: &str) -> TabSelection {
    candidates
        .iter()
        .filter(|tab| should_save_from(&tab.url, settings, own_origin))
        .fold(TabSelection::default(), |mut selection, tab| {
            selection.tabs.push(tab.to_entry());
            selection.close_ids.push(tab.id);
            selection
        })
}

/// Groups whose custom title, or any tab title or URL, contains `term`
/// (case-insensitive). An empty term matches everything.
pub fn search_groups<'a>(groups: &'a [Group], term: &str) -> Vec<&'a Group> {
    let term = term.trim();
    if term.is_empty() {
        return groups.iter().collect();
    }

    let pattern = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build();
    let lowered = term.to_lowercase();
    let matches = |text: &str| match &pattern {
        Ok(re) => re.is_match(text),
        Err(_) => text.to_lowercase().contains(&lowered),
    };

    groups
        .iter()
        .filter(|group| {
            group.custom_title.as_deref().is_some_and(|t| matches(t))
                || group
                    .tabs
                    .iter()
                    .any(|tab| matches(&tab.title) || matches(&tab.url))
        })
        .collect()
}

/// Order for display: pinned groups first, then newest first
pub fn display_order(groups: &[Group]) -> Vec<&Group> {
    let mut ordered: Vec<&Group> = groups.iter().collect();
    ordered.sort_by(|a, b| b.pinned.cmp(&a.pinned).then_with(|| b.id.cmp(&a.id)));
    ordered
}
