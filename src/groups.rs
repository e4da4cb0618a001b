/// The saved-group collection and every edit applied to it
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::debug;

use crate::clock::display_date;
use crate::tab_data::{Group, TabEntry};

/// Ordered collection of saved groups
///
/// The order is the persisted order: new groups go to the head and nothing
/// here sorts. Lookups that miss return `false` / `None` and leave the
/// collection unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupStore {
    groups: Vec<Group>,
    /// Largest id ever issued or seen
    watermark: i64,
}

impl GroupStore {
    pub fn new() -> Self {
        GroupStore {
            groups: Vec::new(),
            watermark: 0,
        }
    }

    pub fn from_groups(groups: Vec<Group>, watermark: i64) -> Self {
        let highest = groups.iter().map(|g| g.id).max().unwrap_or(0);
        GroupStore {
            groups,
            watermark: watermark.max(highest),
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.groups.iter().position(|g| g.id == id)
    }

    fn next_id(&mut self, now_ms: i64) -> i64 {
        let id = now_ms.max(self.watermark + 1);
        self.watermark = id;
        id
    }

    /// Save tabs as a new group at the head of the collection
    ///
    /// Ids are creation timestamps, bumped past the watermark when the clock
    /// has not advanced so that they stay strictly increasing.
    pub fn create_group(&mut self, tabs: Vec<TabEntry>, now: DateTime<Utc>) -> Option<Group> {
        if tabs.is_empty() {
            return None;
        }

        let group = Group {
            id: self.next_id(now.timestamp_millis()),
            date: display_date(now),
            tabs,
            pinned: false,
            custom_title: None,
        };

        debug!("Created group {} with {} tabs", group.id, group.tabs.len());
        self.groups.insert(0, group.clone());
        Some(group)
    }

    /// Put a deleted group back at the head, keeping its id
    pub fn restore_group(&mut self, group: Group) -> bool {
        if self.get(group.id).is_some() {
            return false;
        }

        self.watermark = self.watermark.max(group.id);
        self.groups.insert(0, group);
        true
    }

    /// Remove a group, handing it back so the caller can offer undo
    pub fn delete_group(&mut self, id: i64) -> Option<Group> {
        let pos = self.position(id)?;
        Some(self.groups.remove(pos))
    }

    /// Remove one tab; an unpinned group left empty goes with it
    pub fn remove_tab(&mut self, group_id: i64, tab_index: usize) -> bool {
        let Some(pos) = self.position(group_id) else {
            return false;
        };

        let group = &mut self.groups[pos];
        if tab_index >= group.tabs.len() {
            return false;
        }

        group.tabs.remove(tab_index);
        if group.tabs.is_empty() && !group.pinned {
            debug!("Group {} emptied, removing", group_id);
            self.groups.remove(pos);
        }
        true
    }

    pub fn rename_group(&mut self, id: i64, title: String) -> bool {
        self.groups
            .iter_mut()
            .find(|g| g.id == id)
            .map(|group| {
                group.custom_title = Some(title);
            })
            .is_some()
    }

    /// Flip the pinned flag in place; returns the new state
    pub fn toggle_pin(&mut self, id: i64) -> Option<bool> {
        self.groups.iter_mut().find(|g| g.id == id).map(|group| {
            group.pinned = !group.pinned;
            group.pinned
        })
    }

    /// Move a group so that it ends up at `target_index` (clamped)
    pub fn reorder_group(&mut self, id: i64, target_index: usize) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };

        let group = self.groups.remove(pos);
        let target = target_index.min(self.groups.len());
        self.groups.insert(target, group);
        true
    }

    /// Move a group in front of whatever currently sits at `insertion_point`
    ///
    /// `insertion_point` is counted before the move (`len` means "at the
    /// end"). When the group moves down, removing it shifts the later groups
    /// up by one, so the final index is one less.
    pub fn move_group_before(&mut self, id: i64, insertion_point: usize) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };

        let target = if pos < insertion_point {
            insertion_point - 1
        } else {
            insertion_point
        };
        self.reorder_group(id, target)
    }

    /// Move a tab into another group, or within the same one
    ///
    /// `to_index` is the insertion point in the target group before the move.
    /// A source group left empty is removed unless it is pinned or is also
    /// the target.
    pub fn move_tab(
        &mut self,
        from_group_id: i64,
        from_index: usize,
        to_group_id: i64,
        to_index: usize,
    ) -> bool {
        let (Some(from_pos), Some(to_pos)) =
            (self.position(from_group_id), self.position(to_group_id))
        else {
            return false;
        };

        if from_index >= self.groups[from_pos].tabs.len() {
            return false;
        }

        let same_group = from_pos == to_pos;
        let mut target = to_index;
        if same_group && from_index < to_index {
            target -= 1;
        }

        let tab = self.groups[from_pos].tabs.remove(from_index);
        let target_tabs = &mut self.groups[to_pos].tabs;
        let target = target.min(target_tabs.len());
        target_tabs.insert(target, tab);

        let source = &self.groups[from_pos];
        if !same_group && source.tabs.is_empty() && !source.pinned {
            debug!("Group {} emptied by move, removing", from_group_id);
            self.groups.remove(from_pos);
        }
        true
    }

    /// Drop every unpinned group; returns how many groups remain
    pub fn clear_unpinned(&mut self) -> usize {
        self.groups.retain(|g| g.pinned);
        self.groups.len()
    }

    /// Remove tabs whose URL already appears earlier in the collection
    ///
    /// Pinned groups are scanned first, then the rest, each in stored order.
    /// The first occurrence of a (whitespace-trimmed) URL survives. Unpinned
    /// groups emptied by the pass are removed. Returns the number of tabs
    /// removed.
    pub fn deduplicate(&mut self) -> usize {
        let mut order: Vec<usize> = (0..self.groups.len()).collect();
        // Stable sort keeps stored order within each half
        order.sort_by_key(|&i| !self.groups[i].pinned);

        let mut seen_urls = HashSet::new();
        let mut removed = 0;

        for i in order {
            let group = &mut self.groups[i];
            let original_len = group.tabs.len();
            group
                .tabs
                .retain(|tab| seen_urls.insert(tab.normalized_url().to_string()));
            removed += original_len - group.tabs.len();
        }

        self.groups.retain(|g| g.pinned || !g.tabs.is_empty());

        if removed > 0 {
            debug!("Deduplication removed {} tabs", removed);
        }
        removed
    }

    /// Remove a group's tabs after they were opened in the browser
    ///
    /// `opened` is what was read before opening. Tabs are matched by value,
    /// so an edit that landed in between never costs a tab that was not
    /// opened. A group still holding exactly `opened` is removed whole;
    /// otherwise each opened tab still present is removed once and the
    /// group goes if that empties it. Pinned groups are never consumed.
    pub fn consume_group(&mut self, id: i64, opened: &[TabEntry]) -> usize {
        let Some(pos) = self.position(id) else {
            return 0;
        };
        let group = &mut self.groups[pos];
        if group.pinned {
            return 0;
        }

        if group.tabs == opened {
            self.groups.remove(pos);
            return opened.len();
        }

        let mut removed = 0;
        for tab in opened {
            if let Some(i) = group.tabs.iter().position(|t| t == tab) {
                group.tabs.remove(i);
                removed += 1;
            }
        }

        if group.tabs.is_empty() {
            debug!("Group {} emptied by open, removing", id);
            self.groups.remove(pos);
        }
        removed
    }

    /// Remove one opened tab, looked up by value
    ///
    /// The tab at `tab_index` is preferred; if the group changed since it was
    /// read, the first equal tab is taken instead, and nothing is removed
    /// when it is gone.
    pub fn consume_tab(&mut self, group_id: i64, tab_index: usize, opened: &TabEntry) -> bool {
        let Some(group) = self.get(group_id) else {
            return false;
        };

        let index = if group.tabs.get(tab_index) == Some(opened) {
            Some(tab_index)
        } else {
            group.tabs.iter().position(|t| t == opened)
        };

        match index {
            Some(i) => self.remove_tab(group_id, i),
            None => false,
        }
    }
}
