/// Transactions against the stored groups and settings
use std::cell::RefCell;

use chrono::{DateTime, Utc};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::lock::Mutex;
use log::{error, info};
use serde::Serialize;
use serde_json::Value;

use crate::backup::{self, BackupDocument};
use crate::clock::Clock;
use crate::error::{Result, ShelfError};
use crate::filters;
use crate::groups::GroupStore;
use crate::operations::{TabInventory, TabQuery, select_tabs};
use crate::settings::{BackupSettings, DomainList, FilterMode, GeneralSettings, Settings, merge_patch};
use crate::storage::{
    GROUP_KEYS, SETTINGS_KEYS, StorageArea, StorageMap, changed_entries, decode_groups,
    decode_settings, encode_groups, encode_settings,
};
use crate::tab_data::{Group, TabEntry};

/// Published after a transaction writes to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Groups,
    Settings,
}

impl StoreChange {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreChange::Groups => "groups",
            StoreChange::Settings => "settings",
        }
    }

    /// Changes implied by a set of written storage keys; unknown keys are ignored
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<StoreChange> {
        let (mut groups, mut settings) = (false, false);
        for key in keys {
            groups |= GROUP_KEYS.contains(&key);
            settings |= SETTINGS_KEYS.contains(&key);
        }

        let mut changes = Vec::new();
        if groups {
            changes.push(StoreChange::Groups);
        }
        if settings {
            changes.push(StoreChange::Settings);
        }
        changes
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendSummary {
    pub group_id: Option<i64>,
    pub saved: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    /// Groups added to the shelf
    pub accepted: usize,
    /// Groups present in the document
    pub total: usize,
}

/// The shelf's state as held by a storage area
///
/// Every mutation is a read-modify-write of the stored values. Mutations
/// queue on a single writer lock, so two callers sharing a repository never
/// interleave their read and write. Transactions that change nothing skip
/// the write.
pub struct Repository<S, C> {
    storage: S,
    clock: C,
    writer: Mutex<()>,
    subscribers: RefCell<Vec<UnboundedSender<StoreChange>>>,
}

impl<S: StorageArea, C: Clock> Repository<S, C> {
    pub fn new(storage: S, clock: C) -> Self {
        Repository {
            storage,
            clock,
            writer: Mutex::new(()),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Receive a `StoreChange` after each write
    pub fn subscribe(&self) -> UnboundedReceiver<StoreChange> {
        let (sender, receiver) = unbounded();
        self.subscribers.borrow_mut().push(sender);
        receiver
    }

    fn notify(&self, change: StoreChange) {
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.unbounded_send(change).is_ok());
    }

    pub async fn load_groups(&self) -> Result<GroupStore> {
        let map = self.storage.get(&GROUP_KEYS).await?;
        decode_groups(&map)
    }

    pub async fn load_settings(&self) -> Result<Settings> {
        let map = self.storage.get(&SETTINGS_KEYS).await?;
        Ok(decode_settings(&map))
    }

    async fn transact<R, F>(&self, apply: F) -> Result<R>
    where
        F: FnOnce(&mut GroupStore, &mut Settings) -> Result<R>,
    {
        let _writer = self.writer.lock().await;

        let all_keys: Vec<&str> = GROUP_KEYS.iter().chain(SETTINGS_KEYS.iter()).copied().collect();
        let map = self.storage.get(&all_keys).await?;
        let groups_before = decode_groups(&map)?;
        let settings_before = decode_settings(&map);

        let mut groups = groups_before.clone();
        let mut settings = settings_before.clone();
        let result = apply(&mut groups, &mut settings)?;

        let mut changes = StorageMap::new();
        if groups != groups_before {
            changes.extend(encode_groups(&groups)?);
        }
        changes.extend(changed_entries(
            &encode_settings(&settings_before)?,
            encode_settings(&settings)?,
        ));

        if changes.is_empty() {
            return Ok(result);
        }

        let published = StoreChange::from_keys(changes.keys().map(String::as_str));
        self.storage
            .set(changes)
            .await
            .inspect_err(|e| error!("Failed to write storage: {}", e))?;

        for change in published {
            self.notify(change);
        }
        Ok(result)
    }

    async fn update_groups<R, F>(&self, apply: F) -> Result<R>
    where
        F: FnOnce(&mut GroupStore, &Settings) -> R,
    {
        self.transact(|groups, settings| Ok(apply(groups, settings))).await
    }

    async fn update_settings<R, F>(&self, apply: F) -> Result<R>
    where
        F: FnOnce(&mut Settings) -> Result<R>,
    {
        self.transact(|_, settings| apply(settings)).await
    }

    // --- Groups ---

    /// Save tabs as a new group, deduplicating afterwards if enabled
    pub async fn save_group(&self, tabs: Vec<TabEntry>) -> Result<Option<Group>> {
        let now = self.clock.now();
        self.update_groups(|store, settings| {
            let group = store.create_group(tabs, now)?;
            if settings.general.auto_deduplicate {
                store.deduplicate();
            }
            Some(group)
        })
        .await
    }

    pub async fn delete_group(&self, id: i64) -> Result<Option<Group>> {
        self.update_groups(|store, _| store.delete_group(id)).await
    }

    /// Undo a delete
    pub async fn restore_group(&self, group: Group) -> Result<bool> {
        self.update_groups(|store, _| store.restore_group(group)).await
    }

    pub async fn remove_tab(&self, group_id: i64, tab_index: usize) -> Result<bool> {
        self.update_groups(|store, _| store.remove_tab(group_id, tab_index))
            .await
    }

    pub async fn rename_group(&self, id: i64, title: String) -> Result<bool> {
        self.update_groups(|store, _| store.rename_group(id, title)).await
    }

    pub async fn toggle_pin(&self, id: i64) -> Result<Option<bool>> {
        self.update_groups(|store, _| store.toggle_pin(id)).await
    }

    pub async fn reorder_group(&self, id: i64, target_index: usize) -> Result<bool> {
        self.update_groups(|store, _| store.reorder_group(id, target_index))
            .await
    }

    pub async fn move_group_before(&self, id: i64, insertion_point: usize) -> Result<bool> {
        self.update_groups(|store, _| store.move_group_before(id, insertion_point))
            .await
    }

    pub async fn move_tab(
        &self,
        from_group_id: i64,
        from_index: usize,
        to_group_id: i64,
        to_index: usize,
    ) -> Result<bool> {
        self.update_groups(|store, _| store.move_tab(from_group_id, from_index, to_group_id, to_index))
            .await
    }

    /// Remove every unpinned group; returns how many groups remain
    pub async fn clear_unpinned(&self) -> Result<usize> {
        self.update_groups(|store, _| store.clear_unpinned()).await
    }

    /// Returns the number of duplicate tabs removed
    pub async fn deduplicate(&self) -> Result<usize> {
        self.update_groups(|store, _| store.deduplicate()).await
    }

    // --- Settings ---

    pub async fn set_mode(&self, mode: FilterMode) -> Result<()> {
        self.update_settings(|settings| {
            settings.mode = mode;
            Ok(())
        })
        .await
    }

    /// Flip a hostname in the list the current mode uses
    pub async fn toggle_domain(&self, host: &str) -> Result<Vec<String>> {
        self.update_settings(|settings| Ok(filters::toggle_domain(host, settings)))
            .await
    }

    pub async fn add_domain(&self, input: &str, which: DomainList) -> Result<bool> {
        self.update_settings(|settings| Ok(filters::add_domain(input, which, settings)))
            .await
    }

    pub async fn remove_domain(&self, domain: &str, which: DomainList) -> Result<bool> {
        self.update_settings(|settings| Ok(filters::remove_domain(domain, which, settings)))
            .await
    }

    pub async fn update_general_settings(&self, patch: &Value) -> Result<GeneralSettings> {
        self.update_settings(|settings| {
            settings.general = merge_patch(&settings.general, patch)?;
            Ok(settings.general.clone())
        })
        .await
    }

    pub async fn update_backup_settings(&self, patch: &Value) -> Result<BackupSettings> {
        self.update_settings(|settings| {
            settings.backup = merge_patch(&settings.backup, patch)?;
            Ok(settings.backup.clone())
        })
        .await
    }

    pub async fn record_backup(&self, at: DateTime<Utc>) -> Result<()> {
        self.update_settings(|settings| {
            settings.last_backup_timestamp = Some(at.timestamp_millis());
            Ok(())
        })
        .await
    }

    // --- Backup ---

    pub async fn export_backup(&self) -> Result<BackupDocument> {
        let groups = self.load_groups().await?;
        let settings = self.load_settings().await?;
        Ok(backup::encode(groups.groups(), &settings, self.clock.now()))
    }

    pub async fn export_text(&self) -> Result<String> {
        let groups = self.load_groups().await?;
        Ok(backup::to_line_format(groups.groups()))
    }

    /// Merge a parsed backup document into the shelf
    pub async fn import_backup(&self, document: Value) -> Result<ImportSummary> {
        let document = backup::decode(document).inspect_err(|e| error!("Import failed: {}", e))?;
        let total = document.groups.len();

        let accepted = self
            .transact(|store, settings| {
                let existing = std::mem::take(store);
                let watermark = existing.watermark();
                let outcome = backup::merge(existing.into_groups(), document.groups);
                *store = GroupStore::from_groups(outcome.groups, watermark);

                if let Some(snapshot) = &document.settings {
                    backup::apply_filter_snapshot(settings, snapshot);
                }
                Ok(outcome.accepted)
            })
            .await?;

        info!("Imported {} of {} groups", accepted, total);
        Ok(ImportSummary { accepted, total })
    }

    pub async fn import_backup_str(&self, text: &str) -> Result<ImportSummary> {
        let document: Value =
            serde_json::from_str(text).inspect_err(|e| error!("Import failed: {}", e))?;
        self.import_backup(document).await
    }

    /// Save "URL | Title" lines as one new group
    pub async fn import_text(&self, text: &str) -> Result<Option<Group>> {
        let tabs = backup::from_line_format(text);
        if tabs.is_empty() {
            return Ok(None);
        }
        self.save_group(tabs).await
    }

    // --- Browser workflows ---

    /// Collect tabs, save the allowed ones as a group, then close them
    pub async fn send_tabs<I: TabInventory>(
        &self,
        inventory: &I,
        query: TabQuery,
        own_origin: &str,
    ) -> Result<SendSummary> {
        let candidates = inventory.query(query).await?;
        let settings = self.load_settings().await?;
        let selection = select_tabs(&candidates, &settings, own_origin);

        if selection.tabs.is_empty() {
            return Ok(SendSummary::default());
        }

        let saved = selection.tabs.len();
        let group = self.save_group(selection.tabs).await?;
        inventory.close(&selection.close_ids).await?;

        info!("Sent {} of {} tabs to the shelf", saved, candidates.len());
        Ok(SendSummary {
            group_id: group.map(|g| g.id),
            saved,
        })
    }

    async fn opening_group(&self, id: i64) -> Result<(Settings, Group)> {
        let settings = self.load_settings().await?;
        let group = self
            .load_groups()
            .await?
            .get(id)
            .cloned()
            .ok_or_else(|| ShelfError::NotFound(format!("group {}", id)))?;
        Ok((settings, group))
    }

    async fn consume_opened(&self, settings: &Settings, group: &Group) -> Result<()> {
        if settings.general.consume_on_open {
            self.update_groups(|store, _| store.consume_group(group.id, &group.tabs))
                .await?;
        }
        Ok(())
    }

    /// Open every tab of a group; consumes the group per settings
    ///
    /// Tabs are read, opened, and only then consumed by value, so edits made
    /// while the browser opens them are kept.
    pub async fn open_group<I: TabInventory>(&self, inventory: &I, id: i64) -> Result<usize> {
        let (settings, group) = self.opening_group(id).await?;

        for (i, tab) in group.tabs.iter().enumerate() {
            inventory
                .open(&tab.url, i == 0 && settings.general.focus_on_open)
                .await?;
        }

        self.consume_opened(&settings, &group).await?;
        Ok(group.tabs.len())
    }

    /// Open a group in a new focused window, first tab first
    pub async fn open_group_in_window<I: TabInventory>(&self, inventory: &I, id: i64) -> Result<usize> {
        let (settings, group) = self.opening_group(id).await?;
        let Some((first, rest)) = group.tabs.split_first() else {
            return Ok(0);
        };

        let window_id = inventory.open_in_window(&first.url).await?;
        for tab in rest {
            inventory.open_in(window_id, &tab.url).await?;
        }

        self.consume_opened(&settings, &group).await?;
        Ok(group.tabs.len())
    }

    /// Open one saved tab; consumes it per settings
    pub async fn open_tab<I: TabInventory>(&self, inventory: &I, group_id: i64, tab_index: usize) -> Result<()> {
        let settings = self.load_settings().await?;
        let tab = self
            .load_groups()
            .await?
            .get(group_id)
            .and_then(|g| g.tabs.get(tab_index))
            .cloned()
            .ok_or_else(|| ShelfError::NotFound(format!("tab {} of group {}", tab_index, group_id)))?;

        inventory.open(&tab.url, settings.general.focus_on_open).await?;

        if settings.general.consume_on_open {
            self.update_groups(|store, _| store.consume_tab(group_id, tab_index, &tab))
                .await?;
        }
        Ok(())
    }
}
