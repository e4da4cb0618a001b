/// JavaScript-facing API used by the popup, dashboard and background pages

use std::future::Future;
use std::rc::Rc;

use futures::StreamExt;
use js_sys::Promise;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use crate::backup;
use crate::chrome::{
    ChromeStorage, ChromeTabs, DownloadEmitter, from_js, schedule_backup_alarm, to_js,
    watch_storage_changes,
};
use crate::clock::SystemClock;
use crate::error::{Result, ShelfError};
use crate::operations::{TabQuery, search_groups};
use crate::repository::Repository;
use crate::schedule::{BackupScheduler, FileEmitter, backup_filename};
use crate::settings::{DomainList, FilterMode};
use crate::tab_data::Group;

type ChromeRepository = Repository<ChromeStorage, SystemClock>;

fn to_js_error(err: ShelfError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// Run a repository call as a JS promise resolving to its serialized result
fn promise<T, F>(future: F) -> Promise
where
    T: Serialize,
    F: Future<Output = Result<T>> + 'static,
{
    future_to_promise(async move {
        let value = future.await.map_err(to_js_error)?;
        to_js(&value).map_err(to_js_error)
    })
}

fn parse_list(name: &str) -> Result<DomainList> {
    match name {
        "blacklist" => Ok(DomainList::Deny),
        "whitelist" => Ok(DomainList::Allow),
        other => Err(ShelfError::Format(format!("unknown domain list '{}'", other))),
    }
}

fn parse_mode(name: &str) -> Result<FilterMode> {
    let mode: FilterMode = serde_json::from_value(Value::String(name.to_string()))?;
    match mode {
        FilterMode::Unrecognized => Err(ShelfError::Format(format!("unknown filter mode '{}'", name))),
        mode => Ok(mode),
    }
}

/// Handle held by each extension page
#[wasm_bindgen]
pub struct TabShelf {
    repository: Rc<ChromeRepository>,
    scheduler: Rc<BackupScheduler>,
    own_origin: String,
}

#[wasm_bindgen]
impl TabShelf {
    /// `own_origin` is the extension's base URL (`browser.runtime.getURL("")`)
    #[wasm_bindgen(constructor)]
    pub fn new(own_origin: String) -> TabShelf {
        TabShelf {
            repository: Rc::new(Repository::new(ChromeStorage, SystemClock)),
            scheduler: Rc::new(BackupScheduler::new()),
            own_origin,
        }
    }

    /// Call `callback("groups" | "settings")` after each write to the shelf,
    /// from this page or any other extension page
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        let mut changes = watch_storage_changes();
        spawn_local(async move {
            while let Some(change) = changes.next().await {
                if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(change.as_str())) {
                    log::warn!("Change listener threw: {:?}", e);
                }
            }
        });
    }

    #[wasm_bindgen(js_name = getGroups)]
    pub fn get_groups(&self) -> Promise {
        let repository = self.repository.clone();
        promise(async move { Ok(repository.load_groups().await?.into_groups()) })
    }

    #[wasm_bindgen(js_name = searchGroups)]
    pub fn search(&self, term: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            let store = repository.load_groups().await?;
            let found: Vec<Group> = search_groups(store.groups(), &term)
                .into_iter()
                .cloned()
                .collect();
            Ok(found)
        })
    }

    #[wasm_bindgen(js_name = getSettings)]
    pub fn get_settings(&self) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.load_settings().await })
    }

    /// `query` is "workspace", "selected" or "all"
    #[wasm_bindgen(js_name = sendTabs)]
    pub fn send_tabs(&self, query: String) -> Promise {
        let repository = self.repository.clone();
        let own_origin = self.own_origin.clone();
        promise(async move {
            let query = TabQuery::parse(&query)
                .ok_or_else(|| ShelfError::Format(format!("unknown tab query '{}'", query)))?;
            repository.send_tabs(&ChromeTabs, query, &own_origin).await
        })
    }

    #[wasm_bindgen(js_name = deleteGroup)]
    pub fn delete_group(&self, id: f64) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.delete_group(id as i64).await })
    }

    /// Undo for `deleteGroup`: pass back the group it resolved to
    #[wasm_bindgen(js_name = restoreGroup)]
    pub fn restore_group(&self, group: JsValue) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            let group: Group = from_js(group)?;
            repository.restore_group(group).await
        })
    }

    #[wasm_bindgen(js_name = removeTab)]
    pub fn remove_tab(&self, group_id: f64, tab_index: u32) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.remove_tab(group_id as i64, tab_index as usize).await })
    }

    #[wasm_bindgen(js_name = renameGroup)]
    pub fn rename_group(&self, id: f64, title: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.rename_group(id as i64, title).await })
    }

    #[wasm_bindgen(js_name = togglePin)]
    pub fn toggle_pin(&self, id: f64) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.toggle_pin(id as i64).await })
    }

    /// Drop a group in front of the group currently at `insertion_point`
    #[wasm_bindgen(js_name = reorderGroup)]
    pub fn reorder_group(&self, id: f64, insertion_point: u32) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            repository
                .move_group_before(id as i64, insertion_point as usize)
                .await
        })
    }

    /// Put a group at `target_index` in the final order (clamped to the end)
    #[wasm_bindgen(js_name = setGroupIndex)]
    pub fn set_group_index(&self, id: f64, target_index: u32) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.reorder_group(id as i64, target_index as usize).await })
    }

    #[wasm_bindgen(js_name = moveTab)]
    pub fn move_tab(&self, from_group_id: f64, from_index: u32, to_group_id: f64, to_index: u32) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            repository
                .move_tab(
                    from_group_id as i64,
                    from_index as usize,
                    to_group_id as i64,
                    to_index as usize,
                )
                .await
        })
    }

    #[wasm_bindgen(js_name = clearUnpinned)]
    pub fn clear_unpinned(&self) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.clear_unpinned().await })
    }

    pub fn deduplicate(&self) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.deduplicate().await })
    }

    /// Resolves to false if the group no longer exists
    #[wasm_bindgen(js_name = openGroup)]
    pub fn open_group(&self, id: f64) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            match repository.open_group(&ChromeTabs, id as i64).await {
                Ok(_) => Ok(true),
                Err(ShelfError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    /// Restore a group into a new window; resolves to false if it no longer exists
    #[wasm_bindgen(js_name = openGroupInWindow)]
    pub fn open_group_in_window(&self, id: f64) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            match repository.open_group_in_window(&ChromeTabs, id as i64).await {
                Ok(_) => Ok(true),
                Err(ShelfError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    #[wasm_bindgen(js_name = openTab)]
    pub fn open_tab(&self, group_id: f64, tab_index: u32) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            match repository
                .open_tab(&ChromeTabs, group_id as i64, tab_index as usize)
                .await
            {
                Ok(()) => Ok(true),
                Err(ShelfError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&self, mode: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.set_mode(parse_mode(&mode)?).await })
    }

    #[wasm_bindgen(js_name = toggleDomain)]
    pub fn toggle_domain(&self, hostname: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.toggle_domain(&hostname).await })
    }

    #[wasm_bindgen(js_name = addDomain)]
    pub fn add_domain(&self, input: String, list: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.add_domain(&input, parse_list(&list)?).await })
    }

    #[wasm_bindgen(js_name = removeDomain)]
    pub fn remove_domain(&self, domain: String, list: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.remove_domain(&domain, parse_list(&list)?).await })
    }

    #[wasm_bindgen(js_name = updateGeneralSettings)]
    pub fn update_general_settings(&self, patch: JsValue) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            let patch: Value = from_js(patch)?;
            repository.update_general_settings(&patch).await
        })
    }

    /// Saves backup preferences and re-creates the alarm to match
    #[wasm_bindgen(js_name = updateBackupSettings)]
    pub fn update_backup_settings(&self, patch: JsValue) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            let patch: Value = from_js(patch)?;
            let backup = repository.update_backup_settings(&patch).await?;
            schedule_backup_alarm(&backup).await?;
            Ok(backup)
        })
    }

    /// Re-create the backup alarm from stored settings (browser startup)
    #[wasm_bindgen(js_name = syncBackupAlarm)]
    pub fn sync_backup_alarm(&self) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            let settings = repository.load_settings().await?;
            schedule_backup_alarm(&settings.backup).await
        })
    }

    /// Download a JSON backup now
    #[wasm_bindgen(js_name = exportBackup)]
    pub fn export_backup(&self) -> Promise {
        let repository = self.repository.clone();
        promise(async move {
            let document = repository.export_backup().await?;
            let filename = backup_filename(repository.now());
            DownloadEmitter
                .emit(&filename, "application/json", &backup::to_json(&document)?)
                .await?;
            Ok(filename)
        })
    }

    #[wasm_bindgen(js_name = exportText)]
    pub fn export_text(&self) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.export_text().await })
    }

    /// Rejects with the parse error for malformed files
    #[wasm_bindgen(js_name = importBackup)]
    pub fn import_backup(&self, text: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.import_backup_str(&text).await })
    }

    #[wasm_bindgen(js_name = importText)]
    pub fn import_text(&self, text: String) -> Promise {
        let repository = self.repository.clone();
        promise(async move { repository.import_text(&text).await })
    }

    /// Alarm handler for the automatic backup
    #[wasm_bindgen(js_name = runScheduledBackup)]
    pub fn run_scheduled_backup(&self) -> Promise {
        let repository = self.repository.clone();
        let scheduler = self.scheduler.clone();
        promise(async move { scheduler.run(&*repository, &DownloadEmitter).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("blacklist").unwrap(), DomainList::Deny);
        assert_eq!(parse_list("whitelist").unwrap(), DomainList::Allow);
        assert!(parse_list("greylist").is_err());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("whitelist").unwrap(), FilterMode::Whitelist);
        assert!(matches!(parse_mode("everything"), Err(ShelfError::Format(_))));
    }
}
