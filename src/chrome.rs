/// WebExtension API bindings: storage, tabs, windows, downloads and alarms
use futures::channel::mpsc::{UnboundedReceiver, unbounded};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::error::{self, ShelfError};
use crate::operations::{TabInventory, TabQuery};
use crate::repository::StoreChange;
use crate::schedule::{BACKUP_ALARM, FileEmitter, compute_next_period};
use crate::settings::BackupSettings;
use crate::storage::{StorageArea, StorageMap};
use crate::tab_data::TabInfo;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["browser", "storage", "local"], js_name = get)]
    async fn storage_local_get(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["browser", "storage", "local"], js_name = set)]
    async fn storage_local_set(items: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["browser", "tabs"], js_name = query)]
    async fn tabs_query(query: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["browser", "tabs"], js_name = remove)]
    async fn tabs_remove(tab_ids: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["browser", "tabs"], js_name = create)]
    async fn tabs_create(properties: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["browser", "storage", "onChanged"], js_name = addListener)]
    fn storage_on_changed_add_listener(listener: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(catch, js_namespace = ["browser", "windows"], js_name = create)]
    async fn windows_create(properties: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["browser", "downloads"], js_name = download)]
    async fn downloads_download(options: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["browser", "alarms"], js_name = create)]
    async fn alarms_create(name: &str, info: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["browser", "alarms"], js_name = clear)]
    async fn alarms_clear(name: &str) -> Result<JsValue, JsValue>;
}

/// Serialize for a WebExtension API call (plain objects, not JS `Map`s)
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> error::Result<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| ShelfError::Store(e.to_string()))
}

pub(crate) fn from_js<T: DeserializeOwned>(value: JsValue) -> error::Result<T> {
    serde_wasm_bindgen::from_value(value).map_err(|e| ShelfError::Format(e.to_string()))
}

fn api_error(call: &str, err: JsValue) -> ShelfError {
    let message = err
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    ShelfError::Store(format!("{} failed: {}", call, message))
}

/// `browser.storage.local`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

impl StorageArea for ChromeStorage {
    async fn get(&self, keys: &[&str]) -> error::Result<StorageMap> {
        let found = storage_local_get(to_js(keys)?)
            .await
            .map_err(|e| api_error("storage.local.get", e))?;
        from_js(found)
    }

    async fn set(&self, items: StorageMap) -> error::Result<()> {
        storage_local_set(to_js(&items)?)
            .await
            .map_err(|e| api_error("storage.local.set", e))?;
        Ok(())
    }
}

/// `browser.tabs` in the current window
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeTabs;

impl TabInventory for ChromeTabs {
    async fn query(&self, query: TabQuery) -> error::Result<Vec<TabInfo>> {
        let tabs = tabs_query(to_js(&query.to_query())?)
            .await
            .map_err(|e| api_error("tabs.query", e))?;
        from_js(tabs)
    }

    async fn close(&self, tab_ids: &[i32]) -> error::Result<()> {
        if tab_ids.is_empty() {
            return Ok(());
        }
        tabs_remove(to_js(tab_ids)?)
            .await
            .map_err(|e| api_error("tabs.remove", e))?;
        Ok(())
    }

    async fn open(&self, url: &str, active: bool) -> error::Result<()> {
        tabs_create(to_js(&json!({"url": url, "active": active}))?)
            .await
            .map_err(|e| api_error("tabs.create", e))?;
        Ok(())
    }

    async fn open_in_window(&self, url: &str) -> error::Result<i32> {
        let window = windows_create(to_js(&json!({"url": url, "focused": true}))?)
            .await
            .map_err(|e| api_error("windows.create", e))?;
        let window: WindowInfo = from_js(window)?;
        Ok(window.id)
    }

    async fn open_in(&self, window_id: i32, url: &str) -> error::Result<()> {
        let properties = json!({"windowId": window_id, "url": url, "active": false});
        tabs_create(to_js(&properties)?)
            .await
            .map_err(|e| api_error("tabs.create", e))?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct WindowInfo {
    id: i32,
}

/// Changes to the shelf's keys in `storage.local`, whichever page wrote them
pub fn watch_storage_changes() -> UnboundedReceiver<StoreChange> {
    let (sender, receiver) = unbounded();

    let listener = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |changes: JsValue, area: JsValue| {
        if area.as_string().as_deref() != Some("local") {
            return;
        }

        let keys: Vec<String> = js_sys::Object::keys(changes.unchecked_ref::<js_sys::Object>())
            .iter()
            .filter_map(|key| key.as_string())
            .collect();
        for change in StoreChange::from_keys(keys.iter().map(String::as_str)) {
            if sender.unbounded_send(change).is_err() {
                log::debug!("Storage change receiver dropped");
                return;
            }
        }
    });
    storage_on_changed_add_listener(&listener);
    // Registered for the lifetime of the page
    listener.forget();

    receiver
}

/// Saves files through `browser.downloads` as data URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadEmitter;

impl FileEmitter for DownloadEmitter {
    async fn emit(&self, filename: &str, mime: &str, contents: &str) -> error::Result<()> {
        let encoded = String::from(js_sys::encode_uri_component(contents));
        let options = json!({
            "url": format!("data:{};charset=utf-8,{}", mime, encoded),
            "filename": filename,
            "saveAs": false,
        });

        downloads_download(to_js(&options)?)
            .await
            .map_err(|e| api_error("downloads.download", e))?;
        Ok(())
    }
}

/// Re-create the backup alarm to match the settings
pub async fn schedule_backup_alarm(backup: &BackupSettings) -> error::Result<()> {
    alarms_clear(BACKUP_ALARM)
        .await
        .map_err(|e| api_error("alarms.clear", e))?;

    if !backup.enabled {
        log::info!("Automatic backups disabled");
        return Ok(());
    }

    let period = compute_next_period(backup.interval_value, backup.interval_unit);
    alarms_create(BACKUP_ALARM, to_js(&json!({"periodInMinutes": period}))?)
        .await
        .map_err(|e| api_error("alarms.create", e))?;

    log::info!("Automatic backup every {} minutes", period);
    Ok(())
}
