/// JavaScript-facing API for the popup, manager and settings pages
///
/// Every method returns a Promise. Rejections carry the error message as a
/// string; the pages show it as a transient notice and keep their last state.
use crate::auto_title;
use crate::chrome::ChromeStorage;
use crate::error::StoreResult;
use crate::search::SearchFilters;
use crate::settings::SettingsUpdate;
use crate::store::{Clock, CollectionStore, SystemClock};
use crate::tab_data::{Collection, CollectionOptions, NewTab};
use crate::transfer::ImportStrategy;
use crate::url_index::UrlIndex;
use js_sys::Promise;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

type Store = CollectionStore<ChromeStorage>;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize result: {}", e)))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid argument: {}", e)))
}

/// `undefined`/`null` arguments fall back to the type's default
fn from_js_or_default<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_null() || value.is_undefined() {
        Ok(T::default())
    } else {
        from_js(value)
    }
}

fn promise<T, F>(operation: F) -> Promise
where
    T: Serialize,
    F: Future<Output = StoreResult<T>> + 'static,
{
    future_to_promise(async move {
        let value = operation.await.map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&value)
    })
}

fn rejected(error: JsValue) -> Promise {
    Promise::reject(&error)
}

#[wasm_bindgen]
pub struct TabStash {
    store: Rc<Store>,
}

#[wasm_bindgen]
impl TabStash {
    #[wasm_bindgen(constructor)]
    pub fn new() -> TabStash {
        TabStash {
            store: Rc::new(CollectionStore::new(ChromeStorage)),
        }
    }

    #[wasm_bindgen(js_name = getAll)]
    pub fn get_all(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.get_all().await })
    }

    pub fn search(&self, query: String, filters: JsValue) -> Promise {
        let filters: SearchFilters = match from_js_or_default(filters) {
            Ok(filters) => filters,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.search(&query, &filters).await })
    }

    #[wasm_bindgen(js_name = getDuplicateCounts)]
    pub fn get_duplicate_counts(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.get_duplicate_counts().await })
    }

    #[wasm_bindgen(js_name = duplicatesOf)]
    pub fn duplicates_of(&self, url: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.duplicates_of(&url).await })
    }

    #[wasm_bindgen(js_name = recentSearches)]
    pub fn recent_searches(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.recent_searches().await })
    }

    #[wasm_bindgen(js_name = activityTotals)]
    pub fn activity_totals(&self, month: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.activity_totals(&month).await })
    }

    pub fn snapshot(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.snapshot().await })
    }

    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.export_json().await })
    }

    pub fn initialize(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.initialize().await })
    }

    #[wasm_bindgen(js_name = addCollection)]
    pub fn add_collection(&self, name: String, tabs: JsValue, options: JsValue) -> Promise {
        let parsed = from_js::<Vec<NewTab>>(tabs)
            .and_then(|tabs| Ok((tabs, from_js_or_default::<CollectionOptions>(options)?)));
        let (tabs, options) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.add_collection(&name, tabs, options).await })
    }

    #[wasm_bindgen(js_name = addManualTab)]
    pub fn add_manual_tab(&self, collection_id: String, title: String, url: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.add_manual_tab(&collection_id, &title, &url).await })
    }

    #[wasm_bindgen(js_name = removeTab)]
    pub fn remove_tab(&self, tab_id: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.remove_tab(&tab_id).await })
    }

    #[wasm_bindgen(js_name = moveTab)]
    pub fn move_tab(&self, tab_id: String, target_collection_id: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.move_tab(&tab_id, &target_collection_id).await })
    }

    #[wasm_bindgen(js_name = removeCollection)]
    pub fn remove_collection(&self, collection_id: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.remove_collection(&collection_id).await })
    }

    #[wasm_bindgen(js_name = renameCollection)]
    pub fn rename_collection(&self, collection_id: String, name: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.rename_collection(&collection_id, &name).await })
    }

    #[wasm_bindgen(js_name = togglePin)]
    pub fn toggle_pin(&self, collection_id: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.toggle_pin(&collection_id).await })
    }

    #[wasm_bindgen(js_name = updateNotes)]
    pub fn update_notes(&self, collection_id: String, notes: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.update_notes(&collection_id, &notes).await })
    }

    #[wasm_bindgen(js_name = addTag)]
    pub fn add_tag(&self, tab_id: String, tag: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.add_tag(&tab_id, &tag).await })
    }

    #[wasm_bindgen(js_name = removeTag)]
    pub fn remove_tag(&self, tab_id: String, tag: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.remove_tag(&tab_id, &tag).await })
    }

    #[wasm_bindgen(js_name = setTabArchived)]
    pub fn set_tab_archived(&self, tab_id: String, archived: bool) -> Promise {
        let store = self.store.clone();
        promise(async move { store.set_tab_archived(&tab_id, archived).await })
    }

    #[wasm_bindgen(js_name = setCollectionArchived)]
    pub fn set_collection_archived(&self, collection_id: String, archived: bool) -> Promise {
        let store = self.store.clone();
        promise(async move { store.set_collection_archived(&collection_id, archived).await })
    }

    #[wasm_bindgen(js_name = archiveOldTabs)]
    pub fn archive_old_tabs(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.archive_old_tabs().await })
    }

    #[wasm_bindgen(js_name = mergeDuplicates)]
    pub fn merge_duplicates(&self, url: String, target_collection_id: Option<String>) -> Promise {
        let store = self.store.clone();
        promise(async move {
            store
                .merge_duplicates(&url, target_collection_id.as_deref())
                .await
        })
    }

    #[wasm_bindgen(js_name = mergeAllDuplicates)]
    pub fn merge_all_duplicates(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.merge_all_duplicates().await })
    }

    #[wasm_bindgen(js_name = reorderCollections)]
    pub fn reorder_collections(&self, ordered_ids: JsValue) -> Promise {
        let ordered_ids: Vec<String> = match from_js(ordered_ids) {
            Ok(ids) => ids,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.reorder_collections(&ordered_ids).await })
    }

    #[wasm_bindgen(js_name = reorderTabs)]
    pub fn reorder_tabs(&self, collection_id: String, ordered_tab_ids: JsValue) -> Promise {
        let ordered_tab_ids: Vec<String> = match from_js(ordered_tab_ids) {
            Ok(ids) => ids,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.reorder_tabs(&collection_id, &ordered_tab_ids).await })
    }

    #[wasm_bindgen(js_name = replaceState)]
    pub fn replace_state(&self, collections: JsValue, url_index: JsValue) -> Promise {
        let parsed = from_js::<Vec<Collection>>(collections)
            .and_then(|collections| Ok((collections, from_js_or_default::<UrlIndex>(url_index)?)));
        let (collections, url_index) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.replace_state(collections, url_index).await })
    }

    #[wasm_bindgen(js_name = rebuildUrlIndex)]
    pub fn rebuild_url_index(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.rebuild_url_index().await })
    }

    #[wasm_bindgen(js_name = logAction)]
    pub fn log_action(&self, kind: String, details: JsValue) -> Promise {
        let details: serde_json::Value = match from_js_or_default(details) {
            Ok(details) => details,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.log_action(&kind, details).await })
    }

    #[wasm_bindgen(js_name = updateSettings)]
    pub fn update_settings(&self, update: JsValue) -> Promise {
        let update: SettingsUpdate = match from_js(update) {
            Ok(update) => update,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.update_settings(update).await })
    }

    #[wasm_bindgen(js_name = completeOnboarding)]
    pub fn complete_onboarding(&self) -> Promise {
        let store = self.store.clone();
        promise(async move { store.complete_onboarding().await })
    }

    #[wasm_bindgen(js_name = recordSearch)]
    pub fn record_search(&self, query: String) -> Promise {
        let store = self.store.clone();
        promise(async move { store.record_search(&query).await })
    }

    #[wasm_bindgen(js_name = recordRestore)]
    pub fn record_restore(&self, count: u32) -> Promise {
        let store = self.store.clone();
        promise(async move { store.record_restore(count as usize).await })
    }

    #[wasm_bindgen(js_name = importJson)]
    pub fn import_json(&self, json: String, strategy: JsValue) -> Promise {
        let strategy: ImportStrategy = match from_js_or_default(strategy) {
            Ok(strategy) => strategy,
            Err(e) => return rejected(e),
        };
        let store = self.store.clone();
        promise(async move { store.import_json(&json, strategy).await })
    }
}

impl Default for TabStash {
    fn default() -> Self {
        Self::new()
    }
}

/// Name suggestion for the popup's save field
#[wasm_bindgen(js_name = suggestTitle)]
pub fn suggest_title(tabs: JsValue, contextual: bool) -> Result<String, JsValue> {
    let tabs: Vec<NewTab> = from_js(tabs)?;
    let clock = SystemClock;
    Ok(auto_title::suggest_title(&tabs, clock.now(), clock.utc_offset_minutes(), contextual).name)
}

/// Called from the background page's alarm listener
#[wasm_bindgen(js_name = runMaintenance)]
pub fn run_maintenance() -> Promise {
    promise(async move {
        let store = CollectionStore::new(ChromeStorage);
        let archived = store.archive_old_tabs().await?;
        info!("Maintenance sweep archived {} tabs", archived);
        Ok(archived)
    })
}
