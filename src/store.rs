/// CollectionStore: the read-modify-write service every UI surface goes through
use crate::activity::{ActionEntry, ActivityCounts};
use crate::error::StoreResult;
use crate::search::{search, SearchFilters, SearchHit};
use crate::settings::{Settings, SettingsUpdate};
use crate::storage::StorageData;
use crate::tab_data::{Collection, CollectionOptions, NewTab, Tab, Timestamp};
use crate::transfer::{export_json, parse_import, ImportStrategy};
use crate::url_index::UrlIndex;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Where the blob lives (chrome.storage.local in the extension)
#[allow(async_fn_in_trait)]
pub trait StorageBackend {
    /// `None` when nothing has been stored yet
    async fn load(&self) -> StoreResult<Option<StorageData>>;
    async fn save(&self, data: &StorageData) -> StoreResult<()>;
}

impl<B: StorageBackend> StorageBackend for Rc<B> {
    async fn load(&self) -> StoreResult<Option<StorageData>> {
        (**self).load().await
    }

    async fn save(&self, data: &StorageData) -> StoreResult<()> {
        (**self).save(data).await
    }
}

/// In-process backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RefCell<Option<StorageData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    pub fn with_data(data: StorageData) -> Self {
        MemoryStorage {
            data: RefCell::new(Some(data)),
        }
    }

    pub fn contents(&self) -> Option<StorageData> {
        self.data.borrow().clone()
    }
}

impl StorageBackend for MemoryStorage {
    async fn load(&self) -> StoreResult<Option<StorageData>> {
        Ok(self.data.borrow().clone())
    }

    async fn save(&self, data: &StorageData) -> StoreResult<()> {
        *self.data.borrow_mut() = Some(data.clone());
        Ok(())
    }
}

pub trait Clock {
    fn now(&self) -> Timestamp;

    /// Minutes east of UTC, used for time-of-day titles
    fn utc_offset_minutes(&self) -> i32 {
        0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now(&self) -> Timestamp {
        js_sys::Date::now() as Timestamp
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or(0)
    }

    #[cfg(target_arch = "wasm32")]
    fn utc_offset_minutes(&self) -> i32 {
        -(js_sys::Date::new_0().get_timezone_offset() as i32)
    }
}

/// Whether an operation changed anything worth writing back
pub trait Applied {
    fn applied(&self) -> bool;
}

impl Applied for bool {
    fn applied(&self) -> bool {
        *self
    }
}

impl Applied for usize {
    fn applied(&self) -> bool {
        *self > 0
    }
}

impl<T> Applied for Option<T> {
    fn applied(&self) -> bool {
        self.is_some()
    }
}

struct Always<T>(T);

impl<T> Applied for Always<T> {
    fn applied(&self) -> bool {
        true
    }
}

/// Result of `get_all`: the stored state with settings merged over defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    pub collections: Vec<Collection>,
    pub url_index: UrlIndex,
    pub settings: Settings,
    pub action_log: Vec<ActionEntry>,
}

/// Sole authority over the stored collections, URL index, settings and logs.
///
/// Each operation loads the whole blob, applies one logical change and
/// saves the whole blob back; operations that find nothing to change do not
/// write. There is no locking: two stores over the same backend that
/// interleave a load and a save race, and the last writer wins.
pub struct CollectionStore<B, C = SystemClock> {
    backend: B,
    clock: C,
}

impl<B: StorageBackend> CollectionStore<B> {
    pub fn new(backend: B) -> Self {
        CollectionStore::with_clock(backend, SystemClock)
    }
}

impl<B: StorageBackend, C: Clock> CollectionStore<B, C> {
    pub fn with_clock(backend: B, clock: C) -> Self {
        CollectionStore { backend, clock }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn read(&self) -> StoreResult<StorageData> {
        Ok(self.backend.load().await?.unwrap_or_default())
    }

    async fn write<T: Applied>(
        &self,
        op: &str,
        apply: impl FnOnce(&mut StorageData, Timestamp) -> T,
    ) -> StoreResult<T> {
        let mut data = self.read().await?;
        let result = apply(&mut data, self.clock.now());

        if result.applied() {
            self.backend
                .save(&data)
                .await
                .inspect_err(|e| warn!("{} not saved: {}", op, e))?;
            debug!("{} saved", op);
        } else {
            debug!("{} found nothing to change", op);
        }
        Ok(result)
    }

    async fn write_always<T>(
        &self,
        op: &str,
        apply: impl FnOnce(&mut StorageData, Timestamp) -> T,
    ) -> StoreResult<T> {
        self.write(op, |data, now| Always(apply(data, now)))
            .await
            .map(|Always(result)| result)
    }

    // -- reads --

    pub async fn get_all(&self) -> StoreResult<StoreState> {
        let data = self.read().await?;
        Ok(StoreState {
            collections: data.collections,
            url_index: data.url_index,
            settings: data.settings,
            action_log: data.action_log,
        })
    }

    pub async fn settings(&self) -> StoreResult<Settings> {
        Ok(self.read().await?.settings)
    }

    pub async fn search(&self, query: &str, filters: &SearchFilters) -> StoreResult<Vec<SearchHit>> {
        let data = self.read().await?;
        Ok(search(&data.collections, query, filters, self.clock.now()))
    }

    pub async fn get_duplicate_counts(&self) -> StoreResult<UrlIndex> {
        Ok(self.read().await?.url_index)
    }

    pub async fn duplicates_of(&self, url: &str) -> StoreResult<Vec<SearchHit>> {
        Ok(self.read().await?.duplicates_of(url))
    }

    pub async fn snapshot(&self) -> StoreResult<(Vec<Collection>, UrlIndex)> {
        Ok(self.read().await?.snapshot())
    }

    pub async fn recent_searches(&self) -> StoreResult<Vec<String>> {
        Ok(self.read().await?.recent_searches.as_slice().to_vec())
    }

    pub async fn activity_totals(&self, month: &str) -> StoreResult<ActivityCounts> {
        Ok(self.read().await?.activity_totals(month))
    }

    pub async fn export_json(&self) -> StoreResult<String> {
        let data = self.read().await?;
        Ok(export_json(&data, self.clock.now())?)
    }

    // -- writes --

    pub async fn initialize(&self) -> StoreResult<bool> {
        self.write_always("initialize", |data, now| data.initialize(now))
            .await
    }

    pub async fn add_collection(
        &self,
        name: &str,
        tabs: Vec<NewTab>,
        options: CollectionOptions,
    ) -> StoreResult<Collection> {
        let utc_offset = self.clock.utc_offset_minutes();
        self.write_always("addCollection", |data, now| {
            data.add_collection(name, tabs, options, now, utc_offset)
        })
        .await
    }

    pub async fn add_manual_tab(&self, collection_id: &str, title: &str, url: &str) -> StoreResult<Option<Tab>> {
        self.write("addManualTab", |data, now| {
            data.add_manual_tab(collection_id, title, url, now)
        })
        .await
    }

    pub async fn remove_tab(&self, tab_id: &str) -> StoreResult<Option<Tab>> {
        self.write("removeTab", |data, now| data.remove_tab(tab_id, now))
            .await
    }

    pub async fn move_tab(&self, tab_id: &str, target_collection_id: &str) -> StoreResult<Option<Tab>> {
        self.write("moveTab", |data, now| {
            data.move_tab(tab_id, target_collection_id, now)
        })
        .await
    }

    pub async fn remove_collection(&self, collection_id: &str) -> StoreResult<Option<Collection>> {
        self.write("removeCollection", |data, now| {
            data.remove_collection(collection_id, now)
        })
        .await
    }

    pub async fn rename_collection(&self, collection_id: &str, name: &str) -> StoreResult<bool> {
        self.write("renameCollection", |data, _| {
            data.rename_collection(collection_id, name)
        })
        .await
    }

    pub async fn toggle_pin(&self, collection_id: &str) -> StoreResult<Option<bool>> {
        self.write("togglePin", |data, _| data.toggle_pin(collection_id))
            .await
    }

    pub async fn update_notes(&self, collection_id: &str, notes: &str) -> StoreResult<bool> {
        self.write("updateNotes", |data, _| data.update_notes(collection_id, notes))
            .await
    }

    pub async fn add_tag(&self, tab_id: &str, tag: &str) -> StoreResult<bool> {
        self.write("addTag", |data, _| data.add_tag(tab_id, tag)).await
    }

    pub async fn remove_tag(&self, tab_id: &str, tag: &str) -> StoreResult<bool> {
        self.write("removeTag", |data, _| data.remove_tag(tab_id, tag))
            .await
    }

    pub async fn set_tab_archived(&self, tab_id: &str, archived: bool) -> StoreResult<bool> {
        self.write("setTabArchived", |data, now| {
            data.set_tab_archived(tab_id, archived, now)
        })
        .await
    }

    pub async fn set_collection_archived(&self, collection_id: &str, archived: bool) -> StoreResult<bool> {
        self.write("setCollectionArchived", |data, now| {
            data.set_collection_archived(collection_id, archived, now)
        })
        .await
    }

    /// Periodic maintenance sweep
    pub async fn archive_old_tabs(&self) -> StoreResult<usize> {
        self.write("archiveOldTabs", |data, now| data.archive_old_tabs(now))
            .await
    }

    pub async fn merge_duplicates(&self, url: &str, target_collection_id: Option<&str>) -> StoreResult<usize> {
        self.write("mergeDuplicates", |data, now| {
            data.merge_duplicates(url, target_collection_id, now)
        })
        .await
    }

    pub async fn merge_all_duplicates(&self) -> StoreResult<usize> {
        self.write("mergeAllDuplicates", |data, now| data.merge_all_duplicates(now))
            .await
    }

    pub async fn reorder_collections(&self, ordered_ids: &[String]) -> StoreResult<bool> {
        self.write("reorderCollections", |data, _| {
            data.reorder_collections(ordered_ids)
        })
        .await
    }

    pub async fn reorder_tabs(&self, collection_id: &str, ordered_tab_ids: &[String]) -> StoreResult<bool> {
        self.write("reorderTabs", |data, _| {
            data.reorder_tabs(collection_id, ordered_tab_ids)
        })
        .await
    }

    /// Wholesale overwrite, used for undo with a prior `snapshot`
    pub async fn replace_state(&self, collections: Vec<Collection>, url_index: UrlIndex) -> StoreResult<()> {
        self.write_always("replaceState", |data, _| {
            data.replace_state(collections, url_index)
        })
        .await
    }

    pub async fn rebuild_url_index(&self) -> StoreResult<UrlIndex> {
        self.write_always("rebuildUrlIndex", |data, _| data.rebuild_url_index().clone())
            .await
    }

    pub async fn log_action(&self, kind: &str, details: Value) -> StoreResult<()> {
        self.write_always("logAction", |data, now| data.log_action(kind, details, now))
            .await
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> StoreResult<bool> {
        self.write("updateSettings", |data, _| data.update_settings(update))
            .await
    }

    pub async fn complete_onboarding(&self) -> StoreResult<bool> {
        self.write("completeOnboarding", |data, _| data.complete_onboarding())
            .await
    }

    pub async fn record_search(&self, query: &str) -> StoreResult<bool> {
        self.write("recordSearch", |data, _| data.record_search(query))
            .await
    }

    pub async fn record_restore(&self, count: usize) -> StoreResult<bool> {
        self.write("recordRestore", |data, now| data.record_restore(count, now))
            .await
    }

    /// Validate first; a rejected document leaves storage untouched
    pub async fn import_json(&self, json: &str, strategy: ImportStrategy) -> StoreResult<usize> {
        let payload = parse_import(json, self.clock.now())?;
        self.write_always("import", |data, now| data.apply_import(payload, strategy, now))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ImportError, StoreError};
    use crate::tab_data::DAY_MS;
    use pollster::block_on;
    use std::cell::Cell;

    const NOW: Timestamp = 1_710_504_000_000;

    struct FixedClock(Cell<Timestamp>);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            self.0.get()
        }
    }

    /// Counts saves and can be told to reject them
    #[derive(Default)]
    struct TestStorage {
        inner: MemoryStorage,
        saves: Cell<usize>,
        reject_saves: Cell<bool>,
    }

    impl StorageBackend for TestStorage {
        async fn load(&self) -> StoreResult<Option<StorageData>> {
            self.inner.load().await
        }

        async fn save(&self, data: &StorageData) -> StoreResult<()> {
            if self.reject_saves.get() {
                return Err(StoreError::Storage("QUOTA_BYTES quota exceeded".to_string()));
            }
            self.saves.set(self.saves.get() + 1);
            self.inner.save(data).await
        }
    }

    fn store() -> CollectionStore<TestStorage, FixedClock> {
        CollectionStore::with_clock(TestStorage::default(), FixedClock(Cell::new(NOW)))
    }

    fn tabs(urls: &[&str]) -> Vec<NewTab> {
        urls.iter().map(|u| NewTab::new(*u, "")).collect()
    }

    #[test]
    fn test_get_all_on_empty_storage_uses_defaults() {
        let store = store();
        let state = block_on(store.get_all()).unwrap();

        assert!(state.collections.is_empty());
        assert!(state.url_index.is_empty());
        assert_eq!(state.settings, Settings::default());
        assert!(state.action_log.is_empty());
    }

    #[test]
    fn test_writes_persist_through_backend() {
        let store = store();
        let collection = block_on(store.add_collection(
            "Work",
            tabs(&["https://a.com", "https://a.com"]),
            CollectionOptions::default(),
        ))
        .unwrap();

        let stored = store.backend().inner.contents().unwrap();
        assert_eq!(stored.collections[0].id, collection.id);
        assert_eq!(stored.collections[0].tabs[0].saved_at, NOW);
        assert_eq!(block_on(store.get_duplicate_counts()).unwrap().count("https://a.com"), 2);
        assert_eq!(block_on(store.duplicates_of("https://a.com")).unwrap().len(), 2);
    }

    #[test]
    fn test_not_found_is_a_silent_no_op() {
        let store = store();
        block_on(store.add_collection("Work", tabs(&["https://a.com"]), CollectionOptions::default())).unwrap();
        let saves = store.backend().saves.get();

        assert_eq!(block_on(store.remove_tab("missing")).unwrap(), None);
        assert_eq!(block_on(store.add_manual_tab("missing", "T", "https://t.com")).unwrap(), None);
        assert!(!block_on(store.rename_collection("missing", "X")).unwrap());
        assert_eq!(block_on(store.toggle_pin("missing")).unwrap(), None);
        assert_eq!(block_on(store.merge_all_duplicates()).unwrap(), 0);

        assert_eq!(store.backend().saves.get(), saves);
    }

    #[test]
    fn test_storage_failure_is_reported_and_nothing_changes() {
        let store = store();
        store.backend().reject_saves.set(true);

        let result = block_on(store.add_collection("Work", tabs(&["https://a.com"]), CollectionOptions::default()));

        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert!(block_on(store.get_all()).unwrap().collections.is_empty());
    }

    #[test]
    fn test_archive_sweep_uses_clock() {
        let store = store();
        block_on(store.add_collection("Old", tabs(&["https://a.com"]), CollectionOptions::default())).unwrap();

        assert_eq!(block_on(store.archive_old_tabs()).unwrap(), 0);

        store.clock.0.set(NOW + 30 * DAY_MS);
        assert_eq!(block_on(store.archive_old_tabs()).unwrap(), 1);
        assert!(block_on(store.get_duplicate_counts()).unwrap().is_empty());
    }

    #[test]
    fn test_undo_with_snapshot() {
        let store = store();
        let collection =
            block_on(store.add_collection("Work", tabs(&["https://a.com"]), CollectionOptions::default())).unwrap();
        let (collections, index) = block_on(store.snapshot()).unwrap();

        block_on(store.remove_collection(&collection.id)).unwrap();
        block_on(store.replace_state(collections, index)).unwrap();

        let state = block_on(store.get_all()).unwrap();
        assert_eq!(state.collections[0].id, collection.id);
        assert_eq!(state.url_index.count("https://a.com"), 1);
    }

    #[test]
    fn test_search_and_recent_searches() {
        let store = store();
        let mut new_tabs = tabs(&["https://github.com/x"]);
        new_tabs[0].title = "Foo Bartholomew".to_string();
        block_on(store.add_collection("Work", new_tabs, CollectionOptions::default())).unwrap();

        let hits = block_on(store.search("foo bar", &SearchFilters::default())).unwrap();
        assert_eq!(hits.len(), 1);

        block_on(store.record_search("foo bar")).unwrap();
        assert_eq!(block_on(store.recent_searches()).unwrap(), vec!["foo bar"]);
    }

    #[test]
    fn test_initialize_and_settings() {
        let store = store();

        assert!(block_on(store.initialize()).unwrap());
        assert!(!block_on(store.initialize()).unwrap());
        assert!(block_on(store.complete_onboarding()).unwrap());

        let update = SettingsUpdate { archive_days: Some(7), ..Default::default() };
        assert!(block_on(store.update_settings(update)).unwrap());
        assert_eq!(block_on(store.settings()).unwrap().archive_days, 7);
    }

    #[test]
    fn test_rejected_import_leaves_storage_untouched() {
        let store = store();
        block_on(store.add_collection("Work", tabs(&["https://a.com"]), CollectionOptions::default())).unwrap();
        let saves = store.backend().saves.get();

        let result = block_on(store.import_json(r#"{"collections": 5}"#, ImportStrategy::Replace));

        assert!(matches!(result, Err(StoreError::Import(ImportError::MissingCollections))));
        assert_eq!(store.backend().saves.get(), saves);
    }

    #[test]
    fn test_export_import_round_trip() {
        let store = store();
        block_on(store.add_collection("Work", tabs(&["https://a.com", "https://b.com"]), CollectionOptions::default()))
            .unwrap();
        let before = block_on(store.get_all()).unwrap().collections;
        let json = block_on(store.export_json()).unwrap();

        let other = self::store();
        assert_eq!(block_on(other.import_json(&json, ImportStrategy::Replace)).unwrap(), 1);
        assert_eq!(block_on(other.get_all()).unwrap().collections, before);
    }

    #[test]
    fn test_shared_backend_sees_other_writers() {
        let backend = Rc::new(MemoryStorage::new());
        let popup = CollectionStore::with_clock(backend.clone(), FixedClock(Cell::new(NOW)));
        let manager = CollectionStore::with_clock(backend.clone(), FixedClock(Cell::new(NOW)));

        let collection =
            block_on(popup.add_collection("Work", tabs(&["https://a.com"]), CollectionOptions::default())).unwrap();
        assert!(block_on(manager.rename_collection(&collection.id, "Renamed")).unwrap());

        assert_eq!(backend.contents().unwrap().collections[0].name, "Renamed");
    }
}
