/// The persisted chrome.storage.local blob and its mutations
///
/// Every method applies one logical change in memory. Callers load the blob,
/// call one of these, and write the whole blob back (see `store`).
use crate::activity::{
    push_action, ActionEntry, ActivityCounts, ActivityKind, ActivityStats, RecentSearches,
};
use crate::auto_title::suggest_title;
use crate::search::SearchHit;
use crate::settings::{Settings, SettingsUpdate};
use crate::tab_data::{Collection, CollectionOptions, NewTab, Tab, Timestamp};
use crate::url_index::UrlIndex;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const STARTER_COLLECTION_NAME: &str = "Getting Started";

/// Root storage structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageData {
    pub collections: Vec<Collection>,
    pub url_index: UrlIndex,
    pub settings: Settings,
    pub action_log: Vec<ActionEntry>,
    #[serde(flatten)]
    pub activity: ActivityStats,
    pub recent_searches: RecentSearches,
    pub has_completed_onboarding: bool,
}

/// Flip a tab's archived flag, keeping the URL index in step
pub(crate) fn transition_archived(index: &mut UrlIndex, tab: &mut Tab, archived: bool) -> bool {
    if tab.archived == archived {
        return false;
    }
    tab.archived = archived;
    if archived {
        index.decrement(&tab.url);
    } else {
        index.increment(&tab.url);
    }
    true
}

impl StorageData {
    pub fn new() -> Self {
        StorageData::default()
    }

    pub fn get_collection(&self, collection_id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == collection_id)
    }

    fn collection_mut(&mut self, collection_id: &str) -> Option<&mut Collection> {
        self.collections.iter_mut().find(|c| c.id == collection_id)
    }

    /// (collection position, tab position) of the first tab with this id
    pub fn locate_tab(&self, tab_id: &str) -> Option<(usize, usize)> {
        self.collections
            .iter()
            .enumerate()
            .find_map(|(ci, c)| c.tab_position(tab_id).map(|ti| (ci, ti)))
    }

    pub fn get_tab(&self, tab_id: &str) -> Option<&Tab> {
        self.locate_tab(tab_id)
            .map(|(ci, ti)| &self.collections[ci].tabs[ti])
    }

    fn tab_mut(&mut self, tab_id: &str) -> Option<&mut Tab> {
        let (ci, ti) = self.locate_tab(tab_id)?;
        Some(&mut self.collections[ci].tabs[ti])
    }

    /// Remove the collection if a removal left it empty and it is not pinned
    pub(crate) fn prune_if_empty(&mut self, collection_id: &str) -> bool {
        let original_len = self.collections.len();
        self.collections
            .retain(|c| c.id != collection_id || !c.is_prunable());
        let pruned = self.collections.len() < original_len;
        if pruned {
            debug!("Pruned empty collection {}", collection_id);
        }
        pruned
    }

    pub fn log_action(&mut self, kind: &str, details: Value, now: Timestamp) {
        push_action(&mut self.action_log, ActionEntry::new(kind, details, now));
    }

    pub fn record_activity(&mut self, kind: ActivityKind, count: usize, now: Timestamp) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.activity.record(kind, count, now);
    }

    pub fn activity_totals(&self, month: &str) -> ActivityCounts {
        self.activity.totals_for_month(month)
    }

    /// Save a new collection. A blank name is replaced by a suggested title.
    pub fn add_collection(
        &mut self,
        name: &str,
        tabs: Vec<NewTab>,
        options: CollectionOptions,
        now: Timestamp,
        utc_offset_minutes: i32,
    ) -> Collection {
        let (name, auto_title_type) = if name.trim().is_empty() {
            let suggested = suggest_title(
                &tabs,
                now,
                utc_offset_minutes,
                self.settings.use_contextual_auto_titles,
            );
            (suggested.name, Some(suggested.kind))
        } else {
            (name.trim().to_string(), options.auto_title_type)
        };

        let mut collection = Collection::new(name, now);
        collection.is_pinned = options.is_pinned;
        collection.notes = options.notes;
        collection.auto_title_type = auto_title_type;
        collection.tabs = tabs.into_iter().map(|t| Tab::from_new(t, now)).collect();

        for tab in &collection.tabs {
            self.url_index.increment(&tab.url);
        }

        if options.prepend {
            self.collections.insert(0, collection.clone());
        } else {
            self.collections.push(collection.clone());
        }

        self.log_action(
            "addCollection",
            json!({
                "collectionId": collection.id,
                "name": collection.name,
                "tabCount": collection.tabs.len(),
            }),
            now,
        );
        self.record_activity(ActivityKind::Saved, collection.tabs.len(), now);

        collection
    }

    pub fn add_manual_tab(
        &mut self,
        collection_id: &str,
        title: &str,
        url: &str,
        now: Timestamp,
    ) -> Option<Tab> {
        let collection = self.collection_mut(collection_id)?;
        let tab = Tab::from_new(NewTab::new(url, title), now);
        collection.tabs.push(tab.clone());
        self.url_index.increment(&tab.url);
        self.record_activity(ActivityKind::Saved, 1, now);
        Some(tab)
    }

    pub fn remove_tab(&mut self, tab_id: &str, now: Timestamp) -> Option<Tab> {
        let (ci, ti) = self.locate_tab(tab_id)?;
        let collection_id = self.collections[ci].id.clone();
        let tab = self.collections[ci].tabs.remove(ti);

        if tab.is_live() {
            self.url_index.decrement(&tab.url);
        }
        self.prune_if_empty(&collection_id);

        self.log_action("removeTab", json!({ "tabId": tab.id, "url": tab.url }), now);
        self.record_activity(ActivityKind::Deleted, 1, now);
        Some(tab)
    }

    /// Splice a tab out of its collection and append it to the target.
    ///
    /// A missing target still removes the tab from its source; the tab is
    /// dropped and no longer counted in the URL index.
    pub fn move_tab(&mut self, tab_id: &str, target_collection_id: &str, now: Timestamp) -> Option<Tab> {
        let (ci, ti) = self.locate_tab(tab_id)?;
        let source_id = self.collections[ci].id.clone();
        let tab = self.collections[ci].tabs.remove(ti);

        match self.collections.iter_mut().find(|c| c.id == target_collection_id) {
            Some(target) => target.tabs.push(tab.clone()),
            None => {
                warn!(
                    "Move target {} not found; tab {} dropped from {}",
                    target_collection_id, tab.id, source_id
                );
                if tab.is_live() {
                    self.url_index.decrement(&tab.url);
                }
            }
        }
        self.prune_if_empty(&source_id);

        self.log_action(
            "moveTab",
            json!({ "tabId": tab.id, "from": source_id, "to": target_collection_id }),
            now,
        );
        Some(tab)
    }

    pub fn remove_collection(&mut self, collection_id: &str, now: Timestamp) -> Option<Collection> {
        let position = self.collections.iter().position(|c| c.id == collection_id)?;
        let collection = self.collections.remove(position);

        for tab in collection.tabs.iter().filter(|t| t.is_live()) {
            self.url_index.decrement(&tab.url);
        }

        self.log_action(
            "removeCollection",
            json!({ "collectionId": collection.id, "name": collection.name, "tabCount": collection.tabs.len() }),
            now,
        );
        self.record_activity(ActivityKind::Deleted, collection.tabs.len(), now);
        Some(collection)
    }

    pub fn rename_collection(&mut self, collection_id: &str, new_name: &str) -> bool {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return false;
        }
        self.collection_mut(collection_id)
            .map(|collection| {
                collection.name = new_name.to_string();
                collection.auto_title_type = None;
            })
            .is_some()
    }

    /// Returns the new pinned state. Unpinning an empty collection prunes it.
    pub fn toggle_pin(&mut self, collection_id: &str) -> Option<bool> {
        let collection = self.collection_mut(collection_id)?;
        collection.is_pinned = !collection.is_pinned;
        let pinned = collection.is_pinned;
        if !pinned {
            self.prune_if_empty(collection_id);
        }
        Some(pinned)
    }

    pub fn update_notes(&mut self, collection_id: &str, notes: &str) -> bool {
        self.collection_mut(collection_id)
            .map(|collection| collection.notes = notes.to_string())
            .is_some()
    }

    pub fn add_tag(&mut self, tab_id: &str, tag: &str) -> bool {
        self.tab_mut(tab_id).is_some_and(|tab| tab.add_tag(tag))
    }

    pub fn remove_tag(&mut self, tab_id: &str, tag: &str) -> bool {
        self.tab_mut(tab_id).is_some_and(|tab| tab.remove_tag(tag))
    }

    /// Returns whether the flag changed
    pub fn set_tab_archived(&mut self, tab_id: &str, archived: bool, now: Timestamp) -> bool {
        let Some((ci, ti)) = self.locate_tab(tab_id) else {
            return false;
        };
        let tab = &mut self.collections[ci].tabs[ti];
        let changed = transition_archived(&mut self.url_index, tab, archived);

        if changed && archived {
            self.record_activity(ActivityKind::Archived, 1, now);
        }
        changed
    }

    /// Applies the flag to the collection and every tab in it.
    /// Returns false only when the collection does not exist.
    pub fn set_collection_archived(&mut self, collection_id: &str, archived: bool, now: Timestamp) -> bool {
        let Some(collection) = self.collections.iter_mut().find(|c| c.id == collection_id) else {
            return false;
        };
        collection.archived = archived;
        let changed = collection
            .tabs
            .iter_mut()
            .map(|tab| transition_archived(&mut self.url_index, tab, archived))
            .filter(|changed| *changed)
            .count();

        if archived {
            self.record_activity(ActivityKind::Archived, changed, now);
        }
        true
    }

    /// Collections named in `ordered_ids` move to the front in that order;
    /// the rest keep their relative order after them.
    pub fn reorder_collections(&mut self, ordered_ids: &[String]) -> bool {
        reorder_by_ids(&mut self.collections, ordered_ids, |c| &c.id)
    }

    pub fn reorder_tabs(&mut self, collection_id: &str, ordered_tab_ids: &[String]) -> bool {
        self.collection_mut(collection_id)
            .is_some_and(|c| reorder_by_ids(&mut c.tabs, ordered_tab_ids, |t| &t.id))
    }

    /// Collections and URL index for a later `replace_state` (undo)
    pub fn snapshot(&self) -> (Vec<Collection>, UrlIndex) {
        (self.collections.clone(), self.url_index.clone())
    }

    pub fn replace_state(&mut self, collections: Vec<Collection>, url_index: UrlIndex) {
        self.collections = collections;
        self.url_index = url_index;
    }

    pub fn rebuild_url_index(&mut self) -> &UrlIndex {
        self.url_index = UrlIndex::rebuild(&self.collections);
        &self.url_index
    }

    /// Every live instance of `url`, in collection then tab order
    pub fn duplicates_of(&self, url: &str) -> Vec<SearchHit> {
        self.collections
            .iter()
            .flat_map(|collection| {
                collection
                    .tabs
                    .iter()
                    .filter(move |t| t.is_live() && t.url == url)
                    .map(move |tab| SearchHit {
                        tab: tab.clone(),
                        collection_id: collection.id.clone(),
                        collection_name: collection.name.clone(),
                        collection_archived: collection.archived,
                    })
            })
            .collect()
    }

    /// Startup bootstrap: make sure a starter collection exists and correct
    /// any index drift. Returns whether the starter collection was created.
    pub fn initialize(&mut self, now: Timestamp) -> bool {
        let created = if self.collections.is_empty() {
            let mut starter = Collection::new(STARTER_COLLECTION_NAME, now);
            starter.notes = "Saved tabs land in collections like this one.".to_string();
            self.collections.push(starter);
            true
        } else {
            false
        };
        self.rebuild_url_index();
        created
    }

    pub fn complete_onboarding(&mut self) -> bool {
        !std::mem::replace(&mut self.has_completed_onboarding, true)
    }

    pub fn update_settings(&mut self, update: SettingsUpdate) -> bool {
        self.settings.apply(update)
    }

    pub fn record_search(&mut self, query: &str) -> bool {
        self.recent_searches.record(query)
    }

    pub fn record_restore(&mut self, count: usize, now: Timestamp) -> bool {
        if count == 0 {
            return false;
        }
        self.record_activity(ActivityKind::Restored, count, now);
        true
    }
}

fn reorder_by_ids<T>(items: &mut Vec<T>, ordered_ids: &[String], id: impl Fn(&T) -> &String) -> bool {
    let before: Vec<String> = items.iter().map(|item| id(item).clone()).collect();

    let mut remaining = std::mem::take(items);
    let mut reordered = Vec::with_capacity(remaining.len());
    for wanted in ordered_ids {
        if let Some(pos) = remaining.iter().position(|item| id(item) == wanted) {
            reordered.push(remaining.remove(pos));
        }
    }
    reordered.extend(remaining);
    *items = reordered;

    items.iter().map(|item| id(item)).ne(before.iter())
}
