/// Bulk tab operations: archive sweep, duplicate merging, display ordering
use crate::activity::ActivityKind;
use crate::storage::{transition_archived, StorageData};
use crate::tab_data::{Collection, DAY_MS, Tab, Timestamp};
use log::info;
use serde_json::json;
use std::collections::HashMap;

impl StorageData {
    /// Archive every live tab in a non-pinned collection saved at or before
    /// `now - archiveDays`. Returns the number of tabs archived.
    pub fn archive_old_tabs(&mut self, now: Timestamp) -> usize {
        if !self.settings.archive_enabled {
            return 0;
        }

        let cutoff = now - i64::from(self.settings.archive_days) * DAY_MS;
        let mut archived = 0;
        for collection in self.collections.iter_mut().filter(|c| !c.is_pinned) {
            for tab in collection.tabs.iter_mut() {
                if !tab.archived && tab.saved_at <= cutoff {
                    transition_archived(&mut self.url_index, tab, true);
                    archived += 1;
                }
            }
        }

        if archived > 0 {
            info!("Archived {} tabs older than {} days", archived, self.settings.archive_days);
            self.log_action("archiveOldTabs", json!({ "count": archived }), now);
            self.record_activity(ActivityKind::Archived, archived, now);
        }
        archived
    }

    /// Collapse every live instance of `url` into one tab.
    ///
    /// The survivor lands in `target_collection_id` when that collection
    /// exists, otherwise in the collection of the first instance found.
    /// Returns the number of instances removed.
    pub fn merge_duplicates(&mut self, url: &str, target_collection_id: Option<&str>, now: Timestamp) -> usize {
        let removed = self.merge_url(url, target_collection_id);
        if removed > 0 {
            info!("Merged {} duplicates of {}", removed, url);
            self.log_action("mergeDuplicates", json!({ "url": url, "removed": removed }), now);
            self.record_activity(ActivityKind::Merged, removed, now);
        }
        removed
    }

    pub fn merge_all_duplicates(&mut self, now: Timestamp) -> usize {
        let removed: usize = duplicated_urls(&self.collections)
            .iter()
            .map(|url| self.merge_url(url, None))
            .sum();

        if removed > 0 {
            info!("Merged {} duplicate tabs", removed);
            self.log_action("mergeAllDuplicates", json!({ "removed": removed }), now);
            self.record_activity(ActivityKind::Merged, removed, now);
        }
        removed
    }

    fn merge_url(&mut self, url: &str, target_collection_id: Option<&str>) -> usize {
        let instances: Vec<&Tab> = self
            .collections
            .iter()
            .flat_map(|c| c.tabs.iter())
            .filter(|t| t.is_live() && t.url == url)
            .collect();
        if instances.len() <= 1 {
            return 0;
        }
        let removed = instances.len() - 1;
        let merged = merge_instances(&instances);

        let target_id = match target_collection_id {
            Some(id) if self.get_collection(id).is_some() => id.to_string(),
            _ => self
                .collections
                .iter()
                .find(|c| c.tabs.iter().any(|t| t.is_live() && t.url == url))
                .map(|c| c.id.clone())
                .unwrap_or_default(),
        };

        let mut insert_at = None;
        let mut emptied_from = Vec::new();
        for collection in &mut self.collections {
            let original_len = collection.tabs.len();
            let mut kept = Vec::with_capacity(original_len);
            for tab in std::mem::take(&mut collection.tabs) {
                if tab.is_live() && tab.url == url {
                    if collection.id == target_id && insert_at.is_none() {
                        insert_at = Some(kept.len());
                    }
                } else {
                    kept.push(tab);
                }
            }
            collection.tabs = kept;
            if collection.tabs.len() < original_len && collection.id != target_id {
                emptied_from.push(collection.id.clone());
            }
        }

        if let Some(target) = self.collections.iter_mut().find(|c| c.id == target_id) {
            let position = insert_at.unwrap_or(target.tabs.len());
            target.tabs.insert(position, merged);
        }
        self.url_index.set(url, 1);

        for collection_id in emptied_from {
            self.prune_if_empty(&collection_id);
        }
        removed
    }
}

/// Combine instances of one URL:
/// earliest save time, longest title that is not the raw URL,
/// union of tags in order of first appearance.
fn merge_instances(instances: &[&Tab]) -> Tab {
    let first = instances[0];

    let title = instances
        .iter()
        .map(|t| t.title.trim())
        .filter(|title| !title.is_empty() && *title != first.url)
        .fold(None::<&str>, |best, title| match best {
            Some(b) if b.chars().count() >= title.chars().count() => Some(b),
            _ => Some(title),
        })
        .unwrap_or(&first.url)
        .to_string();

    let mut tags: Vec<String> = Vec::new();
    for tag in instances.iter().flat_map(|t| t.tags.iter()) {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    Tab {
        id: first.id.clone(),
        url: first.url.clone(),
        title,
        favicon_url: instances.iter().find_map(|t| t.favicon_url.clone()),
        saved_at: instances.iter().map(|t| t.saved_at).min().unwrap_or(first.saved_at),
        archived: false,
        tags,
    }
}

/// URLs with more than one live instance, in discovery order
fn duplicated_urls(collections: &[Collection]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for tab in collections.iter().flat_map(|c| c.tabs.iter()).filter(|t| t.is_live()) {
        let count = counts.entry(tab.url.as_str()).or_insert(0);
        if *count == 0 {
            order.push(tab.url.as_str());
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter(|url| counts[url] > 1)
        .map(str::to_string)
        .collect()
}

/// Pinned collections first, otherwise storage order (stable)
pub fn sorted_for_display(collections: &[Collection]) -> Vec<&Collection> {
    let mut sorted: Vec<&Collection> = collections.iter().collect();
    sorted.sort_by_key(|c| !c.is_pinned);
    sorted
}
