/// Import/export of the stored collections as a JSON document
use crate::activity::ActionEntry;
use crate::error::ImportError;
use crate::settings::Settings;
use crate::storage::StorageData;
use crate::tab_data::{generate_id, normalize_tag, AutoTitleType, Collection, Tab, Timestamp};
use crate::url_index::UrlIndex;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

pub const EXPORT_VERSION: u32 = 1;
pub const IMPORTED_COLLECTION_NAME: &str = "Imported Collection";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    version: u32,
    exported_at: Timestamp,
    collections: &'a [Collection],
    url_index: &'a UrlIndex,
    settings: &'a Settings,
    action_log: &'a [ActionEntry],
}

/// Pretty-printed export document
pub fn export_json(data: &StorageData, now: Timestamp) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ExportDocument {
        version: EXPORT_VERSION,
        exported_at: now,
        collections: &data.collections,
        url_index: &data.url_index,
        settings: &data.settings,
        action_log: &data.action_log,
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ImportStrategy {
    /// Overwrite collections (and settings/action log when present)
    #[default]
    Replace,
    /// Prepend imported collections to the existing ones
    Merge,
}

/// A validated, normalized import document
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPayload {
    pub collections: Vec<Collection>,
    pub settings: Option<Settings>,
    pub action_log: Option<Vec<ActionEntry>>,
}

impl ImportPayload {
    pub fn tab_count(&self) -> usize {
        self.collections.iter().map(|c| c.tabs.len()).sum()
    }
}

/// Parse and normalize an import document.
///
/// The top level must be an object with a `collections` array whose entries
/// are objects; every tab must be an object with a non-empty `url`. Missing
/// ids are generated, missing titles default to the URL, and non-array tags
/// become empty.
pub fn parse_import(json: &str, now: Timestamp) -> Result<ImportPayload, ImportError> {
    let root: Value =
        serde_json::from_str(json).map_err(|e| ImportError::InvalidJson(e.to_string()))?;
    let root = root.as_object().ok_or(ImportError::NotAnObject)?;
    let raw_collections = root
        .get("collections")
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingCollections)?;

    let mut seen_ids = HashSet::new();
    let collections = raw_collections
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize_collection(index, raw, now, &mut seen_ids))
        .collect::<Result<Vec<_>, _>>()?;

    let settings = root
        .get("settings")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<Settings>(v.clone()).ok());

    let action_log = root.get("actionLog").and_then(Value::as_array).map(|entries| {
        entries
            .iter()
            .filter_map(|e| serde_json::from_value::<ActionEntry>(e.clone()).ok())
            .collect()
    });

    Ok(ImportPayload {
        collections,
        settings,
        action_log,
    })
}

fn normalize_collection(
    index: usize,
    raw: &Value,
    now: Timestamp,
    seen_ids: &mut HashSet<String>,
) -> Result<Collection, ImportError> {
    let obj = raw
        .as_object()
        .ok_or(ImportError::MalformedCollection { index })?;

    let tabs = match obj.get("tabs") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(raw_tabs)) => raw_tabs
            .iter()
            .enumerate()
            .map(|(tab_index, raw_tab)| {
                normalize_tab(raw_tab, now, seen_ids).ok_or(ImportError::MalformedTab {
                    collection: index,
                    index: tab_index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(ImportError::MalformedCollection { index }),
    };

    Ok(Collection {
        id: unique_id(obj, seen_ids),
        name: string_field(obj, "name").unwrap_or_else(|| IMPORTED_COLLECTION_NAME.to_string()),
        created_at: timestamp_field(obj, "createdAt").unwrap_or(now),
        is_pinned: bool_field(obj, "isPinned"),
        notes: obj.get("notes").and_then(Value::as_str).unwrap_or_default().to_string(),
        archived: bool_field(obj, "archived"),
        auto_title_type: obj
            .get("autoTitleType")
            .and_then(|v| serde_json::from_value::<AutoTitleType>(v.clone()).ok()),
        tabs,
    })
}

fn normalize_tab(raw: &Value, now: Timestamp, seen_ids: &mut HashSet<String>) -> Option<Tab> {
    let obj = raw.as_object()?;
    let url = string_field(obj, "url")?;

    let mut tags: Vec<String> = Vec::new();
    if let Some(raw_tags) = obj.get("tags").and_then(Value::as_array) {
        for tag in raw_tags.iter().filter_map(Value::as_str).filter_map(normalize_tag) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }

    Some(Tab {
        id: unique_id(obj, seen_ids),
        title: string_field(obj, "title").unwrap_or_else(|| url.clone()),
        favicon_url: string_field(obj, "faviconUrl"),
        saved_at: timestamp_field(obj, "savedAt").unwrap_or(now),
        archived: bool_field(obj, "archived"),
        tags,
        url,
    })
}

/// The record's id, or a fresh one when missing or already taken in this file
fn unique_id(obj: &Map<String, Value>, seen_ids: &mut HashSet<String>) -> String {
    let id = string_field(obj, "id")
        .filter(|id| !seen_ids.contains(id))
        .unwrap_or_else(generate_id);
    seen_ids.insert(id.clone());
    id
}

/// Non-blank string field
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn timestamp_field(obj: &Map<String, Value>, key: &str) -> Option<Timestamp> {
    let value = obj.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as Timestamp))
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

impl StorageData {
    /// Apply a validated import. The URL index is always recomputed.
    /// Returns the number of collections imported.
    pub fn apply_import(&mut self, payload: ImportPayload, strategy: ImportStrategy, now: Timestamp) -> usize {
        let imported = payload.collections.len();
        let tab_count = payload.tab_count();

        match strategy {
            ImportStrategy::Replace => {
                self.collections = payload.collections;
                if let Some(settings) = payload.settings {
                    self.settings = settings;
                }
                if let Some(action_log) = payload.action_log {
                    self.action_log = action_log;
                }
            }
            ImportStrategy::Merge => {
                let mut collections = payload.collections;
                self.assign_fresh_ids_on_collision(&mut collections);
                collections.append(&mut self.collections);
                self.collections = collections;
            }
        }
        self.rebuild_url_index();

        info!("Imported {} collections ({} tabs) with {:?}", imported, tab_count, strategy);
        self.log_action(
            "import",
            json!({ "strategy": strategy, "collections": imported, "tabs": tab_count }),
            now,
        );
        imported
    }

    fn assign_fresh_ids_on_collision(&self, incoming: &mut [Collection]) {
        let collection_ids: HashSet<&str> = self.collections.iter().map(|c| c.id.as_str()).collect();
        let tab_ids: HashSet<&str> = self
            .collections
            .iter()
            .flat_map(|c| c.tabs.iter())
            .map(|t| t.id.as_str())
            .collect();

        for collection in incoming.iter_mut() {
            if collection_ids.contains(collection.id.as_str()) {
                collection.id = generate_id();
            }
            for tab in collection.tabs.iter_mut() {
                if tab_ids.contains(tab.id.as_str()) {
                    tab.id = generate_id();
                }
            }
        }
    }
}
