/// Data structures for Tab Stash
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Milliseconds since the Unix epoch, as reported by `Date.now()`
pub type Timestamp = i64;

pub const DAY_MS: Timestamp = 86_400_000;

/// Generate a fresh record id
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Normalize a tag to trimmed lowercase; blank tags are rejected
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() { None } else { Some(tag) }
}

/// How a collection name was generated (display styling only)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AutoTitleType {
    TimeOfDay,
    SingleTab,
    DomainCluster,
    KeywordCluster,
}

/// A saved tab within a collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    pub saved_at: Timestamp,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Tab {
    /// Build a stored tab from caller input, assigning a fresh id and save time.
    /// A blank title falls back to the URL.
    pub fn from_new(new_tab: NewTab, now: Timestamp) -> Tab {
        let title = if new_tab.title.trim().is_empty() {
            new_tab.url.clone()
        } else {
            new_tab.title
        };

        Tab {
            id: generate_id(),
            url: new_tab.url,
            title,
            favicon_url: new_tab.favicon_url.filter(|f| !f.is_empty()),
            saved_at: now,
            archived: false,
            tags: Vec::new(),
        }
    }

    /// Whether this instance counts towards the URL index
    pub fn is_live(&self) -> bool {
        !self.archived
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        match normalize_tag(tag) {
            Some(tag) if !self.tags.contains(&tag) => {
                self.tags.push(tag);
                true
            }
            _ => false,
        }
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        let original_len = self.tags.len();
        self.tags.retain(|t| *t != tag);
        self.tags.len() < original_len
    }
}

/// Caller-supplied tab data for save actions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewTab {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub favicon_url: Option<String>,
}

impl NewTab {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> NewTab {
        NewTab {
            url: url.into(),
            title: title.into(),
            favicon_url: None,
        }
    }
}

/// A named, ordered group of saved tabs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_title_type: Option<AutoTitleType>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

impl Collection {
    pub fn new(name: impl Into<String>, now: Timestamp) -> Collection {
        Collection {
            id: generate_id(),
            name: name.into(),
            created_at: now,
            is_pinned: false,
            notes: String::new(),
            archived: false,
            auto_title_type: None,
            tabs: Vec::new(),
        }
    }

    pub fn tab_position(&self, tab_id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == tab_id)
    }

    /// Empty and unpinned collections are pruned after removals
    pub fn is_prunable(&self) -> bool {
        self.tabs.is_empty() && !self.is_pinned
    }
}

/// Options for `add_collection`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionOptions {
    /// Insert at the front of the list (the popup's save) rather than the end
    pub prepend: bool,
    pub is_pinned: bool,
    pub notes: String,
    pub auto_title_type: Option<AutoTitleType>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        CollectionOptions {
            prepend: true,
            is_pinned: false,
            notes: String::new(),
            auto_title_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_from_new() {
        let tab = Tab::from_new(NewTab::new("https://google.com", "Google"), 1_000);

        assert!(!tab.id.is_empty());
        assert_eq!(tab.url, "https://google.com");
        assert_eq!(tab.title, "Google");
        assert_eq!(tab.saved_at, 1_000);
        assert!(!tab.archived);
        assert!(tab.tags.is_empty());
    }

    #[test]
    fn test_blank_title_falls_back_to_url() {
        let tab = Tab::from_new(NewTab::new("https://example.com/a", "  "), 0);
        assert_eq!(tab.title, "https://example.com/a");
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = Tab::from_new(NewTab::new("https://a.com", "A"), 0);
        let b = Tab::from_new(NewTab::new("https://a.com", "A"), 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_tags_are_normalized_and_deduplicated() {
        let mut tab = Tab::from_new(NewTab::new("https://rust-lang.org", "Rust"), 0);

        assert!(tab.add_tag("  Rust "));
        assert!(!tab.add_tag("RUST"));
        assert!(!tab.add_tag("   "));
        assert!(tab.add_tag("lang"));
        assert_eq!(tab.tags, vec!["rust", "lang"]);

        assert!(tab.remove_tag("Rust"));
        assert!(!tab.remove_tag("missing"));
        assert_eq!(tab.tags, vec!["lang"]);
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let mut collection = Collection::new("Reading", 1698508200000);
        collection.auto_title_type = Some(AutoTitleType::DomainCluster);
        collection
            .tabs
            .push(Tab::from_new(NewTab::new("https://google.com", "Google"), 1698508200000));

        let json = serde_json::to_value(&collection).unwrap();

        assert_eq!(json["createdAt"], 1698508200000i64);
        assert_eq!(json["isPinned"], false);
        assert_eq!(json["autoTitleType"], "domainCluster");
        assert_eq!(json["tabs"][0]["savedAt"], 1698508200000i64);
        assert!(json["tabs"][0].get("faviconUrl").is_none());

        let deserialized: Collection = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, collection);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"id":"c1","name":"Old","createdAt":5,
            "tabs":[{"id":"t1","url":"https://a.com","title":"A","savedAt":5}]}"#;
        let collection: Collection = serde_json::from_str(json).unwrap();

        assert!(!collection.is_pinned);
        assert_eq!(collection.notes, "");
        assert_eq!(collection.auto_title_type, None);
        assert!(!collection.tabs[0].archived);
        assert!(collection.tabs[0].tags.is_empty());
    }
}
