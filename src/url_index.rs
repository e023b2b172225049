/// Denormalized URL -> live instance count index
use crate::tab_data::Collection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Count of non-archived tab instances per URL across all collections.
///
/// Maintained incrementally by every mutation in `StorageData`; `rebuild`
/// recomputes it from a full scan. URLs never map to zero, the entry is
/// removed instead, so two indexes describing the same state compare equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct UrlIndex(HashMap<String, u32>);

impl UrlIndex {
    pub fn new() -> Self {
        UrlIndex(HashMap::new())
    }

    /// Recompute from scratch over every non-archived tab
    pub fn rebuild(collections: &[Collection]) -> Self {
        collections
            .iter()
            .flat_map(|c| c.tabs.iter())
            .filter(|t| t.is_live())
            .fold(UrlIndex::new(), |mut index, tab| {
                index.increment(&tab.url);
                index
            })
    }

    pub fn increment(&mut self, url: &str) {
        *self.0.entry(url.to_string()).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, url: &str) {
        if let Some(count) = self.0.get_mut(url) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.0.remove(url);
            }
        }
    }

    pub fn set(&mut self, url: &str, count: u32) {
        if count == 0 {
            self.0.remove(url);
        } else {
            self.0.insert(url.to_string(), count);
        }
    }

    pub fn count(&self, url: &str) -> u32 {
        self.0.get(url).copied().unwrap_or(0)
    }

    pub fn is_duplicate(&self, url: &str) -> bool {
        self.count(url) > 1
    }

    /// URLs with more than one live instance, sorted for stable output
    pub fn duplicate_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .0
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    pub fn as_map(&self) -> &HashMap<String, u32> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, u32>> for UrlIndex {
    fn from(map: HashMap<String, u32>) -> Self {
        UrlIndex(map.into_iter().filter(|(_, count)| *count > 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab_data::{NewTab, Tab};

    fn collection_with(urls: &[(&str, bool)]) -> Collection {
        let mut collection = Collection::new("Test", 0);
        for (url, archived) in urls {
            let mut tab = Tab::from_new(NewTab::new(*url, "T"), 0);
            tab.archived = *archived;
            collection.tabs.push(tab);
        }
        collection
    }

    #[test]
    fn test_rebuild_skips_archived() {
        let collections = vec![
            collection_with(&[("https://a.com", false), ("https://b.com", true)]),
            collection_with(&[("https://a.com", false), ("https://b.com", false)]),
        ];

        let index = UrlIndex::rebuild(&collections);

        assert_eq!(index.count("https://a.com"), 2);
        assert_eq!(index.count("https://b.com"), 1);
        assert_eq!(index.duplicate_urls(), vec!["https://a.com".to_string()]);
    }

    #[test]
    fn test_decrement_removes_empty_entries() {
        let mut index = UrlIndex::new();
        index.increment("https://a.com");
        index.decrement("https://a.com");
        index.decrement("https://a.com");

        assert_eq!(index.count("https://a.com"), 0);
        assert!(index.is_empty());
        assert_eq!(index, UrlIndex::new());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut index = UrlIndex::new();
        index.increment("https://a.com");
        index.increment("https://a.com");

        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"{"https://a.com":2}"#);

        let back: UrlIndex = serde_json::from_str(&json).unwrap();
        assert!(back.is_duplicate("https://a.com"));
    }
}
