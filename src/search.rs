/// Token search over saved tabs
use crate::domain::hostname;
use crate::tab_data::{Collection, DAY_MS, Tab, Timestamp};
use serde::{Deserialize, Serialize};

const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchFilters {
    /// Only tabs in pinned collections
    pub pinned_only: bool,
    /// Only tabs saved within the last seven days
    pub last_7_days: bool,
    /// Case-insensitive substring of the tab's hostname
    pub domain: Option<String>,
}

/// A matching tab annotated with its owning collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub tab: Tab,
    pub collection_id: String,
    pub collection_name: String,
    pub collection_archived: bool,
}

/// Every whitespace token of `query` must occur (case-insensitively) in the
/// tab's title, URL or tags. Tokens are unordered and may match inside words.
/// An empty query matches every tab that passes the filters.
pub fn search(
    collections: &[Collection],
    query: &str,
    filters: &SearchFilters,
    now: Timestamp,
) -> Vec<SearchHit> {
    let query = query.to_lowercase();
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let domain = filters
        .domain
        .as_deref()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty());
    let recent_cutoff = now - RECENT_WINDOW_DAYS * DAY_MS;
    let domain = domain.as_deref();
    let tokens = tokens.as_slice();

    collections
        .iter()
        .filter(|c| !filters.pinned_only || c.is_pinned)
        .flat_map(move |collection| {
            collection
                .tabs
                .iter()
                .filter(move |tab| !filters.last_7_days || tab.saved_at >= recent_cutoff)
                .filter(move |tab| {
                    domain.is_none_or(|d| hostname(&tab.url).is_some_and(|h| h.contains(d)))
                })
                .filter(move |tab| matches_tokens(tab, tokens))
                .map(move |tab| SearchHit {
                    tab: tab.clone(),
                    collection_id: collection.id.clone(),
                    collection_name: collection.name.clone(),
                    collection_archived: collection.archived,
                })
        })
        .collect()
}

fn matches_tokens(tab: &Tab, tokens: &[&str]) -> bool {
    if tokens.is_empty() {
        return true;
    }
    let haystack = format!("{} {} {}", tab.title, tab.url, tab.tags.join(" ")).to_lowercase();
    tokens.iter().all(|token| haystack.contains(token))
}
