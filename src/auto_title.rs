/// Collection name suggestions from the tabs being saved
use crate::domain::{count_domains, extract_domain, get_top_domains};
use crate::tab_data::{AutoTitleType, NewTab, Timestamp};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use time::{OffsetDateTime, UtcOffset};

const MAX_SINGLE_TAB_TITLE: usize = 60;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{L}[\p{L}\p{N}'+#]*").unwrap());

const STOPWORDS: &[&str] = &[
    "about", "and", "are", "but", "can", "com", "for", "from", "has", "have", "home", "how",
    "html", "http", "https", "index", "into", "its", "login", "new", "not", "now", "our", "out",
    "page", "sign", "that", "the", "this", "was", "what", "when", "where", "which", "who", "why",
    "will", "with", "www", "you", "your",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedTitle {
    pub name: String,
    pub kind: AutoTitleType,
}

/// Suggest a collection name.
///
/// Tries, in order: a single tab's own title, a dominant domain
/// (at least 60% of two or more tabs), shared title keywords (words in at
/// least two titles and 40% of tabs), and finally the local time of day.
pub fn suggest_title(
    tabs: &[NewTab],
    now: Timestamp,
    utc_offset_minutes: i32,
    contextual: bool,
) -> SuggestedTitle {
    if contextual {
        let contextual_title = match tabs {
            [] => None,
            [tab] => Some(single_tab_title(tab)),
            _ => domain_cluster_title(tabs).or_else(|| keyword_cluster_title(tabs)),
        };
        if let Some(title) = contextual_title {
            return title;
        }
    }

    time_of_day_title(now, utc_offset_minutes)
}

fn single_tab_title(tab: &NewTab) -> SuggestedTitle {
    let title = tab.title.trim();
    let name = if title.is_empty() || title == tab.url {
        extract_domain(&tab.url).unwrap_or_else(|| tab.url.clone())
    } else {
        title.to_string()
    };

    SuggestedTitle {
        name: truncate(&name, MAX_SINGLE_TAB_TITLE),
        kind: AutoTitleType::SingleTab,
    }
}

fn domain_cluster_title(tabs: &[NewTab]) -> Option<SuggestedTitle> {
    let counts = count_domains(tabs.iter().map(|t| t.url.as_str()));
    let (domain, count) = get_top_domains(&counts, 1).into_iter().next()?;

    if count < 2 || count * 10 < tabs.len() * 6 {
        return None;
    }

    let name = if count == tabs.len() {
        domain
    } else {
        format!("{domain} & more")
    };

    Some(SuggestedTitle {
        name,
        kind: AutoTitleType::DomainCluster,
    })
}

fn keyword_cluster_title(tabs: &[NewTab]) -> Option<SuggestedTitle> {
    // document frequency: number of titles containing each word
    let mut frequency: HashMap<String, usize> = HashMap::new();
    for tab in tabs.iter().filter(|t| t.title != t.url) {
        let words: HashSet<String> = WORD
            .find_iter(&tab.title)
            .map(|m| m.as_str().to_lowercase())
            .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
            .collect();
        for word in words {
            *frequency.entry(word).or_insert(0) += 1;
        }
    }

    let mut candidates: Vec<(String, usize)> = frequency
        .into_iter()
        .filter(|(_, n)| *n >= 2 && n * 10 >= tabs.len() * 4)
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    if candidates.is_empty() {
        return None;
    }

    let name = candidates
        .iter()
        .take(2)
        .map(|(word, _)| title_case(word))
        .collect::<Vec<_>>()
        .join(" & ");

    Some(SuggestedTitle {
        name,
        kind: AutoTitleType::KeywordCluster,
    })
}

fn time_of_day_title(now: Timestamp, utc_offset_minutes: i32) -> SuggestedTitle {
    let utc = OffsetDateTime::from_unix_timestamp_nanos(now as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let offset = UtcOffset::from_whole_seconds(utc_offset_minutes * 60).unwrap_or(UtcOffset::UTC);
    let local = utc.to_offset(offset);

    let part = match local.hour() {
        5..=11 => "Morning",
        12..=16 => "Afternoon",
        17..=21 => "Evening",
        _ => "Late Night",
    };
    let month = local.month().to_string();

    SuggestedTitle {
        name: format!("{part} Session, {} {}", &month[..3], local.day()),
        kind: AutoTitleType::TimeOfDay,
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-15T08:00:00Z
    const MORNING: Timestamp = 1_710_489_600_000;

    fn tabs(entries: &[(&str, &str)]) -> Vec<NewTab> {
        entries.iter().map(|(url, title)| NewTab::new(*url, *title)).collect()
    }

    #[test]
    fn test_time_of_day_fallback() {
        let title = suggest_title(&[], MORNING, 0, true);
        assert_eq!(title.kind, AutoTitleType::TimeOfDay);
        assert_eq!(title.name, "Morning Session, Mar 15");

        // UTC-10 puts the same instant at 22:00 the previous day
        let title = suggest_title(&[], MORNING, -600, true);
        assert_eq!(title.name, "Late Night Session, Mar 14");
    }

    #[test]
    fn test_contextual_disabled() {
        let input = tabs(&[("https://github.com/a", "Repo A")]);
        let title = suggest_title(&input, MORNING, 0, false);
        assert_eq!(title.kind, AutoTitleType::TimeOfDay);
    }

    #[test]
    fn test_single_tab() {
        let input = tabs(&[("https://doc.rust-lang.org/book", "The Rust Programming Language")]);
        let title = suggest_title(&input, MORNING, 0, true);
        assert_eq!(title.kind, AutoTitleType::SingleTab);
        assert_eq!(title.name, "The Rust Programming Language");

        let input = tabs(&[("https://www.example.com/x", "https://www.example.com/x")]);
        assert_eq!(suggest_title(&input, MORNING, 0, true).name, "example.com");

        let long = "a".repeat(80);
        let input = tabs(&[("https://a.com", long.as_str())]);
        let name = suggest_title(&input, MORNING, 0, true).name;
        assert_eq!(name.chars().count(), MAX_SINGLE_TAB_TITLE);
        assert!(name.ends_with("..."));
    }

    #[test]
    fn test_domain_cluster() {
        let input = tabs(&[
            ("https://github.com/rust-lang/rust", "rust"),
            ("https://github.com/serde-rs/serde", "serde"),
            ("https://gist.github.com/x", "gist"),
            ("https://docs.rs/yew", "yew"),
        ]);
        let title = suggest_title(&input, MORNING, 0, true);
        assert_eq!(title.kind, AutoTitleType::DomainCluster);
        assert_eq!(title.name, "github.com & more");
    }

    #[test]
    fn test_keyword_cluster() {
        let input = tabs(&[
            ("https://a.com/1", "Rust async book"),
            ("https://b.org/2", "Async Rust patterns"),
            ("https://c.net/3", "Tokio tutorial: async"),
        ]);
        let title = suggest_title(&input, MORNING, 0, true);
        assert_eq!(title.kind, AutoTitleType::KeywordCluster);
        assert_eq!(title.name, "Async & Rust");
    }

    #[test]
    fn test_unrelated_tabs_fall_back_to_time_of_day() {
        let input = tabs(&[
            ("https://a.com/1", "Weather forecast"),
            ("https://b.org/2", "Pasta recipes"),
            ("https://c.net/3", "Train timetable"),
        ]);
        let title = suggest_title(&input, MORNING, 0, true);
        assert_eq!(title.kind, AutoTitleType::TimeOfDay);
    }
}
