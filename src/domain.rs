/// Hostname and registrable-domain helpers for search filters and auto-titles
use std::collections::HashMap;
use url::Url;

/// Lowercased hostname of a URL.
///
/// Parsed with `url` first; strings that do not parse as absolute URLs
/// (e.g. "example.com/path") fall back to stripping a scheme, path and port.
pub fn hostname(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    if let Ok(parsed) = Url::parse(url) {
        return parsed
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_lowercase())
            .filter(|h| !h.is_empty());
    }

    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()?
        .split(':')
        .next()?
        .to_lowercase();

    if host.is_empty() { None } else { Some(host) }
}

/// Registrable domain with smart TLD handling
///
/// - https://www.google.com/search → google.com
/// - https://news.bbc.co.uk/article → bbc.co.uk
/// - https://shop.example.com.au/products → example.com.au
/// - localhost and IP addresses are returned unchanged
pub fn extract_domain(url: &str) -> Option<String> {
    hostname(url).map(|host| {
        if host == "localhost" || is_ip_address(&host) {
            return host;
        }

        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() < 2 {
            return host;
        }

        // .co.uk / .com.au style second-level TLDs keep three labels
        let tld = parts[parts.len() - 1];
        let num_parts = if parts.len() >= 3
            && tld.len() == 2
            && matches!(parts[parts.len() - 2], "co" | "com")
        {
            3
        } else {
            2
        };

        parts[parts.len() - num_parts..].join(".")
    })
}

fn is_ip_address(s: &str) -> bool {
    s.parse::<std::net::IpAddr>().is_ok()
}

/// Count domain occurrences over a set of URLs
pub fn count_domains<'a>(urls: impl IntoIterator<Item = &'a str>) -> HashMap<String, usize> {
    urls.into_iter()
        .filter_map(extract_domain)
        .fold(HashMap::new(), |mut counts, domain| {
            *counts.entry(domain).or_insert(0) += 1;
            counts
        })
}

/// Top N domains by count, ties broken alphabetically
pub fn get_top_domains(counts: &HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut domain_vec: Vec<(String, usize)> = counts
        .iter()
        .map(|(domain, count)| (domain.clone(), *count))
        .collect();

    domain_vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    domain_vec.into_iter().take(n).collect()
}
