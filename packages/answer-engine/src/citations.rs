//! Citation helpers shared by provider adapters.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

lazy_static! {
    static ref HREF_REGEX: Regex = Regex::new(r#"href="(https?://[^"]+)""#).unwrap();
}

/// A numbered marker in answer text and the URL it refers to.
///
/// Providers send `null` or omit either field on some links; those links are
/// kept but never used to rewrite markers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CitationLink {
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl CitationLink {
    pub fn new(position: i64, url: impl Into<String>) -> Self {
        Self {
            position: Some(position),
            url: Some(url.into()),
        }
    }

    /// Marker number and URL, when both are usable.
    pub fn marker(&self) -> Option<(i64, &str)> {
        let position = self.position.filter(|p| *p > 0)?;
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        Some((position, url))
    }
}

/// Rewrite `\[n\]` markers, and bare `[n]` markers not already linked, as `[n](url)`.
pub fn link_markers(text: &str, links: &[CitationLink]) -> String {
    let mut result = text.to_string();
    for (position, url) in links.iter().filter_map(CitationLink::marker) {
        let linked = format!("[{position}]({url})");
        result = result.replace(&format!("\\[{position}\\]"), &linked);
        if !result.contains(&format!("[{position}](")) {
            result = result.replace(&format!("[{position}]"), &linked);
        }
    }
    result
}

/// Absolute http(s) URLs from `candidates`, deduplicated in first-seen order.
pub fn collect_urls<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref().trim();
            let url = Url::parse(candidate).ok()?;
            matches!(url.scheme(), "http" | "https").then(|| candidate.to_string())
        })
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}

/// Strings held by a `citations` field that may be null, a string, or an
/// array of strings or `{url}` objects.
pub fn citation_values(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) if !s.is_empty() => vec![s.as_str()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => other.get("url").and_then(Value::as_str),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `href` targets of an HTML answer.
pub fn html_links(html: &str) -> Vec<String> {
    collect_urls(HREF_REGEX.captures_iter(html).filter_map(|c| c.get(1)).map(|m| m.as_str()))
}
