//! Keyless web search: DuckDuckGo HTML with a Google News RSS fallback.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::html::{decode_entities, fragment_text};
use crate::io::http::build_browser_client;

const DDG_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const NEWS_RSS_ENDPOINT: &str = "https://news.google.com/rss/search";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Search capability. Failures degrade to an empty list.
pub trait SearchTool: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult>;
}

static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b([^>]*\bclass\s*=\s*"[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a\s*>"#)
        .expect("result link regex should be valid")
});

static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<(a|div|td|span)\b[^>]*\bclass\s*=\s*"[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td|span)\s*>"#,
    )
    .expect("snippet regex should be valid")
});

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*"([^"]*)""#).expect("href regex should be valid")
});

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<item\b[^>]*>(.*?)</item\s*>").expect("item regex should be valid")
});

static CDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*<!\[CDATA\[(.*)\]\]>\s*$").expect("cdata regex should be valid")
});

/// DuckDuckGo first; Google News RSS when that yields nothing.
pub struct WebSearch {
    client: Client,
}

impl WebSearch {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = build_browser_client(timeout).context("build search http client")?;
        Ok(Self { client })
    }

    fn search_duckduckgo(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let html = self
            .client
            .get(DDG_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .context("duckduckgo request")?
            .error_for_status()
            .context("duckduckgo status")?
            .text()
            .context("duckduckgo body")?;
        Ok(parse_duckduckgo(&html, max_results))
    }

    fn search_news_rss(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let xml = self
            .client
            .get(NEWS_RSS_ENDPOINT)
            .query(&[("q", query), ("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")])
            .send()
            .context("news rss request")?
            .error_for_status()
            .context("news rss status")?
            .text()
            .context("news rss body")?;
        Ok(parse_news_rss(&xml, max_results))
    }
}

impl SearchTool for WebSearch {
    #[instrument(skip_all, fields(query = %query, max_results = max_results))]
    fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        match self.search_duckduckgo(query, max_results) {
            Ok(results) if !results.is_empty() => return results,
            Ok(_) => debug!("duckduckgo returned no results"),
            Err(err) => warn!(error = %format!("{err:#}"), "duckduckgo search failed"),
        }
        match self.search_news_rss(query, max_results) {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "news rss search failed");
                Vec::new()
            }
        }
    }
}

/// Parse a DuckDuckGo HTML results page.
///
/// A snippet belongs to the closest preceding result link.
pub fn parse_duckduckgo(html: &str, max_results: usize) -> Vec<SearchResult> {
    let links: Vec<_> = RESULT_LINK_RE.captures_iter(html).collect();
    let mut results = Vec::new();
    for (idx, caps) in links.iter().enumerate() {
        if results.len() >= max_results {
            break;
        }
        let (Some(whole), Some(attrs), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let title = fragment_text(inner.as_str());
        let Some(url) = HREF_RE
            .captures(attrs.as_str())
            .and_then(|href| href.get(1))
            .map(|href| unwrap_redirect(href.as_str()))
        else {
            continue;
        };
        if title.is_empty() || url.is_empty() {
            continue;
        }
        let window_end = links
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |next| next.start());
        let snippet = SNIPPET_RE
            .captures(&html[whole.end()..window_end])
            .and_then(|snippet| snippet.get(2))
            .map(|snippet| fragment_text(snippet.as_str()))
            .unwrap_or_default();
        results.push(SearchResult {
            title,
            url,
            snippet,
        });
    }
    results
}

/// Resolve DuckDuckGo redirect links (`/l/?uddg=<encoded>`) to the target URL.
pub fn unwrap_redirect(href: &str) -> String {
    let href = decode_entities(href.trim());
    if let Some((_, rest)) = href.split_once("uddg=") {
        let encoded = rest.split('&').next().unwrap_or_default();
        return match urlencoding::decode(encoded) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => encoded.to_string(),
        };
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    href
}

/// Parse an RSS 2.0 feed into results (title, link, description).
pub fn parse_news_rss(xml: &str, max_results: usize) -> Vec<SearchResult> {
    ITEM_RE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .filter_map(|item| {
            let item = item.as_str();
            let title = rss_field(item, "title").map(|t| fragment_text(&t))?;
            let url = rss_field(item, "link")?.trim().to_string();
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let snippet = rss_field(item, "description")
                .map(|d| fragment_text(&decode_entities(&d)))
                .unwrap_or_default();
            Some(SearchResult {
                title,
                url,
                snippet,
            })
        })
        .take(max_results)
        .collect()
}

fn rss_field(item: &str, name: &str) -> Option<String> {
    let open = format!("<{name}");
    let close = format!("</{name}>");
    let start = item.find(&open)?;
    let body_start = start + item[start..].find('>')? + 1;
    let body_end = body_start + item[body_start..].find(&close)?;
    let raw = &item[body_start..body_end];
    let text = match CDATA_RE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().to_string(),
        None => decode_entities(raw),
    };
    Some(text)
}
