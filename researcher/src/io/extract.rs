//! Readable text extraction from web pages.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::core::html::html_to_lines;
use crate::core::text::truncate_chars;
use crate::io::http::build_browser_client;

/// Lines this short are navigation crumbs, not content.
const MIN_LINE_CHARS: usize = 11;

/// Extraction capability. `None` means nothing usable was found.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, url: &str, max_chars: usize) -> Option<String>;

    /// `(url, text)` for every URL that yielded text, in input order.
    fn extract_many(&self, urls: &[String], max_chars: usize) -> Vec<(String, String)> {
        urls.iter()
            .filter_map(|url| self.extract(url, max_chars).map(|text| (url.clone(), text)))
            .collect()
    }
}

pub struct HttpExtractor {
    client: Client,
}

impl HttpExtractor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = build_browser_client(timeout).context("build extractor http client")?;
        Ok(Self { client })
    }

    fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("status {url}"))?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("text") {
            bail!("non-text content type {content_type:?}");
        }
        response.text().with_context(|| format!("read body {url}"))
    }
}

impl ContentExtractor for HttpExtractor {
    #[instrument(skip_all, fields(url = %url))]
    fn extract(&self, url: &str, max_chars: usize) -> Option<String> {
        if !is_extractable(url) {
            return None;
        }
        match self.fetch(url) {
            Ok(html) => html_to_text(&html, max_chars),
            Err(err) => {
                debug!(error = %format!("{err:#}"), "extraction skipped");
                None
            }
        }
    }
}

pub fn is_extractable(url: &str) -> bool {
    url.starts_with("http") && !url.contains("duckduckgo.com")
}

/// Readable lines of `html`, truncated to `max_chars`; `None` when empty.
pub fn html_to_text(html: &str, max_chars: usize) -> Option<String> {
    let text = html_to_lines(html)
        .into_iter()
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .collect::<Vec<_>>()
        .join("\n");
    let text = truncate_chars(&text, max_chars).trim_end();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>x</title><style>body { color: red }</style></head>
<body>
<header>Site header with a long navigation line</header>
<nav><a href="/">Home</a><a href="/about">About us and more</a></nav>
<main>
  <h1>Grid-scale storage in 2024</h1>
  <p>Lithium iron phosphate dominated new installations.</p>
  <p>Short</p>
  <script>trackVisitor("should never appear in text");</script>
  <p>Costs fell roughly 20&#37; year over year &amp; keep falling.</p>
</main>
<footer>Copyright footer with plenty of characters</footer>
</body></html>"#;

    #[test]
    fn extracts_readable_lines_only() {
        let text = html_to_text(PAGE, 10_000).expect("text");
        assert_eq!(
            text,
            "Grid-scale storage in 2024\n\
             Lithium iron phosphate dominated new installations.\n\
             Costs fell roughly 20% year over year & keep falling."
        );
    }

    #[test]
    fn truncates_on_char_boundaries() {
        let html = "<p>ééééééééééééééééééééé</p>";
        let text = html_to_text(html, 12).expect("text");
        assert_eq!(text.chars().count(), 12);
    }

    #[test]
    fn empty_text_is_absent() {
        assert_eq!(html_to_text("<script>only()</script><p>tiny</p>", 100), None);
    }

    #[test]
    fn skips_non_http_and_search_engine_links() {
        assert!(!is_extractable("ftp://example.com/file"));
        assert!(!is_extractable("https://duckduckgo.com/l/?uddg=x"));
        assert!(is_extractable("https://example.com"));
    }

    struct Fixed;

    impl ContentExtractor for Fixed {
        fn extract(&self, url: &str, _max_chars: usize) -> Option<String> {
            url.ends_with("ok").then(|| format!("text from {url}"))
        }
    }

    #[test]
    fn extract_many_keeps_successes_in_order() {
        let urls = vec![
            "https://a/ok".to_string(),
            "https://b/fail".to_string(),
            "https://c/ok".to_string(),
        ];
        let pairs = Fixed.extract_many(&urls, 100);
        let got: Vec<&str> = pairs.iter().map(|(url, _)| url.as_str()).collect();
        assert_eq!(got, vec!["https://a/ok", "https://c/ok"]);
    }
}
