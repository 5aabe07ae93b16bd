//! Regex-based HTML cleanup shared by search parsing and page extraction.

use std::sync::LazyLock;

use regex::Regex;

/// Elements whose whole subtree carries no readable content.
pub const NOISE_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "form", "iframe", "noscript", "svg",
    "button", "select",
];

static NOISE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    NOISE_ELEMENTS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("noise element regex should be valid")
        })
        .collect()
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex should be valid"));

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|br|div|h[1-6]|li|tr|td|th|section|article|main|ul|ol|table|blockquote|pre)\b[^>]*>")
        .expect("block tag regex should be valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex should be valid"));

static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:x([0-9a-fA-F]{1,6})|([0-9]{1,7}));").expect("entity regex should be valid")
});

static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("space regex should be valid"));

/// Remove noise elements and comments including their content.
pub fn drop_noise_elements(html: &str) -> String {
    let mut out = COMMENT_RE.replace_all(html, " ").into_owned();
    for re in NOISE_RES.iter() {
        out = re.replace_all(&out, "\n").into_owned();
    }
    out
}

/// Strip every tag; block-level tags become line breaks.
pub fn strip_tags(html: &str) -> String {
    let with_breaks = BLOCK_TAG_RE.replace_all(html, "\n");
    TAG_RE.replace_all(&with_breaks, "").into_owned()
}

/// Decode named entities that commonly appear in page text plus numeric ones.
pub fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...");
    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    // Last so "&amp;lt;" stays "&lt;".
    numeric.replace("&amp;", "&")
}

/// Inline fragment to single-line text (titles, snippets).
pub fn fragment_text(fragment: &str) -> String {
    let text = decode_entities(&TAG_RE.replace_all(fragment, ""));
    SPACE_RE
        .replace_all(&text.replace(['\n', '\r'], " "), " ")
        .trim()
        .to_string()
}

/// Whole document to readable lines.
pub fn html_to_lines(html: &str) -> Vec<String> {
    let text = decode_entities(&strip_tags(&drop_noise_elements(html)));
    text.lines()
        .map(|line| SPACE_RE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_elements_are_removed_with_content() {
        let html = "<p>keep</p><script type=\"x\">var a = 1;</script><NAV>menu</NAV><p>also</p>";
        let lines = html_to_lines(html);
        assert_eq!(lines, vec!["keep".to_string(), "also".to_string()]);
    }

    #[test]
    fn entities_decode_once() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#8217; &#x41;"), "a & b <c> \u{2019} A");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn fragments_collapse_whitespace() {
        assert_eq!(fragment_text("  <b>Rust</b>\n  and&nbsp;<i>tokio</i> "), "Rust and tokio");
    }

    #[test]
    fn block_tags_split_lines() {
        let lines = html_to_lines("<div>first<br>second</div><!-- hidden --><li>third</li>");
        assert_eq!(lines, vec!["first", "second", "third"]);
    }
}
