//! Line and length helpers shared by the plan and reflection parsers.

use std::sync::LazyLock;

use regex::Regex;

static NUMBER_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?\d+[.):]+").expect("numbered marker regex is valid"));
static NUMBER_DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*[-–]").expect("dashed number regex is valid"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•+>]").expect("bullet regex is valid"));

/// Remove leading list markers (`1.`, `2)`, `(3)`, `4.)`, `5 -`, `-`, `*`, `•`) and
/// surrounding whitespace.
///
/// Numbers that belong to the text (`5G rollout`, `2024 trends`, `1.5 million`,
/// `3-phase power`) are kept. A number followed by `.`, `)` or `:` is a marker when
/// whitespace, a letter or the end of line comes next; a number followed by a dash
/// and a bullet both need whitespace or the end of line after them.
pub fn strip_enumeration(line: &str) -> &str {
    let mut rest = line.trim();
    while let Some(end) = leading_marker(rest) {
        rest = rest[end..].trim_start();
    }
    rest
}

fn leading_marker(text: &str) -> Option<usize> {
    let (end, letter_may_follow) = if let Some(found) = NUMBER_PUNCT_RE.find(text) {
        (found.end(), true)
    } else {
        let found = NUMBER_DASH_RE
            .find(text)
            .or_else(|| BULLET_RE.find(text))?;
        (found.end(), false)
    };
    match text[end..].chars().next() {
        None => Some(end),
        Some(next) if next.is_whitespace() => Some(end),
        Some(next) if letter_may_follow && next.is_alphabetic() => Some(end),
        Some(_) => None,
    }
}

/// True for lines that are commentary rather than content.
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
