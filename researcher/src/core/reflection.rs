//! Tolerant parser for reflector output.
//!
//! The reflector is asked for a fixed block:
//!
//! ```text
//! COMPLETENESS: 7
//! DEPTH: 6
//! GAPS: recent cost data
//! VERDICT: MORE
//! ADDITIONAL_QUERIES:
//! battery storage cost per kWh 2024
//! ```
//!
//! Models drift from that shape, so parsing never fails. Each field has a
//! fallback:
//!
//! | field | fallback |
//! |---|---|
//! | completeness, depth | [`DEFAULT_SCORE`]; values above 10 clamp to 10 |
//! | gaps | [`DEFAULT_GAPS`] when absent or blank |
//! | verdict | `SUFFICIENT` |
//! | additional queries | empty; at most [`MAX_ADDITIONAL_QUERIES`] |

use std::sync::LazyLock;

use regex::Regex;

use crate::core::text::{is_comment, strip_enumeration};
use crate::core::types::{Reflection, Verdict};

pub const DEFAULT_SCORE: u8 = 5;
pub const MAX_SCORE: u8 = 10;
pub const DEFAULT_GAPS: &str = "Unable to parse";
pub const MAX_ADDITIONAL_QUERIES: usize = 2;

// Markers only count at the start of a line (after optional bullet or emphasis
// characters), so prose such as "lacks depth: no data" stays inside its block.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#-]*(COMPLETENESS|DEPTH|GAPS|VERDICT|ADDITIONAL_QUERIES)\**\s*:")
        .expect("marker regex is valid")
});
static COMPLETENESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#-]*COMPLETENESS\**\s*:[\s*\[]*(\d+)")
        .expect("completeness regex is valid")
});
static DEPTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#-]*DEPTH\**\s*:[\s*\[]*(\d+)").expect("depth regex is valid")
});
static VERDICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#-]*VERDICT\**\s*:[\s*\[]*(MORE|SUFFICIENT)\b")
        .expect("verdict regex is valid")
});

/// Parse free-form reflector text into a fully populated [`Reflection`].
pub fn parse_reflection(text: &str) -> Reflection {
    let gaps = marker_block(text, "GAPS")
        .filter(|block| !block.is_empty())
        .map_or_else(|| DEFAULT_GAPS.to_string(), str::to_string);

    let verdict = VERDICT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(Verdict::Sufficient, |m| {
            if m.as_str().eq_ignore_ascii_case("MORE") {
                Verdict::More
            } else {
                Verdict::Sufficient
            }
        });

    let additional_queries = marker_block(text, "ADDITIONAL_QUERIES")
        .map(parse_query_lines)
        .unwrap_or_default();

    Reflection {
        completeness: parse_score(&COMPLETENESS_RE, text),
        depth: parse_score(&DEPTH_RE, text),
        gaps,
        verdict,
        additional_queries,
        raw: text.to_string(),
    }
}

fn parse_score(re: &Regex, text: &str) -> u8 {
    let Some(digits) = re.captures(text).and_then(|caps| caps.get(1)) else {
        return DEFAULT_SCORE;
    };
    // A digit run too long for u64 is still "more than ten".
    let value = digits.as_str().parse::<u64>().unwrap_or(u64::MAX);
    u8::try_from(value.min(u64::from(MAX_SCORE))).unwrap_or(MAX_SCORE)
}

/// Text after the first `name:` marker, up to the next marker or end of input.
fn marker_block<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let mut markers = MARKER_RE.captures_iter(text);
    let start = markers.by_ref().find_map(|caps| {
        let label = caps.get(1)?;
        label
            .as_str()
            .eq_ignore_ascii_case(name)
            .then(|| caps.get(0).map(|m| m.end()))
            .flatten()
    })?;
    let end = markers
        .filter_map(|caps| caps.get(0).map(|m| m.start()))
        .find(|pos| *pos >= start)
        .unwrap_or(text.len());
    Some(text[start..end].trim())
}

fn parse_query_lines(block: &str) -> Vec<String> {
    block
        .lines()
        .filter(|line| !is_comment(line))
        .map(strip_enumeration)
        .map(|line| line.trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\'')).trim())
        .filter(|line| !line.is_empty() && !is_none_marker(line))
        .take(MAX_ADDITIONAL_QUERIES)
        .map(str::to_string)
        .collect()
}

fn is_none_marker(line: &str) -> bool {
    let word = line.trim_end_matches('.');
    word.eq_ignore_ascii_case("none") || word.eq_ignore_ascii_case("n/a")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
COMPLETENESS: 7
DEPTH: 6
GAPS: No pricing data for tier-2 vendors.
Missing migration timelines.
VERDICT: MORE
ADDITIONAL_QUERIES:
1. tier-2 CCaaS vendor pricing
2. typical PBX migration timelines
3. a third query that is over the cap";

    #[test]
    fn parses_well_formed_block() {
        let reflection = parse_reflection(WELL_FORMED);
        assert_eq!(reflection.completeness, 7);
        assert_eq!(reflection.depth, 6);
        assert_eq!(
            reflection.gaps,
            "No pricing data for tier-2 vendors.\nMissing migration timelines."
        );
        assert_eq!(reflection.verdict, Verdict::More);
        assert_eq!(
            reflection.additional_queries,
            vec!["tier-2 CCaaS vendor pricing", "typical PBX migration timelines"]
        );
        assert_eq!(reflection.raw, WELL_FORMED);
    }

    #[test]
    fn empty_input_yields_defaults() {
        let reflection = parse_reflection("");
        assert_eq!(reflection.completeness, DEFAULT_SCORE);
        assert_eq!(reflection.depth, DEFAULT_SCORE);
        assert_eq!(reflection.gaps, DEFAULT_GAPS);
        assert_eq!(reflection.verdict, Verdict::Sufficient);
        assert!(reflection.additional_queries.is_empty());
    }

    #[test]
    fn verdict_only_input_keeps_other_defaults() {
        let reflection = parse_reflection("VERDICT: MORE");
        assert_eq!(reflection.verdict, Verdict::More);
        assert_eq!(reflection.completeness, DEFAULT_SCORE);
        assert_eq!(reflection.depth, DEFAULT_SCORE);
        assert_eq!(reflection.gaps, DEFAULT_GAPS);
        assert!(reflection.additional_queries.is_empty());
    }

    #[test]
    fn markers_are_case_insensitive_and_scores_clamp() {
        let reflection = parse_reflection(
            "completeness: 42\ndepth: [99999999999999999999999]\nverdict: more",
        );
        assert_eq!(reflection.completeness, MAX_SCORE);
        assert_eq!(reflection.depth, MAX_SCORE);
        assert_eq!(reflection.verdict, Verdict::More);
    }

    #[test]
    fn gaps_stop_at_the_next_marker() {
        let reflection =
            parse_reflection("GAPS: vendor SLAs\nADDITIONAL_QUERIES: none\nVERDICT: SUFFICIENT");
        assert_eq!(reflection.gaps, "vendor SLAs");
        assert!(reflection.additional_queries.is_empty());
        assert_eq!(reflection.verdict, Verdict::Sufficient);
    }

    #[test]
    fn marker_words_inside_prose_stay_in_gaps() {
        let reflection = parse_reflection(
            "COMPLETENESS: 6\nDEPTH: 4\nGAPS: The analysis lacks depth: no cost data for 2024.\n\
             Vendor completeness: only two covered.\nVERDICT: MORE\nADDITIONAL_QUERIES:\nnone",
        );
        assert_eq!(
            reflection.gaps,
            "The analysis lacks depth: no cost data for 2024.\nVendor completeness: only two covered."
        );
        assert_eq!(reflection.completeness, 6);
        assert_eq!(reflection.depth, 4);
        assert_eq!(reflection.verdict, Verdict::More);
    }

    #[test]
    fn bulleted_and_bold_markers_are_recognised() {
        let reflection =
            parse_reflection("- **COMPLETENESS**: 8\n- **DEPTH:** 7\n**VERDICT**: SUFFICIENT");
        assert_eq!(reflection.completeness, 8);
        assert_eq!(reflection.depth, 7);
        assert_eq!(reflection.verdict, Verdict::Sufficient);
    }

    #[test]
    fn blank_gaps_fall_back() {
        let reflection = parse_reflection("GAPS:\nVERDICT: SUFFICIENT");
        assert_eq!(reflection.gaps, DEFAULT_GAPS);
    }

    #[test]
    fn queries_block_ends_at_following_marker() {
        let reflection = parse_reflection(
            "ADDITIONAL_QUERIES: [SIP trunk failover]\nVERDICT: MORE\nCOMPLETENESS: 3\nDEPTH: 4",
        );
        assert_eq!(reflection.additional_queries, vec!["SIP trunk failover"]);
        assert_eq!(reflection.completeness, 3);
        assert_eq!(reflection.depth, 4);
    }

    #[test]
    fn none_lines_are_dropped() {
        let reflection = parse_reflection("VERDICT: SUFFICIENT\nADDITIONAL_QUERIES:\n- None.\n");
        assert!(reflection.additional_queries.is_empty());
    }

    #[test]
    fn unrecognised_verdict_defaults_to_sufficient() {
        let reflection = parse_reflection("VERDICT: maybe later");
        assert_eq!(reflection.verdict, Verdict::Sufficient);
    }
}
