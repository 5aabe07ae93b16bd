//! Research depth mapping and cleanup of raw planner output.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::text::{is_comment, strip_enumeration};

/// Query count used when a depth name is not recognised.
pub const DEFAULT_QUERY_COUNT: usize = 5;

/// Candidates with fewer characters are treated as noise.
pub const MIN_QUERY_CHARS: usize = 11;

/// How broad the initial plan should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    #[default]
    Detailed,
    Exhaustive,
}

impl Depth {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "quick" => Some(Depth::Quick),
            "detailed" => Some(Depth::Detailed),
            "exhaustive" => Some(Depth::Exhaustive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Quick => "quick",
            Depth::Detailed => "detailed",
            Depth::Exhaustive => "exhaustive",
        }
    }

    pub fn query_count(self) -> usize {
        match self {
            Depth::Quick => 3,
            Depth::Detailed => 5,
            Depth::Exhaustive => 8,
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of queries to plan for `depth`, or `default_count` for unknown names.
pub fn target_count(depth: &str, default_count: usize) -> usize {
    Depth::parse(depth).map_or(default_count, Depth::query_count)
}

/// Turn raw model output (one candidate per line) into an ordered plan.
///
/// - list markers are stripped and surrounding whitespace trimmed
/// - blank lines and `#` comment lines are dropped
/// - duplicates are removed case-insensitively, first occurrence wins
/// - candidates shorter than [`MIN_QUERY_CHARS`] are dropped
/// - the result holds at most `target` entries
///
/// Running the filter over its own output (joined by newlines) is a no-op.
pub fn clean_plan_lines(raw: &str, target: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    for line in raw.lines() {
        if queries.len() >= target {
            break;
        }
        if line.trim().is_empty() || is_comment(line) {
            continue;
        }
        let candidate = strip_enumeration(line);
        if candidate.is_empty() || is_comment(candidate) {
            continue;
        }
        if candidate.chars().count() < MIN_QUERY_CHARS {
            continue;
        }
        if seen.insert(candidate.to_lowercase()) {
            queries.push(candidate.to_string());
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_maps_to_counts() {
        assert_eq!(target_count("quick", 9), 3);
        assert_eq!(target_count("detailed", 9), 5);
        assert_eq!(target_count("EXHAUSTIVE", 9), 8);
    }

    #[test]
    fn unknown_depth_uses_caller_default() {
        assert_eq!(target_count("thorough", 4), 4);
        assert_eq!(target_count("", DEFAULT_QUERY_COUNT), DEFAULT_QUERY_COUNT);
    }

    #[test]
    fn cleans_markers_comments_and_noise() {
        let raw = "\
# Plan
1. SIP trunk failover patterns
2. short
- carrier redundancy for contact centers

3) # not a query
* SBC high availability designs";
        let plan = clean_plan_lines(raw, 10);
        assert_eq!(
            plan,
            vec![
                "SIP trunk failover patterns",
                "carrier redundancy for contact centers",
                "SBC high availability designs",
            ]
        );
    }

    #[test]
    fn deduplicates_case_insensitively_keeping_first() {
        let raw = "Cloud PBX pricing models\ncloud pbx PRICING models\nOn-prem PBX support costs";
        let plan = clean_plan_lines(raw, 10);
        assert_eq!(plan, vec!["Cloud PBX pricing models", "On-prem PBX support costs"]);

        let raw = "1.battery storage cost trends\n\
                   2.battery storage cost trends\n\
                   3 - sodium ion battery maturity\n\
                   4.) grid storage safety incidents";
        let plan = clean_plan_lines(raw, 10);
        assert_eq!(
            plan,
            vec![
                "battery storage cost trends",
                "sodium ion battery maturity",
                "grid storage safety incidents",
            ]
        );
    }

    #[test]
    fn truncates_to_target() {
        let raw = (1..=6)
            .map(|i| format!("{i}. research question number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let plan = clean_plan_lines(&raw, 3);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], "research question number 1");
    }

    #[test]
    fn plan_properties_hold_for_every_depth() {
        let raw = "\
1. Contact center migration checklist
2. contact CENTER migration checklist
3. WebRTC agent desktop options
4. tiny
5. Workforce management integrations
6. Speech analytics vendors compared
7. CRM screen-pop via CTI adapters
8. Disaster recovery for cloud IVR
9. Number porting timelines and risks
10. Omnichannel routing strategies
11. Quality monitoring and call recording law";
        for depth in [Depth::Quick, Depth::Detailed, Depth::Exhaustive] {
            let plan = clean_plan_lines(raw, depth.query_count());
            assert!(plan.len() <= depth.query_count());
            let lowered: HashSet<String> = plan.iter().map(|q| q.to_lowercase()).collect();
            assert_eq!(lowered.len(), plan.len());
            assert!(plan.iter().all(|q| q.chars().count() >= MIN_QUERY_CHARS));
        }
    }

    #[test]
    fn filter_is_idempotent() {
        let raw = "\
1. 1. doubled marker query text
- # looks like a comment once stripped
(2) Second candidate query
second candidate QUERY
   * third bullet candidate   
4.fourth tight marker query
5 - fifth dashed marker query
6.) sixth compound marker query
7.) 7.fourth tight marker query";
        let once = clean_plan_lines(raw, 10);
        let twice = clean_plan_lines(&once.join("\n"), 10);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 6);
        assert_eq!(once[3], "fourth tight marker query");
    }

    #[test]
    fn empty_output_yields_empty_plan() {
        assert!(clean_plan_lines("", 5).is_empty());
        assert!(clean_plan_lines("\n# nothing\n1.\n", 5).is_empty());
    }
}
