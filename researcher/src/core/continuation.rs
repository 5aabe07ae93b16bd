//! Convergence policy deciding whether the loop runs another iteration.

use crate::core::types::{Reflection, Verdict};

/// Joint score at or above which iteration stops even on a `MORE` verdict.
pub const QUALITY_THRESHOLD: u32 = 8;

/// Outcome of the continuation check, with the reason for stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    IterationLimit,
    Sufficient,
    NoNewQueries,
    QualityReached,
}

impl Continuation {
    pub fn describe(self) -> &'static str {
        match self {
            Continuation::Continue => "continuing with follow-up queries",
            Continuation::IterationLimit => "iteration limit reached",
            Continuation::Sufficient => "reflector judged research sufficient",
            Continuation::NoNewQueries => "no follow-up queries proposed",
            Continuation::QualityReached => "quality threshold reached",
        }
    }
}

/// Classify whether another iteration should run.
pub fn decide(reflection: &Reflection, max_iterations: u32, current_iteration: u32) -> Continuation {
    if current_iteration >= max_iterations {
        return Continuation::IterationLimit;
    }
    if reflection.verdict != Verdict::More {
        return Continuation::Sufficient;
    }
    if reflection.additional_queries.is_empty() {
        return Continuation::NoNewQueries;
    }
    // (completeness + depth) / 2 < threshold, kept in integers.
    let joint = u32::from(reflection.completeness) + u32::from(reflection.depth);
    if joint < 2 * QUALITY_THRESHOLD {
        Continuation::Continue
    } else {
        Continuation::QualityReached
    }
}

pub fn should_continue(reflection: &Reflection, max_iterations: u32, current_iteration: u32) -> bool {
    decide(reflection, max_iterations, current_iteration) == Continuation::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reflection::parse_reflection;

    fn reflection(completeness: u8, depth: u8, verdict: Verdict, queries: &[&str]) -> Reflection {
        Reflection {
            completeness,
            depth,
            gaps: "gaps".to_string(),
            verdict,
            additional_queries: queries.iter().map(|q| q.to_string()).collect(),
            raw: String::new(),
        }
    }

    #[test]
    fn never_continues_at_the_iteration_bound() {
        for completeness in 0..=10 {
            for depth in 0..=10 {
                for verdict in [Verdict::More, Verdict::Sufficient] {
                    let r = reflection(completeness, depth, verdict, &["follow-up query"]);
                    assert!(!should_continue(&r, 3, 3));
                    assert!(!should_continue(&r, 3, 4));
                }
            }
        }
    }

    #[test]
    fn sufficient_verdict_stops() {
        let r = reflection(2, 2, Verdict::Sufficient, &["follow-up query"]);
        assert_eq!(decide(&r, 3, 1), Continuation::Sufficient);
    }

    #[test]
    fn more_without_queries_stops() {
        let r = reflection(2, 2, Verdict::More, &[]);
        assert_eq!(decide(&r, 3, 1), Continuation::NoNewQueries);
    }

    #[test]
    fn low_scores_with_queries_continue() {
        let r = reflection(7, 8, Verdict::More, &["follow-up query"]);
        assert!(should_continue(&r, 3, 1));
    }

    #[test]
    fn average_of_eight_stops() {
        let r = reflection(8, 8, Verdict::More, &["follow-up query"]);
        assert_eq!(decide(&r, 3, 1), Continuation::QualityReached);
    }

    #[test]
    fn high_scores_override_more_verdict() {
        let r = parse_reflection(
            "COMPLETENESS: 9\nDEPTH: 9\nGAPS: minor\nVERDICT: MORE\nADDITIONAL_QUERIES:\nextra vendor comparison",
        );
        assert_eq!(r.additional_queries.len(), 1);
        assert!(!should_continue(&r, 3, 1));
    }
}
