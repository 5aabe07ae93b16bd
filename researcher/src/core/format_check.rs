//! Structural check for reflector responses.

/// Markers a well-formed reflection must contain.
pub const REQUIRED_MARKERS: [&str; 3] = ["COMPLETENESS:", "DEPTH:", "VERDICT:"];

/// True iff every required marker appears (case-insensitive substring).
pub fn validate_format(text: &str) -> bool {
    missing_markers(text).is_empty()
}

/// Required markers absent from `text`, in declaration order.
pub fn missing_markers(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    REQUIRED_MARKERS
        .iter()
        .copied()
        .filter(|marker| !lowered.contains(&marker.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_any_case() {
        assert!(validate_format("completeness: 5\nDepth: 4\nverdict: MORE"));
    }

    #[test]
    fn reports_missing_markers() {
        assert!(!validate_format("COMPLETENESS: 5"));
        assert_eq!(missing_markers("COMPLETENESS: 5"), vec!["DEPTH:", "VERDICT:"]);
        assert_eq!(missing_markers("").len(), 3);
    }
}
