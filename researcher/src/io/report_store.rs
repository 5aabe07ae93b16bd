//! Markdown report files under the output directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, TimeZone};
use regex::Regex;
use serde::Serialize;

const MAX_STEM_CHARS: usize = 60;

static UNSAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("unsafe char regex should be valid"));
static SPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("space run regex should be valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub filename: String,
    pub size: u64,
    /// RFC 3339, local time.
    pub modified: String,
}

/// `<sanitised goal>_<YYYYmmdd_HHMMSS>.md`.
pub fn report_filename<Tz: TimeZone>(goal: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let cleaned = UNSAFE_RE.replace_all(goal.trim(), "");
    let joined = SPACE_RUN_RE.replace_all(cleaned.trim(), "_");
    let stem: String = joined.chars().take(MAX_STEM_CHARS).collect();
    let stem = if stem.is_empty() { "report".to_string() } else { stem };
    format!("{stem}_{}.md", now.format("%Y%m%d_%H%M%S"))
}

/// Write `markdown` into `dir`. Without a name, one is derived from `goal`.
pub fn save_report(dir: &Path, goal: &str, markdown: &str, name: Option<&str>) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    let filename = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            validate_filename(name)?;
            if name.ends_with(".md") {
                name.to_string()
            } else {
                format!("{name}.md")
            }
        }
        None => report_filename(goal, &Local::now()),
    };
    let path = dir.join(filename);
    fs::write(&path, markdown).with_context(|| format!("write report {}", path.display()))?;
    Ok(path)
}

/// Saved reports, newest name first. A missing directory lists nothing.
pub fn list_reports(dir: &Path) -> Result<Vec<ReportEntry>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        let meta = entry
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .map(|time| DateTime::<Local>::from(time).to_rfc3339())
            .unwrap_or_default();
        entries.push(ReportEntry {
            filename: entry.file_name().to_string_lossy().into_owned(),
            size: meta.len(),
            modified,
        });
    }
    entries.sort_by(|a, b| b.filename.cmp(&a.filename));
    Ok(entries)
}

/// Marker error for names that could escape the report directory.
#[derive(Debug, thiserror::Error)]
#[error("invalid report name {0:?}")]
pub struct InvalidReportName(pub String);

fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        bail!(InvalidReportName(name.to_string()));
    }
    Ok(())
}

/// Contents of one saved report; `Ok(None)` when it does not exist.
pub fn read_report(dir: &Path, filename: &str) -> Result<Option<String>> {
    validate_filename(filename)?;
    let path = dir.join(filename);
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 5)
            .single()
            .expect("valid time")
    }

    #[test]
    fn filename_sanitises_goal() {
        let name = report_filename("  What's new in   Rust 2024?  (async/await) ", &fixed_now());
        assert_eq!(name, "Whats_new_in_Rust_2024_asyncawait_20240517_093005.md");
    }

    #[test]
    fn filename_caps_length_and_falls_back() {
        let long = "a".repeat(200);
        let name = report_filename(&long, &fixed_now());
        assert_eq!(name, format!("{}_20240517_093005.md", "a".repeat(60)));
        assert_eq!(report_filename("?!*", &fixed_now()), "report_20240517_093005.md");
    }

    #[test]
    fn save_list_and_read() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("outputs");
        let first = save_report(&dir, "goal", "# A", Some("alpha")).expect("save");
        assert_eq!(first.file_name().and_then(|n| n.to_str()), Some("alpha.md"));
        save_report(&dir, "goal", "# B", Some("beta.md")).expect("save");
        fs::write(dir.join("notes.txt"), "ignored").expect("write");

        let listed = list_reports(&dir).expect("list");
        let names: Vec<&str> = listed.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["beta.md", "alpha.md"]);
        assert_eq!(listed[0].size, 3);

        assert_eq!(read_report(&dir, "alpha.md").expect("read").as_deref(), Some("# A"));
        assert_eq!(read_report(&dir, "missing.md").expect("read"), None);
    }

    #[test]
    fn traversal_names_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        for bad in ["../secret.md", "a/b.md", "..", "c\\d.md"] {
            let err = read_report(temp.path(), bad).expect_err("rejected");
            assert!(err.is::<InvalidReportName>(), "{bad}");
        }
        assert!(save_report(temp.path(), "g", "x", Some("../up")).is_err());
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(list_reports(&temp.path().join("nope")).expect("list").is_empty());
    }
}
