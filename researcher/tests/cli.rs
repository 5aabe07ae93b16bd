//! CLI tests for the `researcher` binary.
//!
//! Spawns the binary in a scratch directory and checks exit codes and the
//! commands that never reach the network.

use std::fs;
use std::process::{Command, Output};

use researcher::exit_codes;

fn researcher(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_researcher"))
        .current_dir(dir)
        .args(args)
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn researcher")
}

#[test]
fn reports_on_missing_directory_is_empty_success() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = researcher(temp.path(), &["reports"]);

    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&out.stdout).contains("No reports in outputs"));
}

#[test]
fn reports_lists_markdown_newest_name_first() {
    let temp = tempfile::tempdir().expect("tempdir");
    let outputs = temp.path().join("outputs");
    fs::create_dir_all(&outputs).expect("mkdir");
    fs::write(outputs.join("alpha_20240101_000000.md"), "# A").expect("write");
    fs::write(outputs.join("beta_20250101_000000.md"), "# B").expect("write");
    fs::write(outputs.join("notes.txt"), "skip").expect("write");

    let out = researcher(temp.path(), &["reports"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let alpha = stdout.find("alpha_").expect("alpha listed");
    let beta = stdout.find("beta_").expect("beta listed");
    assert!(beta < alpha);
    assert!(!stdout.contains("notes.txt"));
}

#[test]
fn invalid_config_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("researcher.toml"),
        "[agent]\nmax_iterations = 0\n",
    )
    .expect("write config");

    let out = researcher(temp.path(), &["reports"]);
    assert_eq!(out.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&out.stderr).contains("max_iterations"));
}

#[test]
fn blank_goal_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = researcher(temp.path(), &["run", "   "]);

    assert_eq!(out.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&out.stderr).contains("goal must be non-empty"));
}

#[test]
fn keyed_provider_without_key_fails_before_research() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = researcher(
        temp.path(),
        &["run", "battery chemistry", "--provider", "anthropic"],
    );

    assert_eq!(out.status.code(), Some(exit_codes::FAILED));
    assert!(!temp.path().join("outputs").exists());
}

#[test]
fn log_filter_from_dotenv_applies() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join(".env"), "RUST_LOG=researcher=debug\n").expect("write .env");

    let out = researcher(temp.path(), &["reports"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&out.stderr).contains("listing reports"));
}
