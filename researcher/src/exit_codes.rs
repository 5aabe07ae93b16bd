//! Stable exit codes for the `researcher` CLI.

/// Command succeeded; for `run`, a report was produced and saved.
pub const OK: i32 = 0;
/// Invalid config, fatal provider error or any other failure.
pub const FAILED: i32 = 1;
/// The run was stopped before completion (run timeout).
pub const CANCELLED: i32 = 2;
