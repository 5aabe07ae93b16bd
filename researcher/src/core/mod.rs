//! Deterministic, pure logic shared by the research loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod continuation;
pub mod format_check;
pub mod html;
pub mod plan;
pub mod profile;
pub mod reflection;
pub mod text;
pub mod types;
