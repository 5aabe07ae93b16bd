//! Side effects: configuration, HTTP backends, web tools and report files.

pub mod config;
pub mod extract;
pub mod http;
pub mod llm;
pub mod prompt;
pub mod report_store;
pub mod search;
