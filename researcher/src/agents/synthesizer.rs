//! Report title and body generation.

use std::sync::Arc;

use anyhow::Result;
use tracing::instrument;

use crate::core::profile::ResourceProfile;
use crate::io::llm::{ChatMessage, LlmProvider};
use crate::io::prompt::PromptEngine;

pub const TITLE_TEMPERATURE: f32 = 0.5;
pub const TITLE_MAX_TOKENS: u32 = 100;
pub const REPORT_TEMPERATURE: f32 = 0.4;

pub struct ReportSynthesizer {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptEngine>,
    profile: ResourceProfile,
}

impl ReportSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptEngine>, profile: ResourceProfile) -> Self {
        Self {
            llm,
            prompts,
            profile,
        }
    }

    #[instrument(skip_all)]
    pub fn title(&self, goal: &str) -> Result<String> {
        let messages = [ChatMessage::user(self.prompts.title(goal)?)];
        let raw = self
            .llm
            .generate(&messages, TITLE_TEMPERATURE, TITLE_MAX_TOKENS)?;
        Ok(clean_title(&raw, goal))
    }

    /// Markdown report; a leading `# {title}` is added when the model omitted a heading.
    #[instrument(skip_all)]
    pub fn report(&self, goal: &str, findings_summary: &str, title: &str) -> Result<String> {
        let compact = self.profile.compact;
        let messages = [
            ChatMessage::system(self.prompts.system(compact)?),
            ChatMessage::user(self.prompts.report(goal, findings_summary, title, compact)?),
        ];
        let body = self
            .llm
            .generate(&messages, REPORT_TEMPERATURE, self.profile.max_report_tokens)?;
        Ok(ensure_heading(body.trim(), title))
    }
}

/// Trim whitespace and quotes; fall back to a title derived from the goal.
pub fn clean_title(raw: &str, goal: &str) -> String {
    let title = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim();
    if title.is_empty() {
        format!("Research Report: {}", goal.trim())
    } else {
        title.to_string()
    }
}

pub fn ensure_heading(body: &str, title: &str) -> String {
    if body.starts_with('#') {
        body.to_string()
    } else if body.is_empty() {
        format!("# {title}\n")
    } else {
        format!("# {title}\n\n{body}")
    }
}

/// Report used when nothing was researched; no model call is made.
pub fn empty_report(goal: &str) -> String {
    format!(
        "# Research Report: {}\n\n\
         ## Summary\n\n\
         No research was executed: the planner produced no usable queries for this goal, \
         so there are no findings to report.\n\n\
         ## Next Steps\n\n\
         - Rephrase the goal more specifically and run again.\n\
         - Check that the configured model is reachable and follows instructions.\n",
        goal.trim()
    )
}
