//! Task Executor: one query in, analysis and sources out.

use std::sync::Arc;

use anyhow::Result;
use tracing::instrument;

use crate::core::profile::ResourceProfile;
use crate::core::text::truncate_chars;
use crate::core::types::Phase;
use crate::io::extract::ContentExtractor;
use crate::io::llm::{ChatMessage, LlmProvider};
use crate::io::prompt::PromptEngine;
use crate::io::search::{SearchResult, SearchTool};
use crate::observer::Progress;

/// Analysis recorded when a search returns nothing.
pub const NO_RESULTS_ANALYSIS: &str = "No search results found for this query.";

/// Stand-in web content when no page could be extracted.
pub const NO_CONTENT_NOTICE: &str =
    "No detailed content could be extracted. Use search snippets above.";

pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub analysis: String,
    /// URLs whose content reached the analysis, in extraction order.
    pub sources: Vec<String>,
}

/// Runs a single research query.
///
/// Implementations log through `progress`; a cancelled run surfaces as the
/// error returned from the next log call.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, query: &str, progress: &mut Progress<'_>) -> Result<TaskResult>;
}

/// Search, extract the top pages, then ask the model for an analysis.
pub struct WebResearchExecutor {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptEngine>,
    search: Box<dyn SearchTool>,
    extractor: Box<dyn ContentExtractor>,
    max_search_results: usize,
    profile: ResourceProfile,
}

impl WebResearchExecutor {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        prompts: Arc<PromptEngine>,
        search: Box<dyn SearchTool>,
        extractor: Box<dyn ContentExtractor>,
        max_search_results: usize,
        profile: ResourceProfile,
    ) -> Self {
        Self {
            llm,
            prompts,
            search,
            extractor,
            max_search_results,
            profile,
        }
    }
}

impl TaskExecutor for WebResearchExecutor {
    #[instrument(skip_all, fields(query = %query))]
    fn execute(&self, query: &str, progress: &mut Progress<'_>) -> Result<TaskResult> {
        progress.log(Phase::Search, format!("Searching: {query}"))?;
        let results = self.search.search(query, self.max_search_results);
        if results.is_empty() {
            progress.log(Phase::Search, format!("No results found for: {query}"))?;
            return Ok(TaskResult {
                analysis: NO_RESULTS_ANALYSIS.to_string(),
                sources: Vec::new(),
            });
        }
        progress.log(Phase::Search, format!("Found {} results", results.len()))?;

        let snippets = render_snippets(&results, self.profile.snippet_chars);

        progress.log(
            Phase::Extract,
            format!("Extracting content from top {} sources", self.profile.max_pages),
        )?;
        let urls: Vec<String> = results
            .iter()
            .take(self.profile.max_pages)
            .map(|r| r.url.clone())
            .collect();
        let pages = self.extractor.extract_many(&urls, self.profile.chars_per_page);
        let (web_content, sources) = render_pages(&results, &pages);
        progress.log(
            Phase::Extract,
            format!("Extracted content from {} pages", sources.len()),
        )?;

        progress.log(Phase::Analyze, "Analyzing findings")?;
        let compact = self.profile.compact;
        let messages = [
            ChatMessage::system(self.prompts.system(compact)?),
            ChatMessage::user(self.prompts.analysis(
                query,
                &snippets,
                truncate_chars(&web_content, self.profile.max_content_chars),
                compact,
            )?),
        ];
        let analysis = self.llm.generate(
            &messages,
            ANALYSIS_TEMPERATURE,
            self.profile.max_analysis_tokens,
        )?;
        progress.log(Phase::Analyze, "Analysis complete")?;

        Ok(TaskResult { analysis, sources })
    }
}

fn render_snippets(results: &[SearchResult], snippet_chars: usize) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "- [{}]({})\n  {}",
                r.title,
                r.url,
                truncate_chars(&r.snippet, snippet_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Source blocks for extracted pages plus the URLs that yielded content.
fn render_pages(results: &[SearchResult], pages: &[(String, String)]) -> (String, Vec<String>) {
    let mut content = String::new();
    let mut sources = Vec::new();
    for (url, text) in pages {
        if text.is_empty() {
            continue;
        }
        let title = results
            .iter()
            .find(|r| &r.url == url)
            .map_or(url.as_str(), |r| r.title.as_str());
        content.push_str(&format!("\n--- SOURCE: {title} ({url}) ---\n{text}\n"));
        sources.push(url.clone());
    }
    if content.is_empty() {
        content = NO_CONTENT_NOTICE.to_string();
    }
    (content, sources)
}
