//! LLM judge for generated reports.
//!
//! Scores relevance and fact coverage out of 10 and gives a formatting
//! pass/fail. Parsing is tolerant: missing fields fall back to defaults.

use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use regex::Regex;
use researcher::io::config::AgentConfig;
use researcher::io::llm::{ChatMessage, LlmProvider, ProviderKind, build_provider};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const JUDGE_TEMPERATURE: f32 = 0.1;
pub const JUDGE_MAX_TOKENS: u32 = 300;
/// Judge model used whenever an OpenAI key is present.
pub const OPENAI_JUDGE_MODEL: &str = "gpt-4o-mini";

const MAX_SCORE: u8 = 10;
const PARSE_FAILED_FEEDBACK: &str = "Parsing failed.";

static RELEVANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)RELEVANCE:\s*(\d+)").expect("valid relevance regex"));
static ACCURACY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ACCURACY:\s*(\d+)").expect("valid accuracy regex"));
static FORMATTING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FORMATTING:\s*(PASS|FAIL)").expect("valid formatting regex"));
static FEEDBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)FEEDBACK:\s*(.+)$").expect("valid feedback regex"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Formatting {
    Pass,
    #[default]
    Fail,
}

/// Parsed judge verdict, persisted to `judgment.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Judgment {
    pub relevance: u8,
    pub accuracy: u8,
    pub formatting: Formatting,
    pub feedback: String,
    pub raw_response: String,
}

pub struct Judge {
    llm: Arc<dyn LlmProvider>,
}

impl Judge {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// OpenAI `gpt-4o-mini` when `OPENAI_API_KEY` is set, else the configured provider.
    pub fn from_config(config: &AgentConfig, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let has_openai_key = env("OPENAI_API_KEY").is_some_and(|key| !key.trim().is_empty());
        let settings = if has_openai_key {
            let mut settings = config.provider_settings(ProviderKind::OpenAi, env);
            settings.model = OPENAI_JUDGE_MODEL.to_string();
            settings
        } else {
            config.provider_settings(config.provider, env)
        };
        let llm = build_provider(&settings)
            .with_context(|| format!("build {} judge", settings.kind))?;
        Ok(Self::new(llm))
    }

    pub fn describe(&self) -> String {
        self.llm.describe()
    }

    #[instrument(skip_all, fields(facts = expected_facts.len()))]
    pub fn score(&self, question: &str, expected_facts: &[String], report: &str) -> Result<Judgment> {
        let prompt = judge_prompt(question, expected_facts, report);
        let reply = self
            .llm
            .generate(&[ChatMessage::user(prompt)], JUDGE_TEMPERATURE, JUDGE_MAX_TOKENS)
            .context("judge report")?;
        let judgment = parse_judgment(&reply);
        debug!(
            relevance = judgment.relevance,
            accuracy = judgment.accuracy,
            formatting = ?judgment.formatting,
            "report judged"
        );
        Ok(judgment)
    }
}

pub fn judge_prompt(question: &str, expected_facts: &[String], report: &str) -> String {
    let facts = expected_facts
        .iter()
        .map(|fact| format!("- {fact}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are an expert evaluator benchmarking research reports.\n\
         Below is a generated report responding to a specific research question.\n\n\
         QUESTION: {question}\n\n\
         EXPECTED FACTS TO COVER:\n{facts}\n\n\
         === GENERATED REPORT ===\n\
         {report}\n\
         ========================\n\n\
         Evaluate the report on the following criteria. Format your response exactly as shown below.\n\n\
         RELEVANCE: [Score 1-10] (Did it answer the question directly without drifting?)\n\
         ACCURACY: [Score 1-10] (Did it cover the expected facts?)\n\
         FORMATTING: [PASS/FAIL] (Is it a well-structured markdown document?)\n\
         FEEDBACK: [1-2 sentences explaining the scores]"
    )
}

fn score(re: &Regex, reply: &str) -> u8 {
    re.captures(reply)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map_or(0, |n| n.min(u32::from(MAX_SCORE)) as u8)
}

pub fn parse_judgment(reply: &str) -> Judgment {
    let formatting = match FORMATTING_RE.captures(reply) {
        Some(caps) if caps[1].eq_ignore_ascii_case("PASS") => Formatting::Pass,
        _ => Formatting::Fail,
    };
    let feedback = FEEDBACK_RE
        .captures(reply)
        .map(|caps| caps[1].trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| PARSE_FAILED_FEEDBACK.to_string());
    Judgment {
        relevance: score(&RELEVANCE_RE, reply),
        accuracy: score(&ACCURACY_RE, reply),
        formatting,
        feedback,
        raw_response: reply.to_string(),
    }
}

pub fn write_judgment(path: &Path, judgment: &Judgment) -> Result<()> {
    let contents = serde_json::to_string_pretty(judgment).context("serialize judgment")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
