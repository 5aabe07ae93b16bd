//! Prompt templates for every generation call.
//!
//! Templates live next to this file as markdown and are embedded at build
//! time. Each research prompt has a full and a compact rendering, selected
//! by the `compact` flag of the run's resource profile.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const PLANNING_TEMPLATE: &str = include_str!("prompts/planning.md");
const ANALYSIS_TEMPLATE: &str = include_str!("prompts/analysis.md");
const REFLECTION_TEMPLATE: &str = include_str!("prompts/reflection.md");
const REPORT_TEMPLATE: &str = include_str!("prompts/report.md");
const TITLE_TEMPLATE: &str = include_str!("prompts/title.md");
const GROUNDEDNESS_TEMPLATE: &str = include_str!("prompts/groundedness.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("system", SYSTEM_TEMPLATE),
            ("planning", PLANNING_TEMPLATE),
            ("analysis", ANALYSIS_TEMPLATE),
            ("reflection", REFLECTION_TEMPLATE),
            ("report", REPORT_TEMPLATE),
            ("title", TITLE_TEMPLATE),
            ("groundedness", GROUNDEDNESS_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("prompt template should be valid");
        }
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render {name} prompt"))?;
        Ok(rendered.trim().to_string())
    }

    pub fn system(&self, compact: bool) -> Result<String> {
        self.render("system", context! { compact })
    }

    pub fn planning(&self, goal: &str, depth: &str, count: usize, compact: bool) -> Result<String> {
        self.render(
            "planning",
            context! { goal => goal.trim(), depth, count, compact },
        )
    }

    pub fn analysis(
        &self,
        query: &str,
        search_results: &str,
        web_content: &str,
        compact: bool,
    ) -> Result<String> {
        self.render(
            "analysis",
            context! { query, search_results, web_content, compact },
        )
    }

    pub fn reflection(&self, goal: &str, summary: &str, compact: bool) -> Result<String> {
        self.render(
            "reflection",
            context! { goal => goal.trim(), summary, compact },
        )
    }

    pub fn report(&self, goal: &str, findings: &str, title: &str, compact: bool) -> Result<String> {
        self.render(
            "report",
            context! { goal => goal.trim(), findings, title, compact },
        )
    }

    pub fn title(&self, goal: &str) -> Result<String> {
        self.render("title", context! { goal => goal.trim() })
    }

    pub fn groundedness(&self, context_text: &str, report: &str) -> Result<String> {
        self.render(
            "groundedness",
            context! { context => context_text, report },
        )
    }
}
