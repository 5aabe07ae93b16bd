//! Task Planner: goal to an ordered, deduplicated list of search queries.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::plan::{DEFAULT_QUERY_COUNT, clean_plan_lines, target_count};
use crate::core::profile::ResourceProfile;
use crate::io::llm::{ChatMessage, LlmProvider};
use crate::io::prompt::PromptEngine;

pub const PLANNING_TEMPERATURE: f32 = 0.4;

pub struct TaskPlanner {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptEngine>,
    profile: ResourceProfile,
}

impl TaskPlanner {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptEngine>, profile: ResourceProfile) -> Self {
        Self {
            llm,
            prompts,
            profile,
        }
    }

    /// At most `target_count(depth)` queries; empty when the model produced nothing usable.
    #[instrument(skip_all, fields(depth = %depth))]
    pub fn create_plan(&self, goal: &str, depth: &str) -> Result<Vec<String>> {
        let count = target_count(depth, DEFAULT_QUERY_COUNT);
        let compact = self.profile.compact;
        let messages = [
            ChatMessage::system(self.prompts.system(compact)?),
            ChatMessage::user(self.prompts.planning(goal, depth, count, compact)?),
        ];
        let raw = self
            .llm
            .generate(&messages, PLANNING_TEMPERATURE, self.profile.control_tokens)?;
        let plan = clean_plan_lines(&raw, count);
        debug!(target = count, planned = plan.len(), "plan parsed");
        Ok(plan)
    }
}
