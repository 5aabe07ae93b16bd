//! Quality Reflector: scores findings and proposes follow-up queries.

use std::sync::Arc;

use anyhow::Result;
use tracing::instrument;

use crate::core::continuation;
use crate::core::profile::ResourceProfile;
use crate::core::reflection::parse_reflection;
use crate::core::types::Reflection;
use crate::io::llm::{ChatMessage, LlmProvider};
use crate::io::prompt::PromptEngine;

pub const REFLECTION_TEMPERATURE: f32 = 0.2;

pub struct QualityReflector {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptEngine>,
    profile: ResourceProfile,
}

impl QualityReflector {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptEngine>, profile: ResourceProfile) -> Self {
        Self {
            llm,
            prompts,
            profile,
        }
    }

    /// One generation call, then a parse that never fails.
    ///
    /// Only generation errors propagate.
    #[instrument(skip_all)]
    pub fn evaluate(&self, goal: &str, findings_summary: &str) -> Result<Reflection> {
        let compact = self.profile.compact;
        let messages = [
            ChatMessage::system(self.prompts.system(compact)?),
            ChatMessage::user(self.prompts.reflection(goal, findings_summary, compact)?),
        ];
        let raw = self
            .llm
            .generate(&messages, REFLECTION_TEMPERATURE, self.profile.control_tokens)?;
        Ok(parse_reflection(&raw))
    }

    pub fn should_continue(
        &self,
        reflection: &Reflection,
        max_iterations: u32,
        current_iteration: u32,
    ) -> bool {
        continuation::should_continue(reflection, max_iterations, current_iteration)
    }
}
