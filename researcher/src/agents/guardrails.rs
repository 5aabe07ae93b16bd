//! Output Guardrails: advisory format and groundedness checks.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::core::format_check;
use crate::core::profile::ResourceProfile;
use crate::core::text::truncate_chars;
use crate::io::llm::{ChatMessage, LlmProvider};
use crate::io::prompt::PromptEngine;

pub const GROUNDEDNESS_TEMPERATURE: f32 = 0.0;
pub const GROUNDEDNESS_MAX_TOKENS: u32 = 10;

pub struct OutputGuardrails {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptEngine>,
    profile: ResourceProfile,
}

impl OutputGuardrails {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<PromptEngine>, profile: ResourceProfile) -> Self {
        Self {
            llm,
            prompts,
            profile,
        }
    }

    /// True iff `COMPLETENESS:`, `DEPTH:` and `VERDICT:` all appear.
    pub fn validate_format(&self, text: &str) -> bool {
        format_check::validate_format(text)
    }

    /// Ask the model whether `report` is supported by `context`.
    ///
    /// Fails open: only an explicit FAIL in the reply yields `false`. A
    /// provider error is logged and treated as a pass.
    #[instrument(skip_all)]
    pub fn check_groundedness(&self, report: &str, context: &str) -> bool {
        let context = truncate_chars(context, self.profile.groundedness_context_chars);
        let prompt = match self.prompts.groundedness(context, report) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "groundedness prompt failed; treating as pass");
                return true;
            }
        };
        match self.llm.generate(
            &[ChatMessage::user(prompt)],
            GROUNDEDNESS_TEMPERATURE,
            GROUNDEDNESS_MAX_TOKENS,
        ) {
            Ok(reply) => groundedness_verdict(&reply),
            Err(err) => {
                warn!(error = %err, "groundedness check failed; treating as pass");
                true
            }
        }
    }
}

/// `false` only when the reply carries an explicit FAIL.
pub fn groundedness_verdict(reply: &str) -> bool {
    !reply.to_uppercase().contains("FAIL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;

    fn guardrails(llm: &Arc<ScriptedLlm>, compact: bool) -> OutputGuardrails {
        OutputGuardrails::new(
            llm.clone(),
            Arc::new(PromptEngine::new()),
            ResourceProfile::for_mode(compact),
        )
    }

    #[test]
    fn only_explicit_fail_is_ungrounded() {
        assert!(!groundedness_verdict("FAIL"));
        assert!(!groundedness_verdict("  fail."));
        assert!(groundedness_verdict("PASS"));
        assert!(groundedness_verdict(""));
        assert!(groundedness_verdict("I am not sure"));
    }

    #[test]
    fn provider_error_fails_open() {
        let llm = Arc::new(ScriptedLlm::failing());
        assert!(guardrails(&llm, false).check_groundedness("report", "context"));
    }

    #[test]
    fn context_is_truncated_by_mode() {
        let llm = Arc::new(ScriptedLlm::new(["FAIL"]));
        let context = "c".repeat(5_000);
        assert!(!guardrails(&llm, true).check_groundedness("report", &context));
        let request = &llm.requests()[0];
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, GROUNDEDNESS_MAX_TOKENS);
        assert!(request.messages[0].content.contains(&"c".repeat(3_000)));
        assert!(!request.messages[0].content.contains(&"c".repeat(3_001)));
    }

    #[test]
    fn format_check_is_exposed() {
        let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));
        let g = guardrails(&llm, false);
        assert!(g.validate_format("completeness: 1 depth: 2 verdict: MORE"));
        assert!(!g.validate_format("COMPLETENESS: 1\nDEPTH: 2"));
    }
}
