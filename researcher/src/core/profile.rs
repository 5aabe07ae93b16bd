//! Compact vs full resource budgets.

/// Model name prefixes treated as small models.
pub const SMALL_MODELS: &[&str] = &[
    "phi3",
    "phi3:latest",
    "phi3:mini",
    "gemma2:2b",
    "gemma:2b",
    "gemma2:2b-instruct",
    "tinyllama",
    "tinyllama:latest",
    "qwen2:0.5b",
    "qwen2:1.5b",
    "stablelm2",
    "stablelm2:1.6b",
    "phi",
    "phi:latest",
];

/// True when `model` looks like a small local model.
pub fn is_small_model(model: &str) -> bool {
    let model = model.trim().to_lowercase();
    SMALL_MODELS.iter().any(|prefix| model.starts_with(prefix))
}

/// Character and token budgets for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceProfile {
    pub compact: bool,
    /// Web content passed to one analysis call.
    pub max_content_chars: usize,
    /// Pages extracted per query.
    pub max_pages: usize,
    pub chars_per_page: usize,
    pub snippet_chars: usize,
    pub max_analysis_tokens: u32,
    pub max_report_tokens: u32,
    /// Planner and reflector responses.
    pub control_tokens: u32,
    pub groundedness_context_chars: usize,
}

impl ResourceProfile {
    pub fn for_mode(compact: bool) -> Self {
        if compact {
            Self {
                compact,
                max_content_chars: 2000,
                max_pages: 2,
                chars_per_page: 1500,
                snippet_chars: 100,
                max_analysis_tokens: 500,
                max_report_tokens: 2000,
                control_tokens: 300,
                groundedness_context_chars: 3000,
            }
        } else {
            Self {
                compact,
                max_content_chars: 6000,
                max_pages: 3,
                chars_per_page: 3000,
                snippet_chars: 300,
                max_analysis_tokens: 4096,
                max_report_tokens: 8000,
                control_tokens: 500,
                groundedness_context_chars: 8000,
            }
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.compact { "COMPACT" } else { "FULL" }
    }
}
