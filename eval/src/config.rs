//! Agent configuration merging.
//!
//! Turns case-specific overrides into run overrides for the agent.

use anyhow::{Result, anyhow};
use researcher::io::config::RunOverrides;
use researcher::io::llm::ProviderKind;

use crate::case::CaseConfig;

/// Map case configuration onto agent run overrides.
pub fn case_overrides(config: &CaseConfig) -> Result<RunOverrides> {
    let provider = match config.provider.as_deref() {
        Some(name) => Some(
            ProviderKind::parse(name).ok_or_else(|| anyhow!("unknown provider in case: {name}"))?,
        ),
        None => None,
    };
    Ok(RunOverrides {
        provider,
        model: config.model.clone(),
        depth: config.depth.clone(),
        max_iterations: config.max_iterations,
        ..RunOverrides::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_case_config_overrides_nothing() {
        let overrides = case_overrides(&CaseConfig::default()).expect("merge");
        assert_eq!(overrides, RunOverrides::default());
    }

    #[test]
    fn applies_provider_and_limits() {
        let config = CaseConfig {
            depth: Some("exhaustive".to_string()),
            provider: Some("anthropic".to_string()),
            model: None,
            max_iterations: Some(2),
        };
        let overrides = case_overrides(&config).expect("merge");
        assert_eq!(overrides.provider, Some(ProviderKind::Anthropic));
        assert_eq!(overrides.depth.as_deref(), Some("exhaustive"));
        assert_eq!(overrides.max_iterations, Some(2));
    }

    #[test]
    fn rejects_unknown_provider() {
        let config = CaseConfig {
            provider: Some("bedrock".to_string()),
            ..CaseConfig::default()
        };
        assert!(case_overrides(&config).is_err());
    }
}
