//! Agent configuration stored in `researcher.toml`.
//!
//! The file is edited by humans; every section is optional and falls back to
//! defaults. [`AgentConfig::resolve`] merges the file, per-run overrides and
//! API keys from the environment into an immutable [`RunSettings`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::core::plan::Depth;
use crate::core::profile::{ResourceProfile, is_small_model};
use crate::io::llm::{ProviderInfo, ProviderKind, ProviderSettings};

pub const DEFAULT_CONFIG_PATH: &str = "researcher.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Active generation backend.
    pub provider: ProviderKind,
    pub agent: AgentSection,
    pub output: OutputSection,
    pub timeouts: TimeoutSection,
    pub ollama: ProviderSection,
    pub openai: ProviderSection,
    pub anthropic: ProviderSection,
    pub google: ProviderSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentSection {
    pub max_iterations: u32,
    pub max_search_results: usize,
    /// `quick`, `detailed` or `exhaustive`; unknown names plan five queries.
    pub research_depth: String,
    /// Absent means auto-detect from the model name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact_mode: Option<bool>,
    pub check_groundedness: bool,
    /// Wall-clock budget for a CLI run; 0 disables.
    pub run_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            max_search_results: 5,
            research_depth: Depth::default().as_str().to_string(),
            compact_mode: None,
            check_groundedness: false,
            run_timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputSection {
    pub directory: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("outputs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutSection {
    pub llm_secs: u64,
    pub search_secs: u64,
    pub extract_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            llm_secs: 120,
            search_secs: 15,
            extract_secs: 15,
        }
    }
}

/// Per-backend connection settings. Missing fields use the backend defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ProviderSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            agent: AgentSection::default(),
            output: OutputSection::default(),
            timeouts: TimeoutSection::default(),
            ollama: ProviderSection::default(),
            openai: ProviderSection::default(),
            anthropic: ProviderSection::default(),
            google: ProviderSection::default(),
        }
    }
}

/// Per-run overrides from the CLI or a web request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub depth: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub check_groundedness: Option<bool>,
    pub max_iterations: Option<u32>,
}

/// Everything one run needs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub provider: ProviderSettings,
    pub depth: String,
    pub max_iterations: u32,
    pub max_search_results: usize,
    pub profile: ResourceProfile,
    pub check_groundedness: bool,
    pub output_dir: PathBuf,
    pub search_timeout: Duration,
    pub extract_timeout: Duration,
    pub run_timeout: Option<Duration>,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(anyhow!("agent.max_iterations must be > 0"));
        }
        if self.agent.max_search_results == 0 {
            return Err(anyhow!("agent.max_search_results must be > 0"));
        }
        if self.output.directory.as_os_str().is_empty() {
            return Err(anyhow!("output.directory must be non-empty"));
        }
        if self.timeouts.llm_secs == 0
            || self.timeouts.search_secs == 0
            || self.timeouts.extract_secs == 0
        {
            return Err(anyhow!("timeouts must be > 0"));
        }
        for kind in ProviderKind::ALL {
            let section = self.section(kind);
            if section.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                return Err(anyhow!("{kind}.model must be non-empty"));
            }
            if section.base_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                return Err(anyhow!("{kind}.base_url must be non-empty"));
            }
        }
        Ok(())
    }

    pub fn section(&self, kind: ProviderKind) -> &ProviderSection {
        match kind {
            ProviderKind::Ollama => &self.ollama,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Google => &self.google,
        }
    }

    /// Connection settings for `kind`; the environment key wins over the file.
    pub fn provider_settings(
        &self,
        kind: ProviderKind,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> ProviderSettings {
        let section = self.section(kind);
        let api_key = kind
            .api_key_env()
            .and_then(env)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| section.api_key.clone());
        ProviderSettings {
            kind,
            model: section
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string()),
            base_url: section
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string()),
            api_key,
            timeout: Duration::from_secs(self.timeouts.llm_secs),
        }
    }

    pub fn resolve(
        &self,
        overrides: &RunOverrides,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<RunSettings> {
        self.validate()?;
        let kind = overrides.provider.unwrap_or(self.provider);
        let mut provider = self.provider_settings(kind, env);
        if let Some(model) = overrides.model.as_deref().map(str::trim) {
            if model.is_empty() {
                bail!("model override must be non-empty");
            }
            provider.model = model.to_string();
        }
        let depth = overrides
            .depth
            .clone()
            .unwrap_or_else(|| self.agent.research_depth.clone());
        let max_iterations = overrides.max_iterations.unwrap_or(self.agent.max_iterations);
        if max_iterations == 0 {
            bail!("max_iterations override must be > 0");
        }
        let compact = self
            .agent
            .compact_mode
            .unwrap_or_else(|| is_small_model(&provider.model));
        Ok(RunSettings {
            provider,
            depth,
            max_iterations,
            max_search_results: self.agent.max_search_results,
            profile: ResourceProfile::for_mode(compact),
            check_groundedness: overrides
                .check_groundedness
                .unwrap_or(self.agent.check_groundedness),
            output_dir: overrides
                .output_dir
                .clone()
                .unwrap_or_else(|| self.output.directory.clone()),
            search_timeout: Duration::from_secs(self.timeouts.search_secs),
            extract_timeout: Duration::from_secs(self.timeouts.extract_secs),
            run_timeout: (self.agent.run_timeout_secs > 0)
                .then(|| Duration::from_secs(self.agent.run_timeout_secs)),
        })
    }
}

/// Catalogue of every backend with its resolved model and availability.
pub fn provider_catalog(
    config: &AgentConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Vec<ProviderInfo> {
    ProviderKind::ALL
        .into_iter()
        .map(|kind| ProviderInfo::probe(&config.provider_settings(kind, env)))
        .collect()
}

/// Reads the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
