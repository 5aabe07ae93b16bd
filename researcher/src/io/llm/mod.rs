//! Generation capability.
//!
//! Every backend implements [`LlmProvider`]; [`build_provider`] picks one from
//! resolved [`ProviderSettings`] at runtime. Calls are blocking and bounded by
//! the configured timeout.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::anthropic::AnthropicProvider;
use self::google::GoogleProvider;
use self::ollama::OllamaProvider;
use self::openai::OpenAiProvider;

/// Supported generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
    Anthropic,
    Google,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ollama,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Google,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(ProviderKind::Ollama),
            "openai" => Some(ProviderKind::OpenAi),
            "anthropic" => Some(ProviderKind::Anthropic),
            "google" | "gemini" => Some(ProviderKind::Google),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama (Local)",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Google => "Google Gemini",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            ProviderKind::Google => "gemini-2.0-flash",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::Ollama => None,
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Google => Some("GOOGLE_API_KEY"),
        }
    }

    pub fn suggested_models(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Ollama => &["llama3", "mistral", "phi3", "gemma2", "llama3.1", "qwen2"],
            ProviderKind::OpenAi => &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"],
            ProviderKind::Anthropic => &[
                "claude-3-5-sonnet-20241022",
                "claude-3-haiku-20240307",
                "claude-3-opus-20240229",
            ],
            ProviderKind::Google => &["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Failure talking to a generation backend. Always fatal to the run.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: missing API key (set {env_var})")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("{provider}: cannot reach {url}")]
    Unreachable {
        provider: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider}: request failed")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider}: authentication rejected (HTTP {status})")]
    Auth { provider: &'static str, status: u16 },
    #[error("{provider}: HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider}: unexpected response: {detail}")]
    InvalidResponse {
        provider: &'static str,
        detail: String,
    },
    #[error("build http client")]
    Client(#[source] reqwest::Error),
}

/// Text generation backend.
pub trait LlmProvider: Send + Sync {
    fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;

    /// Cheap readiness probe; never fails.
    fn is_available(&self) -> bool;

    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    fn describe(&self) -> String {
        format!("{} ({})", self.name(), self.model())
    }
}

/// Fully resolved connection settings for one backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderSettings {
    /// Key for backends that need one.
    pub fn require_api_key(&self) -> Result<&str, ProviderError> {
        match (self.api_key.as_deref(), self.kind.api_key_env()) {
            (Some(key), _) if !key.trim().is_empty() => Ok(key),
            (_, Some(env_var)) => Err(ProviderError::MissingApiKey {
                provider: self.kind.as_str(),
                env_var,
            }),
            (_, None) => Ok(""),
        }
    }
}

/// Construct the backend selected by `settings`.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let provider: Arc<dyn LlmProvider> = match settings.kind {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(settings)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(settings)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(settings)?),
        ProviderKind::Google => Arc::new(GoogleProvider::new(settings)?),
    };
    Ok(provider)
}

/// Catalogue entry shown by the CLI and the web service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: ProviderKind,
    pub name: &'static str,
    pub models: Vec<String>,
    pub requires_key: bool,
    pub active_model: String,
    pub available: bool,
}

impl ProviderInfo {
    /// Describe `settings`, probing availability.
    ///
    /// Ollama is probed over HTTP and its installed models replace the
    /// suggestions when any are found. Keyed backends are available iff a key is set.
    pub fn probe(settings: &ProviderSettings) -> Self {
        let mut info = Self {
            id: settings.kind,
            name: settings.kind.display_name(),
            models: settings
                .kind
                .suggested_models()
                .iter()
                .map(|m| m.to_string())
                .collect(),
            requires_key: settings.kind.api_key_env().is_some(),
            active_model: settings.model.clone(),
            available: false,
        };
        match settings.kind {
            ProviderKind::Ollama => {
                if let Ok(ollama) = OllamaProvider::new(settings)
                    && ollama.is_available()
                {
                    info.available = true;
                    if let Ok(models) = ollama.list_models()
                        && !models.is_empty()
                    {
                        info.models = models;
                    }
                }
            }
            _ => info.available = settings.require_api_key().is_ok(),
        }
        info
    }
}
