//! Anthropic Messages API backend.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ChatMessage, LlmProvider, ProviderError, ProviderSettings, Role};
use crate::io::http::{build_client, check_status, map_send_error};

const NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let api_key = settings.require_api_key()?.to_string();
        Ok(Self {
            client: build_client(settings.timeout).map_err(ProviderError::Client)?,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// System turns move to the top-level `system` field; the rest stay in order.
fn build_request<'a>(
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
) -> MessagesRequest<'a> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    MessagesRequest {
        model,
        max_tokens,
        temperature,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages: messages.iter().filter(|m| m.role != Role::System).collect(),
    }
}

impl LlmProvider for AnthropicProvider {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = max_tokens))]
    fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        let body = build_request(&self.model, messages, temperature, max_tokens);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|err| map_send_error(NAME, &url, err))?;
        let raw = check_status(NAME, response)?
            .text()
            .map_err(|err| map_send_error(NAME, &url, err))?;
        parse_response(&raw)
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn parse_response(raw: &str) -> Result<String, ProviderError> {
    let parsed: MessagesResponse =
        serde_json::from_str(raw).map_err(|err| ProviderError::InvalidResponse {
            provider: NAME,
            detail: err.to_string(),
        })?;
    let text: Vec<String> = parsed
        .content
        .into_iter()
        .filter(|block| block.kind.is_empty() || block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(ProviderError::InvalidResponse {
            provider: NAME,
            detail: "no text content block".to_string(),
        });
    }
    Ok(text.join(""))
}
