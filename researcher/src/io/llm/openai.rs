//! OpenAI-compatible chat completions backend.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ChatMessage, LlmProvider, ProviderError, ProviderSettings};
use crate::io::http::{build_client, check_status, map_send_error};

const NAME: &str = "openai";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
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

impl LlmProvider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = max_tokens))]
    fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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
    let parsed: ChatCompletionResponse =
        serde_json::from_str(raw).map_err(|err| ProviderError::InvalidResponse {
            provider: NAME,
            detail: err.to_string(),
        })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: NAME,
            detail: "no choices[0].message.content".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"plan line"}}]}"#;
        assert_eq!(parse_response(raw).expect("parse"), "plan line");
    }

    #[test]
    fn null_content_is_invalid() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(
            parse_response(raw),
            Err(ProviderError::InvalidResponse { .. })
        ));
        assert!(parse_response(r#"{"choices":[]}"#).is_err());
    }
}
