//! Google Gemini `generateContent` backend.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ChatMessage, LlmProvider, ProviderError, ProviderSettings, Role};
use crate::io::http::{build_client, check_status, map_send_error};

const NAME: &str = "google";

pub struct GoogleProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GoogleProvider {
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

fn text_content(role: Option<&'static str>, text: &str) -> Content {
    Content {
        role,
        parts: vec![Part {
            text: text.to_string(),
        }],
    }
}

/// System turns become `systemInstruction`; assistant turns use the `model` role.
fn build_request(messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> GenerateRequest {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let contents = messages
        .iter()
        .filter_map(|m| match m.role {
            Role::System => None,
            Role::User => Some(text_content(Some("user"), &m.content)),
            Role::Assistant => Some(text_content(Some("model"), &m.content)),
        })
        .collect();
    GenerateRequest {
        contents,
        system_instruction: (!system.is_empty()).then(|| text_content(None, &system.join("\n\n"))),
        generation_config: GenerationConfig {
            temperature,
            max_output_tokens: max_tokens,
        },
    }
}

impl LlmProvider for GoogleProvider {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = max_tokens))]
    fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let endpoint = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = build_request(messages, temperature, max_tokens);
        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|err| map_send_error(NAME, &endpoint, err.without_url()))?;
        let raw = check_status(NAME, response)?
            .text()
            .map_err(|err| map_send_error(NAME, &endpoint, err.without_url()))?;
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
    let parsed: GenerateResponse =
        serde_json::from_str(raw).map_err(|err| ProviderError::InvalidResponse {
            provider: NAME,
            detail: err.to_string(),
        })?;
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: NAME,
            detail: "no candidates[0].content.parts[0].text".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_roles_and_system_instruction() {
        let messages = [
            ChatMessage::system("you are a researcher"),
            ChatMessage::user("question"),
            ChatMessage::assistant("draft"),
        ];
        let value = serde_json::to_value(build_request(&messages, 0.4, 800)).expect("json");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "you are a researcher");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 800);
    }

    #[test]
    fn parses_first_candidate_part() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Title"}]}}]}"#;
        assert_eq!(parse_response(raw).expect("parse"), "Title");
        assert!(parse_response(r#"{"candidates":[]}"#).is_err());
    }
}
