//! Local Ollama backend (`/api/chat`, streamed).

use std::io::{BufRead, BufReader};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ChatMessage, LlmProvider, ProviderError, ProviderSettings};
use crate::io::http::{build_client, check_status, map_send_error};

const NAME: &str = "ollama";

pub struct OllamaProvider {
    client: Client,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(settings.timeout).map_err(ProviderError::Client)?,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Names of the locally installed models.
    pub fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| map_send_error(NAME, &url, err))?;
        let tags: TagsResponse = check_status(NAME, response)?
            .json()
            .map_err(|err| ProviderError::InvalidResponse {
                provider: NAME,
                detail: err.to_string(),
            })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

impl LlmProvider for OllamaProvider {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = max_tokens))]
    fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
            options: ChatOptions {
                temperature,
                num_predict: max_tokens,
            },
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|err| map_send_error(NAME, &url, err))?;
        let response = check_status(NAME, response)?;
        let text = collect_stream(BufReader::new(response))?;
        debug!(chars = text.len(), "ollama generation finished");
        Ok(text)
    }

    fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.client
            .get(&url)
            .send()
            .is_ok_and(|response| response.status().is_success())
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Concatenate `message.content` from newline-delimited JSON chunks until `done`.
fn collect_stream(reader: impl BufRead) -> Result<String, ProviderError> {
    let mut text = String::new();
    for line in reader.lines() {
        let line = line.map_err(|err| ProviderError::InvalidResponse {
            provider: NAME,
            detail: format!("read stream: {err}"),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: ChatChunk =
            serde_json::from_str(&line).map_err(|err| ProviderError::InvalidResponse {
                provider: NAME,
                detail: format!("parse stream chunk: {err}"),
            })?;
        if let Some(error) = chunk.error {
            return Err(ProviderError::InvalidResponse {
                provider: NAME,
                detail: error,
            });
        }
        if let Some(message) = chunk.message {
            text.push_str(&message.content);
        }
        if chunk.done {
            break;
        }
    }
    Ok(text)
}
