//! Shared blocking HTTP plumbing for providers and web tools.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};

use crate::core::text::truncate_chars;
use crate::io::llm::ProviderError;

/// Browser-like user agent; some sites refuse obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Error bodies are cut to this many characters before surfacing.
const ERROR_BODY_CHARS: usize = 500;

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(30)))
        .build()
}

pub fn build_browser_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(BROWSER_USER_AGENT)
        .build()
}

/// Classify a transport failure.
pub fn map_send_error(provider: &'static str, url: &str, err: reqwest::Error) -> ProviderError {
    if err.is_connect() || err.is_timeout() {
        ProviderError::Unreachable {
            provider,
            url: url.to_string(),
            source: err,
        }
    } else {
        ProviderError::Request {
            provider,
            source: err,
        }
    }
}

/// Pass successful responses through; turn the rest into provider errors.
pub fn check_status(provider: &'static str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(map_http_error(provider, status, &body))
}

pub fn map_http_error(provider: &'static str, status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
            provider,
            status: status.as_u16(),
        },
        _ => ProviderError::Http {
            provider,
            status: status.as_u16(),
            body: truncate_chars(body.trim(), ERROR_BODY_CHARS).to_string(),
        },
    }
}
