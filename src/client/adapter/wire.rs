//! Shared request/response wire shapes for the chat-completions endpoints.

use serde::{Deserialize, Serialize};

use crate::types::{ChatCompletion, ChatMessage};
use crate::{Error, Result};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<UsageWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsageWire {
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

impl ChatResponse {
    pub fn into_completion(self) -> Result<ChatCompletion> {
        let content = self
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Api {
                message: "response contained no choices".to_string(),
                status: None,
                error_type: None,
            })?;
        Ok(ChatCompletion {
            content,
            tokens_used: self.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

/// Turn a non-2xx response into an error result, extracting the provider's
/// error envelope when the body carries one.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => Err(Error::Api {
            message: envelope.error.message,
            status: Some(status),
            error_type: envelope.error.error_type,
        }),
        Err(_) => Err(Error::Api {
            message: body,
            status: Some(status),
            error_type: None,
        }),
    }
}
