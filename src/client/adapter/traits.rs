//! Provider adapter trait definition.

use std::fmt::Debug;

use async_trait::async_trait;

use super::wire::{ChatRequest, ChatResponse, check_status};
use crate::models::ApiProvider;
use crate::types::{ChatCompletion, ChatMessage};
use crate::Result;

/// One streaming-capable chat-completions backend.
///
/// The two implementations differ only in base URL, auth header scheme, and
/// minor payload shape; the router treats them polymorphically via the
/// model's [`ApiProvider`] field.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ApiProvider;

    /// Full URL of the chat-completions endpoint.
    fn chat_url(&self) -> String;

    /// Serialize the request body for this backend.
    fn build_body(&self, messages: &[ChatMessage], model_id: &str, stream: bool)
    -> serde_json::Value;

    fn apply_auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder;

    /// One streaming POST. Non-2xx becomes an error result, never a panic;
    /// on success the caller decodes the response body incrementally and is
    /// responsible for dropping it on every exit path.
    async fn send_stream(
        &self,
        http: &reqwest::Client,
        messages: &[ChatMessage],
        model_id: &str,
    ) -> Result<reqwest::Response> {
        let body = self.build_body(messages, model_id, true);
        let response = self
            .apply_auth_headers(http.post(self.chat_url()))
            .json(&body)
            .send()
            .await?;
        check_status(response).await
    }

    /// One non-streaming request/response.
    async fn send(
        &self,
        http: &reqwest::Client,
        messages: &[ChatMessage],
        model_id: &str,
    ) -> Result<ChatCompletion> {
        let body = self.build_body(messages, model_id, false);
        let response = self
            .apply_auth_headers(http.post(self.chat_url()))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: ChatResponse = response.json().await?;
        parsed.into_completion()
    }
}

pub(super) fn base_request<'a>(
    messages: &'a [ChatMessage],
    model_id: &'a str,
    stream: bool,
    max_tokens: Option<u32>,
) -> ChatRequest<'a> {
    ChatRequest {
        model: model_id,
        messages,
        stream,
        max_tokens,
    }
}
