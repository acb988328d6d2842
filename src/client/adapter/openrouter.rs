//! OpenRouter adapter.

use secrecy::{ExposeSecret, SecretString};

use super::traits::{ProviderAdapter, base_request};
use crate::models::ApiProvider;
use crate::types::ChatMessage;

const BASE_URL: &str = "https://openrouter.ai";
const CHAT_ENDPOINT: &str = "/api/v1/chat/completions";

/// OpenRouter speaks the OpenAI wire format but wants attribution headers
/// (`HTTP-Referer`, `X-Title`) on every request.
#[derive(Debug)]
pub struct OpenRouterAdapter {
    api_key: SecretString,
    base_url: String,
    referer: String,
    title: String,
}

impl OpenRouterAdapter {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            referer: "https://modelgate.dev".to_string(),
            title: "modelgate".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_attribution(
        mut self,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    fn kind(&self) -> ApiProvider {
        ApiProvider::OpenRouter
    }

    fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, CHAT_ENDPOINT)
    }

    fn build_body(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
        stream: bool,
    ) -> serde_json::Value {
        let request = base_request(messages, model_id, stream, None);
        serde_json::to_value(&request).unwrap_or_default()
    }

    fn apply_auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(
            "authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        )
        .header("http-referer", &self.referer)
        .header("x-title", &self.title)
        .header("content-type", "application/json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OpenRouterAdapter {
        OpenRouterAdapter::new(SecretString::from("test-key"))
    }

    #[test]
    fn test_chat_url() {
        assert_eq!(
            adapter().chat_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_body_omits_max_tokens() {
        let messages = vec![ChatMessage::user("hi")];
        let body = adapter().build_body(&messages, "meta-llama/llama-3.3-70b-instruct:free", true);
        assert_eq!(body["model"], "meta-llama/llama-3.3-70b-instruct:free");
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let repr = format!("{:?}", adapter());
        assert!(!repr.contains("test-key"));
    }
}
