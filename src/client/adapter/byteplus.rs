//! BytePlus ARK adapter.

use secrecy::{ExposeSecret, SecretString};

use super::traits::{ProviderAdapter, base_request};
use crate::models::ApiProvider;
use crate::types::ChatMessage;

const BASE_URL: &str = "https://ark.ap-southeast.bytepluses.com";
const CHAT_ENDPOINT: &str = "/api/v3/chat/completions";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug)]
pub struct ByteplusAdapter {
    api_key: SecretString,
    base_url: String,
    max_tokens: u32,
    disable_thinking: bool,
}

impl ByteplusAdapter {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            disable_thinking: true,
        }
    }

    /// Override the endpoint, e.g. for a regional deployment or tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Let reasoning models emit their thinking block instead of
    /// suppressing it (suppressed by default: end users see chat deltas
    /// only).
    pub fn with_thinking(mut self) -> Self {
        self.disable_thinking = false;
        self
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ByteplusAdapter {
    fn name(&self) -> &'static str {
        "byteplus"
    }

    fn kind(&self) -> ApiProvider {
        ApiProvider::Byteplus
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
        let request = base_request(messages, model_id, stream, Some(self.max_tokens));
        let mut body = serde_json::to_value(&request).unwrap_or_default();
        if self.disable_thinking && let Some(map) = body.as_object_mut() {
            map.insert(
                "thinking".to_string(),
                serde_json::json!({ "type": "disabled" }),
            );
        }
        body
    }

    fn apply_auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(
            "authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        )
        .header("content-type", "application/json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ByteplusAdapter {
        ByteplusAdapter::new(SecretString::from("test-key"))
    }

    #[test]
    fn test_chat_url() {
        assert_eq!(
            adapter().chat_url(),
            "https://ark.ap-southeast.bytepluses.com/api/v3/chat/completions"
        );
        let custom = adapter().with_base_url("http://localhost:9000");
        assert_eq!(custom.chat_url(), "http://localhost:9000/api/v3/chat/completions");
    }

    #[test]
    fn test_body_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let body = adapter().build_body(&messages, "deepseek-v3-250324", true);
        assert_eq!(body["model"], "deepseek-v3-250324");
        assert_eq!(body["stream"], true);
        assert_eq!(body["thinking"]["type"], "disabled");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_thinking_enabled_omits_toggle() {
        let messages = vec![ChatMessage::user("hi")];
        let body = adapter()
            .with_thinking()
            .build_body(&messages, "deepseek-r1-250528", false);
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let repr = format!("{:?}", adapter());
        assert!(!repr.contains("test-key"));
    }
}
