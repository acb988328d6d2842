use serde::{Deserialize, Serialize};

use super::tier::Tier;

/// What the model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Chat,
    Image,
    Video,
}

/// Which backend API serves the model. Selects the provider adapter at
/// request time; avoids runtime type inspection on the routing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiProvider {
    Byteplus,
    OpenRouter,
}

impl ApiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiProvider::Byteplus => "byteplus",
            ApiProvider::OpenRouter => "openrouter",
        }
    }
}

impl std::fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one routable model. Loaded once at startup and
/// read-only thereafter; admin edits go through [`super::RegistryHandle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Provider-qualified identifier sent on the wire.
    pub id: String,
    /// Stable short key used by callers and plan overrides.
    pub short_key: String,
    pub display_name: String,
    /// Vendor name shown to users, e.g. "Meta" or "DeepSeek".
    pub provider: String,
    pub model_type: ModelType,
    pub api_provider: ApiProvider,
    pub is_free: bool,
    /// Minimum subscription tier required to use the model.
    pub tier: Tier,
    pub max_context_tokens: u64,
    /// Administratively disabled models stay in the registry but deny access.
    pub active: bool,
}

impl ModelDescriptor {
    /// True for models eligible as fallback candidates during routing.
    pub fn is_fallback_candidate(&self) -> bool {
        self.is_free && self.active && self.model_type == ModelType::Chat
    }
}
