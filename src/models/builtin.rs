//! Built-in model catalog.
//!
//! Registry order matters: free models are tried as fallbacks in the order
//! they appear here.

use super::descriptor::{ApiProvider, ModelDescriptor, ModelType};
use super::registry::ModelRegistry;
use super::tier::Tier;

struct Entry {
    id: &'static str,
    short_key: &'static str,
    display_name: &'static str,
    provider: &'static str,
    model_type: ModelType,
    api_provider: ApiProvider,
    is_free: bool,
    tier: Tier,
    max_context_tokens: u64,
}

const CATALOG: &[Entry] = &[
    // BytePlus ARK
    Entry {
        id: "seed-1-6-250915",
        short_key: "seed-1-6",
        display_name: "Seed 1.6",
        provider: "ByteDance",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::Byteplus,
        is_free: false,
        tier: Tier::Pro,
        max_context_tokens: 256_000,
    },
    Entry {
        id: "deepseek-v3-250324",
        short_key: "deepseek-v3",
        display_name: "DeepSeek V3",
        provider: "DeepSeek",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::Byteplus,
        is_free: true,
        tier: Tier::Free,
        max_context_tokens: 128_000,
    },
    Entry {
        id: "deepseek-r1-250528",
        short_key: "deepseek-r1",
        display_name: "DeepSeek R1",
        provider: "DeepSeek",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::Byteplus,
        is_free: false,
        tier: Tier::Starter,
        max_context_tokens: 96_000,
    },
    Entry {
        id: "doubao-lite-32k-240828",
        short_key: "doubao-lite",
        display_name: "Doubao Lite 32K",
        provider: "ByteDance",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::Byteplus,
        is_free: true,
        tier: Tier::Free,
        max_context_tokens: 32_000,
    },
    Entry {
        id: "seedream-3-0-t2i-250415",
        short_key: "seedream",
        display_name: "Seedream 3.0",
        provider: "ByteDance",
        model_type: ModelType::Image,
        api_provider: ApiProvider::Byteplus,
        is_free: false,
        tier: Tier::Starter,
        max_context_tokens: 4_096,
    },
    Entry {
        id: "seedance-1-0-lite-t2v-250428",
        short_key: "seedance",
        display_name: "Seedance 1.0 Lite",
        provider: "ByteDance",
        model_type: ModelType::Video,
        api_provider: ApiProvider::Byteplus,
        is_free: false,
        tier: Tier::Pro,
        max_context_tokens: 4_096,
    },
    // OpenRouter
    Entry {
        id: "openai/gpt-4o",
        short_key: "gpt-4o",
        display_name: "GPT-4o",
        provider: "OpenAI",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::OpenRouter,
        is_free: false,
        tier: Tier::Pro,
        max_context_tokens: 128_000,
    },
    Entry {
        id: "anthropic/claude-sonnet-4",
        short_key: "claude-sonnet",
        display_name: "Claude Sonnet 4",
        provider: "Anthropic",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::OpenRouter,
        is_free: false,
        tier: Tier::Premium,
        max_context_tokens: 200_000,
    },
    Entry {
        id: "meta-llama/llama-3.3-70b-instruct:free",
        short_key: "llama-3.3-70b",
        display_name: "Llama 3.3 70B",
        provider: "Meta",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::OpenRouter,
        is_free: true,
        tier: Tier::Free,
        max_context_tokens: 131_072,
    },
    Entry {
        id: "google/gemini-2.0-flash-exp:free",
        short_key: "gemini-flash",
        display_name: "Gemini 2.0 Flash",
        provider: "Google",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::OpenRouter,
        is_free: true,
        tier: Tier::Free,
        max_context_tokens: 1_048_576,
    },
    Entry {
        id: "mistralai/mistral-small-3.1-24b-instruct:free",
        short_key: "mistral-small",
        display_name: "Mistral Small 3.1",
        provider: "Mistral AI",
        model_type: ModelType::Chat,
        api_provider: ApiProvider::OpenRouter,
        is_free: true,
        tier: Tier::Free,
        max_context_tokens: 96_000,
    },
];

pub(super) fn register_all(registry: &mut ModelRegistry) {
    for entry in CATALOG {
        registry.register(ModelDescriptor {
            id: entry.id.to_string(),
            short_key: entry.short_key.to_string(),
            display_name: entry.display_name.to_string(),
            provider: entry.provider.to_string(),
            model_type: entry.model_type,
            api_provider: entry.api_provider,
            is_free: entry.is_free,
            tier: entry.tier,
            max_context_tokens: entry.max_context_tokens,
            active: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_free_fallbacks_per_backend() {
        let registry = ModelRegistry::builtins();
        for provider in [ApiProvider::Byteplus, ApiProvider::OpenRouter] {
            let free_chat = registry
                .for_provider(provider)
                .into_iter()
                .filter(|m| m.is_fallback_candidate())
                .count();
            assert!(free_chat >= 2, "{provider} needs free fallback models");
        }
    }

    #[test]
    fn test_catalog_keys_unique() {
        let registry = ModelRegistry::builtins();
        let mut keys: Vec<_> = registry.all().map(|m| m.short_key.as_str()).collect();
        keys.sort_unstable();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
    }
}
