//! Model pricing for preflight cost estimation and usage recording.
//!
//! Prices can be customized via environment variables or programmatically.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::types::ChatMessage;

/// Rough heuristic, good enough for preflight budget reservations.
const CHARS_PER_TOKEN: usize = 4;

/// Output allowance assumed when estimating a chat request up front.
const ESTIMATED_OUTPUT_TOKENS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl ModelPricing {
    pub const fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    pub const fn free() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn calculate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input = (input_tokens as f64 / 1_000_000.0) * self.input_per_mtok;
        let output = (output_tokens as f64 / 1_000_000.0) * self.output_per_mtok;
        input + output
    }
}

#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
    default: ModelPricing,
}

impl PricingTable {
    pub fn builder() -> PricingTableBuilder {
        PricingTableBuilder::new()
    }

    pub fn get(&self, short_key: &str) -> &ModelPricing {
        self.models.get(short_key).unwrap_or(&self.default)
    }

    /// Preflight estimate for a chat request: input from the conversation
    /// text plus a nominal output allowance.
    pub fn estimate_chat(&self, short_key: &str, messages: &[ChatMessage]) -> f64 {
        let input_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let input_tokens = (input_chars / CHARS_PER_TOKEN) as u64;
        self.get(short_key)
            .calculate(input_tokens, ESTIMATED_OUTPUT_TOKENS)
    }

    /// Cost of a finished completion, from conversation input and the
    /// response text actually streamed.
    pub fn completion_cost(&self, short_key: &str, input_chars: usize, output_chars: usize) -> f64 {
        self.get(short_key).calculate(
            (input_chars / CHARS_PER_TOKEN) as u64,
            (output_chars / CHARS_PER_TOKEN) as u64,
        )
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        global_pricing_table().clone()
    }
}

#[derive(Debug, Default)]
pub struct PricingTableBuilder {
    models: HashMap<String, ModelPricing>,
    default: Option<ModelPricing>,
}

impl PricingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self) -> Self {
        self.models
            .insert("seed-1-6".into(), ModelPricing::new(0.6, 2.4));
        self.models
            .insert("deepseek-r1".into(), ModelPricing::new(0.55, 2.19));
        self.models
            .insert("gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        self.models
            .insert("claude-sonnet".into(), ModelPricing::new(3.0, 15.0));
        self.models
            .insert("seedream".into(), ModelPricing::new(9.0, 9.0));
        self.models
            .insert("seedance".into(), ModelPricing::new(15.0, 15.0));
        for free in ["deepseek-v3", "doubao-lite", "llama-3.3-70b", "gemini-flash", "mistral-small"]
        {
            self.models.insert(free.into(), ModelPricing::free());
        }
        self
    }

    pub fn model(mut self, short_key: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(short_key.into(), pricing);
        self
    }

    pub fn default_pricing(mut self, pricing: ModelPricing) -> Self {
        self.default = Some(pricing);
        self
    }

    /// Apply `MODELGATE_PRICING_<KEY>_INPUT` / `_OUTPUT` overrides to every
    /// known model; `<KEY>` is the short key uppercased with `-` and `.`
    /// replaced by `_`.
    pub fn from_env(mut self) -> Self {
        self = self.with_defaults();
        let overrides: Vec<(String, ModelPricing)> = self
            .models
            .keys()
            .filter_map(|key| Self::parse_env_pricing(key).map(|p| (key.clone(), p)))
            .collect();
        for (key, pricing) in overrides {
            self.models.insert(key, pricing);
        }
        self
    }

    fn parse_env_pricing(short_key: &str) -> Option<ModelPricing> {
        let env_key: String = short_key
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        let input = std::env::var(format!("MODELGATE_PRICING_{env_key}_INPUT"))
            .ok()?
            .parse::<f64>()
            .ok()?;
        let output = std::env::var(format!("MODELGATE_PRICING_{env_key}_OUTPUT"))
            .ok()?
            .parse::<f64>()
            .ok()?;
        Some(ModelPricing::new(input, output))
    }

    pub fn build(self) -> PricingTable {
        PricingTable {
            models: self.models,
            // Unknown models are priced conservatively, not free.
            default: self.default.unwrap_or(ModelPricing::new(0.5, 1.5)),
        }
    }
}

static GLOBAL_PRICING: LazyLock<PricingTable> =
    LazyLock::new(|| PricingTableBuilder::new().from_env().build());

pub fn global_pricing_table() -> &'static PricingTable {
    &GLOBAL_PRICING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate() {
        let pricing = ModelPricing::new(2.5, 10.0);
        let cost = pricing.calculate(1_000_000, 500_000);
        assert!((cost - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_free_models_cost_nothing() {
        let table = PricingTableBuilder::new().with_defaults().build();
        let messages = vec![ChatMessage::user("x".repeat(4_000))];
        assert_eq!(table.estimate_chat("llama-3.3-70b", &messages), 0.0);
    }

    #[test]
    fn test_estimate_includes_output_allowance() {
        let table = PricingTableBuilder::new().with_defaults().build();
        // Empty input still reserves for the assumed output.
        let estimate = table.estimate_chat("gpt-4o", &[]);
        assert!((estimate - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_uses_default() {
        let table = PricingTableBuilder::new()
            .default_pricing(ModelPricing::new(1.0, 1.0))
            .build();
        let cost = table.completion_cost("mystery", 4_000_000, 4_000_000);
        assert!((cost - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_model_override() {
        let table = PricingTableBuilder::new()
            .with_defaults()
            .model("gpt-4o", ModelPricing::new(5.0, 20.0))
            .build();
        assert_eq!(table.get("gpt-4o").input_per_mtok, 5.0);
    }
}
