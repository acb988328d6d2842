//! # modelgate
//!
//! Core engine of a multi-tenant AI chat gateway: model routing with
//! transparent fallback, SSE stream decoding, and tiered budget enforcement.
//!
//! The crate is organized around three tightly coupled pieces:
//!
//! - [`client`] — the SSE event decoder, the per-backend provider adapters,
//!   and the [`ModelRouter`] that retries across equivalent free models.
//! - [`budget`] — the atomic monthly spend ledger with rollback-on-overflow,
//!   plus pricing and the append-only usage history.
//! - [`policy`] — the tier/plan evaluator that gates every request before any
//!   network call is made.
//!
//! [`gateway::Gateway`] wires the three together behind a single streaming
//! callback interface.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modelgate::{ChatMessage, Gateway, GatewayConfig, StreamHandler};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Printer;
//!
//! impl StreamHandler for Printer {
//!     fn on_chunk(&mut self, text: &str) {
//!         print!("{}", text);
//!     }
//!     fn on_done(&mut self, _full: &str, _message_id: Option<&str>) {
//!         println!();
//!     }
//!     fn on_error(&mut self, message: &str) {
//!         eprintln!("{}", message);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), modelgate::Error> {
//!     let gateway = GatewayConfig::from_env().build_gateway()?;
//!     let messages = vec![ChatMessage::user("Hello!")];
//!     let cancel = CancellationToken::new();
//!     gateway
//!         .stream_chat("user-1", &messages, "llama-3.3-70b", &mut Printer, &cancel)
//!         .await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod budget;
pub mod client;
pub mod config;
pub mod gateway;
pub mod models;
pub mod policy;
pub mod types;

pub use budget::{
    BudgetLedger, CounterStore, JsonlUsageStore, MemoryCounterStore, MemoryUsageStore,
    ModelPricing, PricingTable, PricingTableBuilder, Reservation, UsageRecord, UsageStore,
    current_year_month,
};
#[cfg(feature = "redis-backend")]
pub use budget::RedisCounterStore;
pub use client::{ModelRouter, ProviderAdapter, SseDecoder, Utf8StreamDecoder};
pub use client::adapter::{ByteplusAdapter, OpenRouterAdapter};
pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use models::{
    ApiProvider, ModelDescriptor, ModelRegistry, ModelType, RegistryHandle, Tier,
};
pub use policy::{
    AccessDecision, AccessPolicy, DenyReason, IdentityStore, MemoryIdentityStore, PlanLimits,
    PlanOverride, PlanOverrides, UserIdentity,
};
pub use types::{Action, ChatCompletion, ChatMessage, Role, StreamEvent, StreamHandler};

/// Error type for gateway operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Provider returned an error response.
    #[error("API error (HTTP {}): {message}", .status.map_or_else(|| "unknown".to_string(), |s| s.to_string()))]
    Api {
        message: String,
        status: Option<u16>,
        error_type: Option<String>,
    },

    /// Network connectivity or request failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Budget counter backend failed.
    #[error("Budget counter error: {0}")]
    Ledger(String),

    /// Identity store has no record for the user.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Request rejected by the access policy before any provider call.
    #[error("Access denied: {0}")]
    AccessDenied(policy::DenyReason),

    /// Every routing candidate was exhausted. The only streaming failure
    /// surfaced to end callers; raw provider errors stay in the logs.
    #[error("No model is currently available to handle this request, please try again later")]
    NoModelAvailable,

    /// Request parameters are invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Ledger(_) => true,
            Error::Api {
                status: Some(429 | 500..=599),
                ..
            } => true,
            _ => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            message: "Invalid API key".to_string(),
            status: Some(401),
            error_type: None,
        };
        assert!(err.to_string().contains("Invalid API key"));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_error_is_retryable() {
        let server_error = Error::Api {
            message: "Internal error".to_string(),
            status: Some(500),
            error_type: None,
        };
        assert!(server_error.is_retryable());

        let auth_error = Error::Api {
            message: "Invalid key".to_string(),
            status: Some(401),
            error_type: None,
        };
        assert!(!auth_error.is_retryable());
        assert_eq!(auth_error.status_code(), Some(401));
    }

    #[test]
    fn test_exhaustion_message_is_generic() {
        let msg = Error::NoModelAvailable.to_string();
        assert!(!msg.contains("http"));
        assert!(msg.contains("No model is currently available"));
    }
}
