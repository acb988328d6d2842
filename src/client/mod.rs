//! Streaming client stack: SSE decoding, provider adapters, model routing.

pub mod adapter;
mod decoder;
mod router;

pub use adapter::ProviderAdapter;
pub use decoder::{SseDecoder, Utf8StreamDecoder};
pub use router::ModelRouter;
