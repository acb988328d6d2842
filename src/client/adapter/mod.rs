//! Provider backends behind a single adapter contract.

mod byteplus;
mod openrouter;
mod traits;
mod wire;

pub use byteplus::ByteplusAdapter;
pub use openrouter::OpenRouterAdapter;
pub use traits::ProviderAdapter;
