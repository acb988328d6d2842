//! Static model registry: descriptors, tiers, and the reloadable handle.

mod builtin;
mod descriptor;
mod registry;
mod tier;

pub use descriptor::{ApiProvider, ModelDescriptor, ModelType};
pub use registry::{ModelRegistry, RegistryHandle};
pub use tier::Tier;
