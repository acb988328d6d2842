//! Tier-based access control: plan limits, user identity, the evaluator.

mod evaluator;
mod identity;
mod plan;

pub use evaluator::{AccessDecision, AccessPolicy, DenyReason};
pub use identity::{IdentityStore, MemoryIdentityStore, UserIdentity};
pub use plan::{PlanLimits, PlanOverride, PlanOverrides};
