//! The access decision itself.
//!
//! Checks run cheapest-first and short-circuit on the first denial, so a
//! blocked request never touches the budget counter.

use std::sync::Arc;

use crate::budget::BudgetLedger;
use crate::models::{ModelDescriptor, RegistryHandle, Tier};
use crate::types::Action;
use crate::Result;

use super::identity::IdentityStore;
use super::plan::{PlanLimits, PlanOverrides};

/// Why a request was denied, phrased so the message can go straight to the
/// user.
#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    UnknownModel { model: String },
    ModelDisabled { model: String },
    TierTooLow { required: Tier, current: Tier },
    ModelBlocked { model: String },
    CapabilityDisabled { action: Action, tier: Tier },
    BudgetExhausted { used: f64, limit: f64 },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::UnknownModel { model } => {
                write!(f, "Model '{model}' is not recognized")
            }
            DenyReason::ModelDisabled { model } => {
                write!(f, "Model '{model}' is temporarily unavailable")
            }
            DenyReason::TierTooLow { required, current } => write!(
                f,
                "This model requires the {required} plan or higher (current plan: {current})"
            ),
            DenyReason::ModelBlocked { model } => {
                write!(f, "Model '{model}' is not available on your plan")
            }
            DenyReason::CapabilityDisabled { action, tier } => {
                let what = match action {
                    Action::Image => "Image generation",
                    Action::Video => "Video generation",
                    _ => "This feature",
                };
                write!(f, "{what} is not included in the {tier} plan")
            }
            DenyReason::BudgetExhausted { used, limit } => write!(
                f,
                "Monthly usage limit reached (${used:.2} of ${limit:.2}); resets next month"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    /// Effective plan tier the decision was made under.
    pub plan: Tier,
}

impl AccessDecision {
    fn allow(plan: Tier) -> Self {
        Self {
            allowed: true,
            reason: None,
            plan,
        }
    }

    fn deny(plan: Tier, reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            plan,
        }
    }
}

/// Evaluates whether a user may perform an action, combining identity,
/// model catalog, plan overrides and the budget ledger.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    identity: Arc<dyn IdentityStore>,
    registry: Arc<RegistryHandle>,
    overrides: Arc<PlanOverrides>,
    ledger: BudgetLedger,
}

impl AccessPolicy {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        registry: Arc<RegistryHandle>,
        overrides: Arc<PlanOverrides>,
        ledger: BudgetLedger,
    ) -> Self {
        Self {
            identity,
            registry,
            overrides,
            ledger,
        }
    }

    /// Decide whether `user_id` may perform `action`, optionally against a
    /// specific model, reserving `estimated_cost` against the monthly budget
    /// when the decision is an allow.
    ///
    /// Errors only on infrastructure failures (unknown user, identity store
    /// down); a policy "no" is an `Ok` decision with a [`DenyReason`].
    pub async fn check_access(
        &self,
        user_id: &str,
        action: Action,
        model_key: Option<&str>,
        estimated_cost: f64,
    ) -> Result<AccessDecision> {
        let identity = self.identity.resolve(user_id).await?;
        let tier = identity.tier;

        if identity.is_admin {
            // Admins act with full entitlements regardless of stored tier.
            return Ok(AccessDecision::allow(Tier::Premium));
        }

        let overrides = self.overrides.get(tier);
        let mut model_allow_listed = false;

        if let Some(key) = model_key {
            let registry = self.registry.current();
            let Some(model) = registry.resolve(key) else {
                return Ok(AccessDecision::deny(
                    tier,
                    DenyReason::UnknownModel {
                        model: key.to_string(),
                    },
                ));
            };
            if overrides.blocks(&model.short_key) {
                return Ok(AccessDecision::deny(
                    tier,
                    DenyReason::ModelBlocked {
                        model: model.short_key.clone(),
                    },
                ));
            }
            model_allow_listed = overrides.allows(&model.short_key);
            if !model_allow_listed {
                if let Some(reason) = Self::check_model(model, tier) {
                    return Ok(AccessDecision::deny(tier, reason));
                }
            }
        }

        // The allow list grants model access only; the action capability
        // gate still applies.
        let limits = PlanLimits::for_tier(tier);
        let capability_ok = match action {
            Action::Image => limits.can_generate_images,
            Action::Video => limits.can_generate_videos,
            Action::Chat | Action::Search => true,
        };
        if !capability_ok {
            return Ok(AccessDecision::deny(
                tier,
                DenyReason::CapabilityDisabled { action, tier },
            ));
        }

        if !action.has_cost() {
            return Ok(AccessDecision::allow(tier));
        }

        let limit = overrides.budget_override.unwrap_or(limits.monthly_budget);
        // 0.0 is the unlimited sentinel.
        if limit == 0.0 {
            return Ok(AccessDecision::allow(tier));
        }

        let reservation = self.ledger.reserve(user_id, estimated_cost, limit).await;
        if reservation.allowed {
            Ok(AccessDecision::allow(tier))
        } else {
            Ok(AccessDecision::deny(
                tier,
                DenyReason::BudgetExhausted {
                    used: reservation.new_total,
                    limit,
                },
            ))
        }
    }

    fn check_model(model: &ModelDescriptor, tier: Tier) -> Option<DenyReason> {
        if !model.active {
            return Some(DenyReason::ModelDisabled {
                model: model.short_key.clone(),
            });
        }
        if tier < model.tier {
            return Some(DenyReason::TierTooLow {
                required: model.tier,
                current: tier,
            });
        }
        None
    }

    /// Drop a cached identity after a subscription change.
    pub fn invalidate_user(&self, user_id: &str) {
        self.identity.invalidate(user_id);
    }

    /// Undo a budget reservation for a request that never reached a provider.
    pub async fn release_reservation(&self, user_id: &str, amount: f64) -> Result<()> {
        self.ledger.release(user_id, amount).await
    }

    pub fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }
}
