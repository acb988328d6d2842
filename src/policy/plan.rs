//! Per-tier entitlements and runtime overrides.

use dashmap::DashMap;

use crate::models::Tier;

/// What a subscription tier entitles a user to.
///
/// A `monthly_budget` of `0.0` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanLimits {
    pub monthly_budget: f64,
    pub can_generate_images: bool,
    pub can_generate_videos: bool,
    pub chat_history_days: u32,
    pub has_api_access: bool,
    pub has_priority_speed: bool,
}

impl PlanLimits {
    pub const fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                monthly_budget: 0.50,
                can_generate_images: false,
                can_generate_videos: false,
                chat_history_days: 7,
                has_api_access: false,
                has_priority_speed: false,
            },
            Tier::Starter => Self {
                monthly_budget: 5.0,
                can_generate_images: true,
                can_generate_videos: false,
                chat_history_days: 30,
                has_api_access: false,
                has_priority_speed: false,
            },
            Tier::Pro => Self {
                monthly_budget: 20.0,
                can_generate_images: true,
                can_generate_videos: true,
                chat_history_days: 90,
                has_api_access: true,
                has_priority_speed: true,
            },
            Tier::Premium => Self {
                monthly_budget: 0.0,
                can_generate_images: true,
                can_generate_videos: true,
                chat_history_days: 365,
                has_api_access: true,
                has_priority_speed: true,
            },
        }
    }

    pub const fn is_unlimited(&self) -> bool {
        self.monthly_budget == 0.0
    }
}

/// Operator adjustments layered over a tier's defaults without a redeploy.
#[derive(Debug, Clone, Default)]
pub struct PlanOverride {
    /// Replaces the tier's default budget when set; `0.0` grants unlimited.
    pub budget_override: Option<f64>,
    /// Models granted regardless of the tier requirement.
    pub allowed_models: Vec<String>,
    /// Models withheld even when the tier requirement is met.
    pub blocked_models: Vec<String>,
}

impl PlanOverride {
    pub fn allows(&self, short_key: &str) -> bool {
        self.allowed_models.iter().any(|m| m == short_key)
    }

    pub fn blocks(&self, short_key: &str) -> bool {
        self.blocked_models.iter().any(|m| m == short_key)
    }
}

/// Live override table, safe to mutate while requests are in flight.
#[derive(Debug, Default)]
pub struct PlanOverrides {
    by_tier: DashMap<Tier, PlanOverride>,
}

impl PlanOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tier: Tier, overrides: PlanOverride) {
        self.by_tier.insert(tier, overrides);
    }

    pub fn get(&self, tier: Tier) -> PlanOverride {
        self.by_tier
            .get(&tier)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self, tier: Tier) {
        self.by_tier.remove(&tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets_rise_with_tier() {
        let free = PlanLimits::for_tier(Tier::Free);
        let starter = PlanLimits::for_tier(Tier::Starter);
        let pro = PlanLimits::for_tier(Tier::Pro);
        assert!(free.monthly_budget < starter.monthly_budget);
        assert!(starter.monthly_budget < pro.monthly_budget);
        assert!(PlanLimits::for_tier(Tier::Premium).is_unlimited());
    }

    #[test]
    fn test_capabilities_per_tier() {
        assert!(!PlanLimits::for_tier(Tier::Free).can_generate_images);
        assert!(PlanLimits::for_tier(Tier::Starter).can_generate_images);
        assert!(!PlanLimits::for_tier(Tier::Starter).can_generate_videos);
        assert!(PlanLimits::for_tier(Tier::Pro).can_generate_videos);
    }

    #[test]
    fn test_override_table_roundtrip() {
        let overrides = PlanOverrides::new();
        assert!(!overrides.get(Tier::Free).allows("gpt-4o"));

        overrides.set(
            Tier::Free,
            PlanOverride {
                allowed_models: vec!["gpt-4o".into()],
                ..Default::default()
            },
        );
        assert!(overrides.get(Tier::Free).allows("gpt-4o"));

        overrides.clear(Tier::Free);
        assert!(!overrides.get(Tier::Free).allows("gpt-4o"));
    }
}
