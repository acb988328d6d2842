use serde::{Deserialize, Serialize};

/// Subscription tier. Totally ordered: a model tagged with a tier is
/// accessible to users at that tier or above.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Starter,
    Pro,
    Premium,
}

impl Tier {
    pub fn level(self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Starter => 1,
            Tier::Pro => 2,
            Tier::Premium => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Starter => "starter",
            Tier::Pro => "pro",
            Tier::Premium => "premium",
        }
    }

    pub fn all() -> [Tier; 4] {
        [Tier::Free, Tier::Starter, Tier::Pro, Tier::Premium]
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Free < Tier::Starter);
        assert!(Tier::Starter < Tier::Pro);
        assert!(Tier::Pro < Tier::Premium);
        assert_eq!(Tier::Premium.level(), 3);
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(serde_json::to_string(&Tier::Pro).unwrap(), "\"pro\"");
        let tier: Tier = serde_json::from_str("\"starter\"").unwrap();
        assert_eq!(tier, Tier::Starter);
    }
}
