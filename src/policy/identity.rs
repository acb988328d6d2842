//! User identity resolution.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::Tier;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserIdentity {
    pub tier: Tier,
    pub is_admin: bool,
}

impl UserIdentity {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            is_admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            tier: Tier::Premium,
            is_admin: true,
        }
    }
}

/// Resolves a user id to its subscription state.
///
/// Backed by whatever holds account data; implementations may cache, and
/// `invalidate` is the hook to drop a stale entry after a plan change.
#[async_trait]
pub trait IdentityStore: Send + Sync + std::fmt::Debug {
    async fn resolve(&self, user_id: &str) -> Result<UserIdentity>;

    fn invalidate(&self, _user_id: &str) {}
}

/// In-memory identity table for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: DashMap<String, UserIdentity>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, identity: UserIdentity) {
        self.users.insert(user_id.into(), identity);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn resolve(&self, user_id: &str) -> Result<UserIdentity> {
        self.users
            .get(user_id)
            .map(|entry| *entry)
            .ok_or_else(|| Error::UnknownUser(user_id.to_string()))
    }

    fn invalidate(&self, user_id: &str) {
        self.users.remove(user_id);
    }
}
