//! Environment-driven configuration and wiring.
//!
//! `GatewayConfig` reads everything from the process environment, and the
//! `build_*` methods assemble the HTTP client, router and gateway from it.
//! Every knob also has a programmatic setter for embedding and tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::budget::{
    BudgetLedger, JsonlUsageStore, MemoryCounterStore, MemoryUsageStore, PricingTable, UsageStore,
};
use crate::client::adapter::{ByteplusAdapter, OpenRouterAdapter};
use crate::client::ModelRouter;
use crate::gateway::Gateway;
use crate::models::RegistryHandle;
use crate::policy::{AccessPolicy, IdentityStore, MemoryIdentityStore, PlanOverrides};
use crate::{Error, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Default)]
pub struct GatewayConfig {
    byteplus_api_key: Option<SecretString>,
    openrouter_api_key: Option<SecretString>,
    byteplus_base_url: Option<String>,
    openrouter_base_url: Option<String>,
    connect_timeout: Option<Duration>,
    usage_log_path: Option<PathBuf>,
    #[cfg(feature = "redis-backend")]
    redis_url: Option<String>,
    identity: Option<Arc<dyn IdentityStore>>,
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the environment:
    ///
    /// - `BYTEPLUS_API_KEY`, `OPENROUTER_API_KEY`
    /// - `MODELGATE_BYTEPLUS_BASE_URL`, `MODELGATE_OPENROUTER_BASE_URL`
    /// - `MODELGATE_CONNECT_TIMEOUT_SECS`
    /// - `MODELGATE_USAGE_LOG` (JSONL file path; in-memory when unset)
    /// - `MODELGATE_REDIS_URL` (with the `redis-backend` feature)
    pub fn from_env() -> Self {
        Self {
            byteplus_api_key: env_secret("BYTEPLUS_API_KEY"),
            openrouter_api_key: env_secret("OPENROUTER_API_KEY"),
            byteplus_base_url: env_string("MODELGATE_BYTEPLUS_BASE_URL"),
            openrouter_base_url: env_string("MODELGATE_OPENROUTER_BASE_URL"),
            connect_timeout: env_string("MODELGATE_CONNECT_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs),
            usage_log_path: env_string("MODELGATE_USAGE_LOG").map(PathBuf::from),
            #[cfg(feature = "redis-backend")]
            redis_url: env_string("MODELGATE_REDIS_URL"),
            identity: None,
        }
    }

    pub fn byteplus_api_key(mut self, key: SecretString) -> Self {
        self.byteplus_api_key = Some(key);
        self
    }

    pub fn openrouter_api_key(mut self, key: SecretString) -> Self {
        self.openrouter_api_key = Some(key);
        self
    }

    pub fn byteplus_base_url(mut self, url: impl Into<String>) -> Self {
        self.byteplus_base_url = Some(url.into());
        self
    }

    pub fn openrouter_base_url(mut self, url: impl Into<String>) -> Self {
        self.openrouter_base_url = Some(url.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn usage_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.usage_log_path = Some(path.into());
        self
    }

    /// Identity backend; defaults to an empty in-memory store.
    pub fn identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.identity = Some(store);
        self
    }

    /// HTTP client tuned for long-lived streaming responses: a connect
    /// timeout but no overall request timeout, which would sever a healthy
    /// stream mid-response.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .http2_keep_alive_interval(Duration::from_secs(30))
            .build()
            .map_err(Error::Network)
    }

    /// Router over the built-in catalog with one adapter per configured key.
    pub fn build_router(&self) -> Result<ModelRouter> {
        self.build_router_with(Arc::new(RegistryHandle::builtin()))
    }

    fn build_router_with(&self, registry: Arc<RegistryHandle>) -> Result<ModelRouter> {
        if self.byteplus_api_key.is_none() && self.openrouter_api_key.is_none() {
            return Err(Error::Config(
                "no provider API key configured; set BYTEPLUS_API_KEY or OPENROUTER_API_KEY"
                    .to_string(),
            ));
        }

        let mut router = ModelRouter::new(self.http_client()?, registry);
        if let Some(key) = &self.byteplus_api_key {
            let mut adapter = ByteplusAdapter::new(key.clone());
            if let Some(url) = &self.byteplus_base_url {
                adapter = adapter.with_base_url(url);
            }
            router = router.with_adapter(Arc::new(adapter));
        }
        if let Some(key) = &self.openrouter_api_key {
            let mut adapter = OpenRouterAdapter::new(key.clone());
            if let Some(url) = &self.openrouter_base_url {
                adapter = adapter.with_base_url(url);
            }
            router = router.with_adapter(Arc::new(adapter));
        }
        Ok(router)
    }

    fn build_usage_store(&self) -> Arc<dyn UsageStore> {
        match &self.usage_log_path {
            Some(path) => Arc::new(JsonlUsageStore::new(path)),
            None => Arc::new(MemoryUsageStore::new()),
        }
    }

    fn build_ledger(&self, usage: Arc<dyn UsageStore>) -> Result<BudgetLedger> {
        #[cfg(feature = "redis-backend")]
        if let Some(url) = &self.redis_url {
            let store = crate::budget::RedisCounterStore::new(url)?;
            return Ok(BudgetLedger::new(Arc::new(store), usage));
        }
        Ok(BudgetLedger::new(Arc::new(MemoryCounterStore::new()), usage))
    }

    /// Assemble the full gateway: router, policy, ledger, usage history.
    /// Router and policy share one registry handle, so an admin reload is
    /// seen by both.
    pub fn build_gateway(self) -> Result<Gateway> {
        let registry = Arc::new(RegistryHandle::builtin());
        let router = self.build_router_with(Arc::clone(&registry))?;
        let usage = self.build_usage_store();
        let ledger = self.build_ledger(Arc::clone(&usage))?;
        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(MemoryIdentityStore::new()));
        let policy = AccessPolicy::new(identity, registry, Arc::new(PlanOverrides::new()), ledger);
        Ok(Gateway::new(
            policy,
            router,
            usage,
            Arc::new(PricingTable::default()),
        ))
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_secret(name: &str) -> Option<SecretString> {
    env_string(name).map(SecretString::from)
}
