//! The orchestrator: policy check, routing, usage settlement.
//!
//! Order per request: resolve the model, estimate cost, ask the policy
//! (which reserves budget atomically), then route. After the stream
//! resolves, the reservation is settled against the actual cost and a usage
//! record is appended off the hot path.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::budget::{BudgetLedger, PricingTable, UsageRecord, UsageStore};
use crate::client::ModelRouter;
use crate::policy::AccessPolicy;
use crate::types::{Action, ChatCompletion, ChatMessage, StreamHandler};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Gateway {
    policy: AccessPolicy,
    router: ModelRouter,
    usage: Arc<dyn UsageStore>,
    pricing: Arc<PricingTable>,
}

impl Gateway {
    pub fn new(
        policy: AccessPolicy,
        router: ModelRouter,
        usage: Arc<dyn UsageStore>,
        pricing: Arc<PricingTable>,
    ) -> Self {
        Self {
            policy,
            router,
            usage,
            pricing,
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    fn short_key(&self, model_key: &str) -> String {
        self.router
            .registry()
            .current()
            .resolve(model_key)
            .map(|m| m.short_key.clone())
            .unwrap_or_else(|| model_key.to_string())
    }

    /// Stream a chat response for `user_id`.
    ///
    /// Returns `Err` only when the request never reaches a provider: an
    /// unknown user, or a policy denial (`Error::AccessDenied`). Once
    /// streaming starts, every outcome is delivered through the handler.
    pub async fn stream_chat(
        &self,
        user_id: &str,
        messages: &[ChatMessage],
        model_key: &str,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let short_key = self.short_key(model_key);
        let estimate = self.pricing.estimate_chat(&short_key, messages);

        let decision = self
            .policy
            .check_access(user_id, Action::Chat, Some(model_key), estimate)
            .await?;
        if let Some(reason) = decision.reason {
            return Err(Error::AccessDenied(reason));
        }

        let input_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let mut recorder = SettlingHandler {
            inner: handler,
            settlement: Some(Settlement {
                user_id: user_id.to_string(),
                short_key,
                input_chars,
                estimate,
                pricing: Arc::clone(&self.pricing),
                usage: Arc::clone(&self.usage),
                ledger: self.policy.ledger().clone(),
            }),
        };

        self.router
            .stream_chat(messages, model_key, &mut recorder, cancel)
            .await;
        Ok(())
    }

    /// Non-streaming counterpart of [`Gateway::stream_chat`].
    pub async fn chat_completion(
        &self,
        user_id: &str,
        messages: &[ChatMessage],
        model_key: &str,
    ) -> Result<ChatCompletion> {
        let short_key = self.short_key(model_key);
        let estimate = self.pricing.estimate_chat(&short_key, messages);

        let decision = self
            .policy
            .check_access(user_id, Action::Chat, Some(model_key), estimate)
            .await?;
        if let Some(reason) = decision.reason {
            return Err(Error::AccessDenied(reason));
        }

        let input_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let settlement = Settlement {
            user_id: user_id.to_string(),
            short_key,
            input_chars,
            estimate,
            pricing: Arc::clone(&self.pricing),
            usage: Arc::clone(&self.usage),
            ledger: self.policy.ledger().clone(),
        };

        match self.router.chat_completion(messages, model_key).await {
            Ok(completion) => {
                settlement.settle(completion.content.len());
                Ok(completion)
            }
            Err(err) => {
                settlement.void();
                Err(err)
            }
        }
    }
}

/// Everything needed to reconcile a reservation after the response resolves.
struct Settlement {
    user_id: String,
    short_key: String,
    input_chars: usize,
    estimate: f64,
    pricing: Arc<PricingTable>,
    usage: Arc<dyn UsageStore>,
    ledger: BudgetLedger,
}

impl Settlement {
    /// Replace the preflight estimate with the actual cost and append the
    /// usage record. Best-effort: failures are logged, never surfaced.
    fn settle(self, output_chars: usize) {
        let actual = self
            .pricing
            .completion_cost(&self.short_key, self.input_chars, output_chars);
        tokio::spawn(async move {
            let delta = self.estimate - actual;
            if delta.abs() > f64::EPSILON
                && let Err(err) = self.ledger.release(&self.user_id, delta).await
            {
                tracing::warn!(error = %err, user_id = %self.user_id, "budget settlement failed");
            }
            let record = UsageRecord::new(&self.user_id, Action::Chat, &self.short_key, actual);
            if let Err(err) = self.usage.append(record).await {
                tracing::warn!(error = %err, user_id = %self.user_id, "usage record write failed");
            }
        });
    }

    /// Return the whole reservation; the request produced nothing billable.
    fn void(self) {
        if self.estimate == 0.0 {
            return;
        }
        tokio::spawn(async move {
            if let Err(err) = self.ledger.release(&self.user_id, self.estimate).await {
                tracing::warn!(error = %err, user_id = %self.user_id, "reservation release failed");
            }
        });
    }
}

/// Forwards every callback and settles the budget reservation on the
/// terminal one.
struct SettlingHandler<'a> {
    inner: &'a mut dyn StreamHandler,
    settlement: Option<Settlement>,
}

impl StreamHandler for SettlingHandler<'_> {
    fn on_chunk(&mut self, text: &str) {
        self.inner.on_chunk(text);
    }

    fn on_done(&mut self, full_text: &str, message_id: Option<&str>) {
        if let Some(settlement) = self.settlement.take() {
            settlement.settle(full_text.len());
        }
        self.inner.on_done(full_text, message_id);
    }

    fn on_error(&mut self, message: &str) {
        if let Some(settlement) = self.settlement.take() {
            settlement.void();
        }
        self.inner.on_error(message);
    }

    fn on_title_update(&mut self, title: &str) {
        self.inner.on_title_update(title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{MemoryCounterStore, MemoryUsageStore, PricingTableBuilder};
    use crate::models::{RegistryHandle, Tier};
    use crate::policy::{MemoryIdentityStore, PlanOverrides, UserIdentity};

    fn gateway_with_user(tier: Tier) -> (Gateway, Arc<MemoryUsageStore>) {
        let identity = MemoryIdentityStore::new();
        identity.insert("u1", UserIdentity::new(tier));
        let usage = Arc::new(MemoryUsageStore::new());
        let registry = Arc::new(RegistryHandle::builtin());
        let ledger = BudgetLedger::new(
            Arc::new(MemoryCounterStore::new()),
            Arc::clone(&usage) as Arc<dyn UsageStore>,
        );
        let policy = AccessPolicy::new(
            Arc::new(identity),
            Arc::clone(&registry),
            Arc::new(PlanOverrides::new()),
            ledger,
        );
        let router = ModelRouter::new(reqwest::Client::new(), registry);
        let pricing = Arc::new(PricingTableBuilder::new().with_defaults().build());
        (
            Gateway::new(policy, router, Arc::clone(&usage) as Arc<dyn UsageStore>, pricing),
            usage,
        )
    }

    struct NullHandler;
    impl StreamHandler for NullHandler {
        fn on_chunk(&mut self, _text: &str) {}
        fn on_done(&mut self, _full_text: &str, _message_id: Option<&str>) {}
        fn on_error(&mut self, _message: &str) {}
    }

    #[tokio::test]
    async fn test_denied_before_any_routing() {
        let (gateway, _usage) = gateway_with_user(Tier::Free);
        let err = gateway
            .stream_chat(
                "u1",
                &[ChatMessage::user("hi")],
                "gpt-4o",
                &mut NullHandler,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_unknown_user_is_error() {
        let (gateway, _usage) = gateway_with_user(Tier::Pro);
        let err = gateway
            .chat_completion("nobody", &[ChatMessage::user("hi")], "llama-3.3-70b")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownUser(_)));
    }

    #[tokio::test]
    async fn test_stream_chat_passes_policy_for_free_model() {
        // No adapter configured, so routing exhausts, but the policy gate
        // itself must pass for a free model on the Free tier.
        let (gateway, _usage) = gateway_with_user(Tier::Free);
        let result = gateway
            .stream_chat(
                "u1",
                &[ChatMessage::user("hi")],
                "llama-3.3-70b",
                &mut NullHandler,
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_ok());
    }
}
