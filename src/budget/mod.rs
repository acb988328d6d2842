//! Monthly spend enforcement: atomic counters, pricing, usage history.

mod ledger;
mod pricing;
#[cfg(feature = "redis-backend")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-backend")))]
mod redis_store;
mod usage;

pub use ledger::{
    BudgetLedger, CounterStore, MemoryCounterStore, Reservation, current_year_month,
};
pub use pricing::{ModelPricing, PricingTable, PricingTableBuilder, global_pricing_table};
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisCounterStore;
pub use usage::{JsonlUsageStore, MemoryUsageStore, UsageRecord, UsageStore};
