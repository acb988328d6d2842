//! Append-only usage history.
//!
//! Written asynchronously off the request hot path; never read synchronously
//! while serving a request except as the ledger's degraded-mode comparison
//! source. Write failures are logged, not surfaced to the user.

use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::types::Action;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: String,
    pub action: Action,
    pub model_key: String,
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        user_id: impl Into<String>,
        action: Action,
        model_key: impl Into<String>,
        cost: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            action,
            model_key: model_key.into(),
            cost,
            timestamp: Utc::now(),
        }
    }

    fn year_month(&self) -> String {
        self.timestamp.format("%Y%m").to_string()
    }
}

/// Historical usage store collaborator.
#[async_trait]
pub trait UsageStore: Send + Sync + std::fmt::Debug {
    async fn append(&self, record: UsageRecord) -> Result<()>;

    /// Sum of recorded cost for one user in one `YYYYMM` month.
    async fn monthly_spend(&self, user_id: &str, year_month: &str) -> Result<f64>;
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    records: RwLock<Vec<UsageRecord>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        match self.records.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn append(&self, record: UsageRecord) -> Result<()> {
        match self.records.write() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }

    async fn monthly_spend(&self, user_id: &str, year_month: &str) -> Result<f64> {
        let records = self.records();
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.year_month() == year_month)
            .map(|r| r.cost)
            .sum())
    }
}

/// One JSON record per line, appended to a single file.
#[derive(Debug)]
pub struct JsonlUsageStore {
    path: PathBuf,
    // Serializes appends so concurrent records do not interleave lines.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlUsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl UsageStore for JsonlUsageStore {
    async fn append(&self, record: UsageRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn monthly_spend(&self, user_id: &str, year_month: &str) -> Result<f64> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0.0),
            Err(err) => return Err(err.into()),
        };

        let mut total = 0.0;
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            // A torn final line from a crashed writer is skipped, not fatal.
            let Ok(record) = serde_json::from_str::<UsageRecord>(line) else {
                tracing::warn!("skipping unparseable usage record line");
                continue;
            };
            if record.user_id == user_id && record.year_month() == year_month {
                total += record.cost;
            }
        }
        Ok(total)
    }
}
