//! # Durable State
//!
//! The trait contract for everything the leader may write and anyone may
//! read: `ProcessingState`, `TrustResult` rows, and `ReattemptableResource`
//! rows. Connection pooling, migrations and the concrete SQL schema are
//! deliberately left to the deployment; what matters to the core is the
//! contract below and that writes are transactional and conflict-checked.
//!
//! [`InMemoryStore`] is a reference implementation used by tests and by the
//! fixtures in [`crate::test_support`]; it enforces the same invariants
//! (monotonic block height, single current `TrustResult` per DID, one
//! reattempt row per resource id) that a real transactional store must.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{ErrorType, ProcessingState, ReattemptableResource, ResourceType, TrustResult};

/// Durable read/write access to processing state, trust results and
/// reattemptable resources.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads the current processing cursor.
    async fn processing_state(&self) -> Result<ProcessingState>;

    /// Advances `lastProcessedBlock`. Implementations must reject an
    /// attempt to set a value lower than the current one.
    async fn set_last_processed_block(&self, block: u64) -> Result<()>;

    /// Reads the current `TrustResult` for `did`, if one has ever been
    /// written.
    async fn get_trust_result(&self, did: &str) -> Result<Option<TrustResult>>;

    /// Transactionally replaces the `TrustResult` for `result.did`. At most
    /// one current row exists per DID.
    async fn upsert_trust_result(&self, result: TrustResult) -> Result<()>;

    /// Reads up to `limit` `TrustResult` rows whose `expiresAt` falls within
    /// `window` of now, ordered by `expiresAt` ascending.
    async fn list_expiring_trust_results(
        &self, window: Duration, limit: usize,
    ) -> Result<Vec<TrustResult>>;

    /// Upserts a reattemptable resource: `retryCount` increments on
    /// conflict and `lastRetryAt` is refreshed.
    async fn add_reattemptable(
        &self, resource_id: &str, resource_type: ResourceType, error_type: ErrorType,
    ) -> Result<()>;

    /// Returns retry-eligible resources: `lastRetryAt` older than a day and
    /// `firstFailureAt` newer than `max_retry_days`, ordered by
    /// `lastRetryAt` ascending, capped at 100.
    async fn retry_eligible(&self, max_retry_days: i64) -> Result<Vec<ReattemptableResource>>;

    /// Deletes a reattemptable resource after a successful retry.
    async fn remove_reattemptable(&self, resource_id: &str) -> Result<()>;

    /// Deletes reattemptable resources whose `firstFailureAt` is older than
    /// `max_retry_days` and returns their ids.
    async fn cleanup_expired_retries(&self, max_retry_days: i64) -> Result<Vec<String>>;
}

/// Advisory single-writer leader lock.
#[async_trait]
pub trait LeaderLock: Send + Sync {
    /// Attempts to acquire the lock for `holder_id`. Non-blocking: returns
    /// `false` immediately if another holder currently owns it.
    async fn try_acquire(&self, holder_id: &str) -> Result<bool>;

    /// Releases the lock, if currently held by `holder_id`. Idempotent.
    async fn release(&self, holder_id: &str) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    processing_state: ProcessingState,
    trust_results: HashMap<String, TrustResult>,
    reattempts: HashMap<String, ReattemptableResource>,
    leader_holder: Option<String>,
}

/// In-memory `StateStore` + `LeaderLock`, good enough for a single-process
/// deployment, tests, and the fixtures in [`crate::test_support`].
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner::default())) }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn processing_state(&self) -> Result<ProcessingState> {
        Ok(self.inner.lock().await.processing_state)
    }

    async fn set_last_processed_block(&self, block: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if block < inner.processing_state.last_processed_block {
            return Err(Error::StoreConflict(format!(
                "refusing to move lastProcessedBlock backward: {} -> {block}",
                inner.processing_state.last_processed_block
            )));
        }
        inner.processing_state.last_processed_block = block;
        Ok(())
    }

    async fn get_trust_result(&self, did: &str) -> Result<Option<TrustResult>> {
        Ok(self.inner.lock().await.trust_results.get(did).cloned())
    }

    async fn upsert_trust_result(&self, result: TrustResult) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if result.evaluated_at_block > inner.processing_state.last_processed_block {
            return Err(Error::StoreConflict(format!(
                "TrustResult for {} anchored at block {} ahead of lastProcessedBlock {}",
                result.did, result.evaluated_at_block, inner.processing_state.last_processed_block
            )));
        }
        inner.trust_results.insert(result.did.clone(), result);
        Ok(())
    }

    async fn list_expiring_trust_results(
        &self, window: Duration, limit: usize,
    ) -> Result<Vec<TrustResult>> {
        let inner = self.inner.lock().await;
        let cutoff = Utc::now() + chrono::Duration::from_std(window).unwrap_or_default();
        let mut rows: Vec<TrustResult> =
            inner.trust_results.values().filter(|r| r.expires_at <= cutoff).cloned().collect();
        rows.sort_by_key(|r| r.expires_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn add_reattemptable(
        &self, resource_id: &str, resource_type: ResourceType, error_type: ErrorType,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        inner
            .reattempts
            .entry(resource_id.to_string())
            .and_modify(|r| {
                r.retry_count += 1;
                r.last_retry_at = now;
                r.error_type = error_type;
            })
            .or_insert(ReattemptableResource {
                resource_id: resource_id.to_string(),
                resource_type,
                first_failure_at: now,
                last_retry_at: now,
                error_type,
                retry_count: 0,
            });
        Ok(())
    }

    async fn retry_eligible(&self, max_retry_days: i64) -> Result<Vec<ReattemptableResource>> {
        let inner = self.inner.lock().await;
        let now = Utc::now();
        let one_day_ago = now - chrono::Duration::days(1);
        let oldest_allowed = now - chrono::Duration::days(max_retry_days);
        let mut rows: Vec<ReattemptableResource> = inner
            .reattempts
            .values()
            .filter(|r| r.last_retry_at < one_day_ago && r.first_failure_at > oldest_allowed)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.last_retry_at);
        rows.truncate(100);
        Ok(rows)
    }

    async fn remove_reattemptable(&self, resource_id: &str) -> Result<()> {
        self.inner.lock().await.reattempts.remove(resource_id);
        Ok(())
    }

    async fn cleanup_expired_retries(&self, max_retry_days: i64) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().await;
        let oldest_allowed = Utc::now() - chrono::Duration::days(max_retry_days);
        let expired: Vec<String> = inner
            .reattempts
            .values()
            .filter(|r| r.first_failure_at <= oldest_allowed)
            .map(|r| r.resource_id.clone())
            .collect();
        for id in &expired {
            inner.reattempts.remove(id);
        }
        Ok(expired)
    }
}

#[async_trait]
impl LeaderLock for InMemoryStore {
    async fn try_acquire(&self, holder_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match &inner.leader_holder {
            Some(h) if h == holder_id => Ok(true),
            Some(_) => Ok(false),
            None => {
                inner.leader_holder = Some(holder_id.to_string());
                Ok(true)
            }
        }
    }

    async fn release(&self, holder_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.leader_holder.as_deref() == Some(holder_id) {
            inner.leader_holder = None;
        }
        Ok(())
    }
}
