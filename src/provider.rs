//! # Provider
//!
//! Composes every capability the trust resolution pipeline needs from its
//! environment into one bound, the way `credibil-vc`'s `oid4vp::Provider`
//! bundles `Metadata + StateStore + SignerExt + ...` into a single supertrait
//! with a blanket implementation. A concrete deployment wires up one
//! `AppProvider` satisfying all of them by delegating to its component
//! fields; tests and fixtures can instead hand any other type that happens
//! to implement the full set.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use credibil_did::{DidResolver as ExternalDidResolver, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::ObjectCache;
use crate::did_resolver::DidResolverExt;
use crate::error::Result;
use crate::indexer::{ChangeActivity, DigestRecord, IndexerClient, PermissionFilter, SchemaFilter, TrustRegistryFilter};
use crate::model::{
    CredentialSchema, Did, DidDocument, ErrorType, Permission, PermissionSession, ProcessingState,
    ReattemptableResource, ResourceType, TrustRegistry, TrustResult,
};
use crate::store::{InMemoryStore, LeaderLock, StateStore};

/// Every capability the polling loop and trust resolver need: on-chain
/// reads, object caching, durable state, DID resolution in both of its
/// shapes, and leader election.
pub trait Provider:
    IndexerClient + ObjectCache + StateStore + LeaderLock + DidResolverExt + ExternalDidResolver + Clone
{
}

impl<T> Provider for T where
    T: IndexerClient + ObjectCache + StateStore + LeaderLock + DidResolverExt + ExternalDidResolver + Clone
{
}

/// A composed [`Provider`] built from independently swappable components.
/// The durable store is fixed to [`InMemoryStore`] for now — see
/// `DESIGN.md` for the tradeoff; a production deployment would parameterize
/// it the same way `indexer`/`cache`/`did_resolver` already are.
#[derive(Clone)]
pub struct AppProvider<IX, CC, DR> {
    indexer: Arc<IX>,
    cache: Arc<CC>,
    store: Arc<InMemoryStore>,
    did_resolver: Arc<DR>,
}

impl<IX, CC, DR> AppProvider<IX, CC, DR> {
    /// Builds a provider from its components.
    #[must_use]
    pub fn new(indexer: IX, cache: CC, store: InMemoryStore, did_resolver: DR) -> Self {
        Self { indexer: Arc::new(indexer), cache: Arc::new(cache), store: Arc::new(store), did_resolver: Arc::new(did_resolver) }
    }
}

#[async_trait]
impl<IX: IndexerClient, CC: Send + Sync, DR: Send + Sync> IndexerClient for AppProvider<IX, CC, DR> {
    async fn block_height(&self) -> Result<u64> {
        self.indexer.block_height().await
    }

    async fn list_changes(&self, block: u64) -> Result<Vec<ChangeActivity>> {
        self.indexer.list_changes(block).await
    }

    async fn list_credential_schemas(
        &self, filter: &SchemaFilter, at_block: Option<u64>,
    ) -> Result<Vec<CredentialSchema>> {
        self.indexer.list_credential_schemas(filter, at_block).await
    }

    async fn credential_schema_by_json_schema_id(
        &self, js_id: u64, at_block: Option<u64>,
    ) -> Result<Option<CredentialSchema>> {
        self.indexer.credential_schema_by_json_schema_id(js_id, at_block).await
    }

    async fn list_permissions(
        &self, filter: &PermissionFilter, at_block: Option<u64>,
    ) -> Result<Vec<Permission>> {
        self.indexer.list_permissions(filter, at_block).await
    }

    async fn permission(&self, id: u64, at_block: Option<u64>) -> Result<Option<Permission>> {
        self.indexer.permission(id, at_block).await
    }

    async fn permission_session(
        &self, id: u64, at_block: Option<u64>,
    ) -> Result<Option<PermissionSession>> {
        self.indexer.permission_session(id, at_block).await
    }

    async fn find_beneficiaries(
        &self, issuer_perm_id: u64, verifier_perm_id: u64, at_block: Option<u64>,
    ) -> Result<Vec<Permission>> {
        self.indexer.find_beneficiaries(issuer_perm_id, verifier_perm_id, at_block).await
    }

    async fn trust_registry(&self, id: u64, at_block: Option<u64>) -> Result<Option<TrustRegistry>> {
        self.indexer.trust_registry(id, at_block).await
    }

    async fn list_trust_registries(
        &self, filter: &TrustRegistryFilter, at_block: Option<u64>,
    ) -> Result<Vec<TrustRegistry>> {
        self.indexer.list_trust_registries(filter, at_block).await
    }

    async fn digest(&self, digest_sri: &str, at_block: Option<u64>) -> Result<Option<DigestRecord>> {
        self.indexer.digest(digest_sri, at_block).await
    }

    async fn trust_deposit_by_account(&self, did: &str, at_block: Option<u64>) -> Result<u128> {
        self.indexer.trust_deposit_by_account(did, at_block).await
    }

    async fn fetch_json_schema_content(&self, js_id: u64, at_block: Option<u64>) -> Result<String> {
        self.indexer.fetch_json_schema_content(js_id, at_block).await
    }

    async fn clear_memo(&self) {
        self.indexer.clear_memo().await;
    }
}

#[async_trait]
impl<IX: Send + Sync, CC: ObjectCache, DR: Send + Sync> ObjectCache for AppProvider<IX, CC, DR> {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        self.cache.get(key).await
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        self.cache.set(key, value, ttl).await;
    }

    async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }
}

#[async_trait]
impl<IX: Send + Sync, CC: Send + Sync, DR: Send + Sync> StateStore for AppProvider<IX, CC, DR> {
    async fn processing_state(&self) -> Result<ProcessingState> {
        self.store.processing_state().await
    }

    async fn set_last_processed_block(&self, block: u64) -> Result<()> {
        self.store.set_last_processed_block(block).await
    }

    async fn get_trust_result(&self, did: &str) -> Result<Option<TrustResult>> {
        self.store.get_trust_result(did).await
    }

    async fn upsert_trust_result(&self, result: TrustResult) -> Result<()> {
        self.store.upsert_trust_result(result).await
    }

    async fn list_expiring_trust_results(
        &self, window: Duration, limit: usize,
    ) -> Result<Vec<TrustResult>> {
        self.store.list_expiring_trust_results(window, limit).await
    }

    async fn add_reattemptable(
        &self, resource_id: &str, resource_type: ResourceType, error_type: ErrorType,
    ) -> Result<()> {
        self.store.add_reattemptable(resource_id, resource_type, error_type).await
    }

    async fn retry_eligible(&self, max_retry_days: i64) -> Result<Vec<ReattemptableResource>> {
        self.store.retry_eligible(max_retry_days).await
    }

    async fn remove_reattemptable(&self, resource_id: &str) -> Result<()> {
        self.store.remove_reattemptable(resource_id).await
    }

    async fn cleanup_expired_retries(&self, max_retry_days: i64) -> Result<Vec<String>> {
        self.store.cleanup_expired_retries(max_retry_days).await
    }
}

#[async_trait]
impl<IX: Send + Sync, CC: Send + Sync, DR: Send + Sync> LeaderLock for AppProvider<IX, CC, DR> {
    async fn try_acquire(&self, holder_id: &str) -> Result<bool> {
        self.store.try_acquire(holder_id).await
    }

    async fn release(&self, holder_id: &str) -> Result<()> {
        self.store.release(holder_id).await
    }
}

#[async_trait]
impl<IX: Send + Sync, CC: Send + Sync, DR: DidResolverExt> DidResolverExt for AppProvider<IX, CC, DR> {
    async fn resolve(&self, did: &Did) -> Result<DidDocument> {
        self.did_resolver.resolve(did).await
    }

    async fn invalidate(&self, did: &Did) {
        self.did_resolver.invalidate(did).await;
    }
}

impl<IX: Send + Sync, CC: Send + Sync, DR: ExternalDidResolver + Send + Sync> ExternalDidResolver
    for AppProvider<IX, CC, DR>
{
    async fn resolve(&self, url: &str) -> anyhow::Result<Document> {
        self.did_resolver.resolve(url).await
    }
}
