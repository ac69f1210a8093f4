//! # Test Fixtures
//!
//! In-memory doubles for the pipeline's external dependencies: an
//! [`InMemoryIndexerClient`] driven entirely by setter methods, a
//! [`FixtureDidResolver`] serving pre-registered documents for both DID
//! resolution interfaces, and a fixed Ed25519 keypair for signing test
//! credentials the same way [`crate::proof`] verifies them.
//!
//! Nothing here is reachable from non-test code; it exists so integration
//! tests can exercise the full pipeline without a live indexer or network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::indexer::{
    ChangeActivity, DigestRecord, IndexerClient, PermissionFilter, SchemaFilter, TrustRegistryFilter,
};
use crate::model::{CredentialSchema, Did, DidDocument, Permission, PermissionSession, TrustRegistry};

/// A fixed Ed25519 signer for test fixtures, producing the same
/// `multibase`-encoded `proofValue`/JWS signature shape [`crate::proof`]
/// verifies.
pub struct FixtureSigner {
    key: SigningKey,
}

impl FixtureSigner {
    /// Generates a fresh keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self { key: SigningKey::generate(&mut OsRng) }
    }

    /// The public key as a base64url JWK `x` value, as [`crate::proof`]
    /// expects to read it back out of a resolved verification method.
    #[must_use]
    pub fn jwk_x(&self) -> String {
        Base64UrlUnpadded::encode_string(self.key.verifying_key().as_bytes())
    }

    /// Signs `message`, returning a multibase (`z`-prefixed base58btc)
    /// encoded signature suitable for a Data Integrity proof's `proofValue`.
    #[must_use]
    pub fn sign_multibase(&self, message: &[u8]) -> String {
        let signature = self.key.sign(message);
        multibase::encode(multibase::Base::Base58Btc, signature.to_bytes())
    }

    /// Signs `message`, returning a base64url-encoded signature suitable for
    /// a JWS's third (signature) segment.
    #[must_use]
    pub fn sign_jws_segment(&self, message: &[u8]) -> String {
        let signature = self.key.sign(message);
        Base64UrlUnpadded::encode_string(&signature.to_bytes())
    }
}

/// A DID resolver fixture backed by pre-registered DID documents, serving
/// both [`crate::did_resolver::DidResolverExt`] (service-endpoint lookups)
/// and [`credibil_did::DidResolver`] (verification-method lookups) from the
/// same registered JSON document.
#[derive(Clone, Default)]
pub struct FixtureDidResolver {
    documents: Arc<RwLock<HashMap<Did, serde_json::Value>>>,
}

impl FixtureDidResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the full DID document JSON (`id`, `service`,
    /// `verificationMethod`, ...) to be served for `did`.
    pub async fn register(&self, did: &Did, document_json: serde_json::Value) {
        self.documents.write().await.insert(did.clone(), document_json);
    }
}

#[async_trait]
impl crate::did_resolver::DidResolverExt for FixtureDidResolver {
    async fn resolve(&self, did: &Did) -> Result<DidDocument> {
        let documents = self.documents.read().await;
        let raw = documents
            .get(did)
            .ok_or_else(|| crate::error::Error::DidResolutionPermanent { did: did.clone(), reason: "notFound".to_string() })?;
        serde_json::from_value(raw.clone()).map_err(|e| crate::error::Error::Other(anyhow::anyhow!("fixture document malformed: {e}")))
    }

    async fn invalidate(&self, _did: &Did) {}
}

impl credibil_did::DidResolver for FixtureDidResolver {
    async fn resolve(&self, url: &str) -> anyhow::Result<credibil_did::Document> {
        let did = url.split('#').next().unwrap_or(url).to_string();
        let documents = self.documents.read().await;
        let raw = documents.get(&did).ok_or_else(|| anyhow::anyhow!("no fixture document registered for {did}"))?;
        serde_json::from_value(raw.clone()).map_err(Into::into)
    }
}

/// An `IndexerClient` test double: every lookup is served from an
/// in-process table populated by the `with_*` setters; nothing is fetched
/// over the network.
#[derive(Clone, Default)]
pub struct InMemoryIndexerClient {
    inner: Arc<RwLock<IndexerState>>,
}

#[derive(Default)]
struct IndexerState {
    height: u64,
    changes: HashMap<u64, Vec<ChangeActivity>>,
    schemas: Vec<CredentialSchema>,
    permissions: Vec<Permission>,
    permission_sessions: HashMap<u64, PermissionSession>,
    trust_registries: Vec<TrustRegistry>,
    digests: HashMap<String, DigestRecord>,
    deposits: HashMap<String, u128>,
    schema_content: HashMap<u64, String>,
}

impl InMemoryIndexerClient {
    /// Creates an empty indexer double.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current chain head `block_height` will report.
    pub async fn set_height(&self, height: u64) {
        self.inner.write().await.height = height;
    }

    /// Registers the change feed for `block`.
    pub async fn set_changes(&self, block: u64, activity: Vec<ChangeActivity>) {
        self.inner.write().await.changes.insert(block, activity);
    }

    /// Registers a credential schema.
    pub async fn add_schema(&self, schema: CredentialSchema) {
        self.inner.write().await.schemas.push(schema);
    }

    /// Registers a permission.
    pub async fn add_permission(&self, permission: Permission) {
        self.inner.write().await.permissions.push(permission);
    }

    /// Registers a permission session.
    pub async fn add_permission_session(&self, session: PermissionSession) {
        self.inner.write().await.permission_sessions.insert(session.id, session);
    }

    /// Registers a trust registry.
    pub async fn add_trust_registry(&self, registry: TrustRegistry) {
        self.inner.write().await.trust_registries.push(registry);
    }

    /// Registers a digest record under its SRI string.
    pub async fn add_digest(&self, digest_sri: &str, record: DigestRecord) {
        self.inner.write().await.digests.insert(digest_sri.to_string(), record);
    }

    /// Sets the trust deposit amount held against `did`.
    pub async fn set_deposit(&self, did: &str, amount: u128) {
        self.inner.write().await.deposits.insert(did.to_string(), amount);
    }

    /// Registers the raw JSON Schema text for a VPR json-schema id.
    pub async fn set_schema_content(&self, js_id: u64, content: &str) {
        self.inner.write().await.schema_content.insert(js_id, content.to_string());
    }
}

#[async_trait]
impl IndexerClient for InMemoryIndexerClient {
    async fn block_height(&self) -> Result<u64> {
        Ok(self.inner.read().await.height)
    }

    async fn list_changes(&self, block: u64) -> Result<Vec<ChangeActivity>> {
        Ok(self.inner.read().await.changes.get(&block).cloned().unwrap_or_default())
    }

    async fn list_credential_schemas(
        &self, filter: &SchemaFilter, _at_block: Option<u64>,
    ) -> Result<Vec<CredentialSchema>> {
        let state = self.inner.read().await;
        Ok(state
            .schemas
            .iter()
            .filter(|s| filter.json_schema.as_ref().is_none_or(|js| js == &s.json_schema))
            .filter(|s| filter.tr_id.is_none_or(|tr| tr == s.tr_id))
            .cloned()
            .collect())
    }

    async fn credential_schema_by_json_schema_id(
        &self, js_id: u64, _at_block: Option<u64>,
    ) -> Result<Option<CredentialSchema>> {
        Ok(self.inner.read().await.schemas.iter().find(|s| s.id == js_id).cloned())
    }

    async fn list_permissions(
        &self, filter: &PermissionFilter, _at_block: Option<u64>,
    ) -> Result<Vec<Permission>> {
        let state = self.inner.read().await;
        Ok(state
            .permissions
            .iter()
            .filter(|p| filter.did.as_ref().is_none_or(|did| did == &p.did))
            .filter(|p| filter.schema_id.is_none_or(|id| id == p.schema_id))
            .filter(|p| {
                filter.type_.as_ref().is_none_or(|t| {
                    serde_json::to_value(p.type_).ok().and_then(|v| v.as_str().map(str::to_string)).as_deref()
                        == Some(t.as_str())
                })
            })
            .filter(|p| !filter.only_valid || matches!(p.state, crate::model::PermissionState::Active))
            .cloned()
            .collect())
    }

    async fn permission(&self, id: u64, _at_block: Option<u64>) -> Result<Option<Permission>> {
        Ok(self.inner.read().await.permissions.iter().find(|p| p.id == id).cloned())
    }

    async fn permission_session(
        &self, id: u64, _at_block: Option<u64>,
    ) -> Result<Option<PermissionSession>> {
        Ok(self.inner.read().await.permission_sessions.get(&id).cloned())
    }

    async fn find_beneficiaries(
        &self, issuer_perm_id: u64, verifier_perm_id: u64, _at_block: Option<u64>,
    ) -> Result<Vec<Permission>> {
        let state = self.inner.read().await;
        Ok(state
            .permissions
            .iter()
            .filter(|p| p.validator_perm_id == Some(issuer_perm_id) || p.validator_perm_id == Some(verifier_perm_id))
            .cloned()
            .collect())
    }

    async fn trust_registry(&self, id: u64, _at_block: Option<u64>) -> Result<Option<TrustRegistry>> {
        Ok(self.inner.read().await.trust_registries.iter().find(|tr| tr.id == id).cloned())
    }

    async fn list_trust_registries(
        &self, filter: &TrustRegistryFilter, _at_block: Option<u64>,
    ) -> Result<Vec<TrustRegistry>> {
        let state = self.inner.read().await;
        Ok(state
            .trust_registries
            .iter()
            .filter(|tr| filter.did.as_ref().is_none_or(|did| did == &tr.did))
            .cloned()
            .collect())
    }

    async fn digest(&self, digest_sri: &str, _at_block: Option<u64>) -> Result<Option<DigestRecord>> {
        Ok(self.inner.read().await.digests.get(digest_sri).cloned())
    }

    async fn trust_deposit_by_account(&self, did: &str, _at_block: Option<u64>) -> Result<u128> {
        Ok(self.inner.read().await.deposits.get(did).copied().unwrap_or(0))
    }

    async fn fetch_json_schema_content(&self, js_id: u64, _at_block: Option<u64>) -> Result<String> {
        self.inner
            .read()
            .await
            .schema_content
            .get(&js_id)
            .cloned()
            .ok_or_else(|| crate::error::Error::IndexerUnavailable(format!("no fixture content for schema {js_id}")))
    }

    async fn clear_memo(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn indexer_double_reports_registered_height() {
        let indexer = InMemoryIndexerClient::new();
        indexer.set_height(42).await;
        assert_eq!(indexer.block_height().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn indexer_double_filters_permissions_by_did() {
        let indexer = InMemoryIndexerClient::new();
        indexer
            .add_permission(Permission {
                id: 1,
                schema_id: 1,
                type_: crate::model::PermissionType::Issuer,
                did: "did:web:issuer.example.com".to_string(),
                effective_from: chrono::Utc::now(),
                effective_until: None,
                deposit: 0,
                state: crate::model::PermissionState::Active,
                validator_perm_id: None,
                issuance_fee: None,
                verification_fee: None,
                fee_discount_permille: None,
            })
            .await;
        let filter = PermissionFilter { did: Some("did:web:other.example.com".to_string()), ..Default::default() };
        assert!(indexer.list_permissions(&filter, None).await.unwrap().is_empty());
    }

    #[test]
    fn fixture_signer_produces_verifiable_signature() {
        let signer = FixtureSigner::generate();
        let sig = signer.sign_multibase(b"hello world");
        assert!(sig.starts_with('z'));
    }
}
