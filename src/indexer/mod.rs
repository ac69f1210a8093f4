//! # Indexer Client
//!
//! The logical request/response contract this resolver needs from the
//! on-chain VPR indexer: current block height, a block-scoped change feed,
//! point-in-time entity lookups, and a push channel for block-processed
//! notifications. Transport details (retries, URL building, connection
//! pooling) live in [`http`] and are not part of this contract.

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{CredentialSchema, Did, Permission, PermissionSession, TrustRegistry};

/// One changed-entity record within a block's activity feed.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeActivity {
    /// Wall-clock time the change was recorded by the chain.
    pub timestamp: DateTime<Utc>,
    /// Block height the change landed in.
    pub block_height: u64,
    /// The kind of on-chain entity that changed (`permission`, `trust_registry`, ...).
    pub entity_type: String,
    /// The changed entity's on-chain id, as a string (schemas/permissions use
    /// integer ids; accounts use DIDs).
    pub entity_id: String,
    /// The account DID that initiated the change, when applicable.
    pub account: Option<String>,
    /// A free-form description of the change, carried through for logging.
    pub msg: Option<String>,
    /// Field-level old/new values.
    #[serde(default)]
    pub changes: HashMap<String, FieldChange>,
}

/// Before/after values for one changed field.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FieldChange {
    /// Prior value, as JSON (shape varies by field).
    pub old: Option<serde_json::Value>,
    /// New value, as JSON.
    pub new: Option<serde_json::Value>,
}

/// Extracts the set of DIDs affected by a block's activity feed: the `did`
/// and `grantee` fields of permission changes, the `did` field of
/// trust-registry changes, and any `account` that looks like a DID.
#[must_use]
pub fn affected_dids(activity: &[ChangeActivity]) -> Vec<Did> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut push = |did: Option<String>, seen: &mut std::collections::HashSet<String>| {
        if let Some(did) = did {
            if did.starts_with("did:") && seen.insert(did.clone()) {
                out.push(did);
            }
        }
    };

    for entry in activity {
        if let Some(change) = entry.changes.get("did") {
            push(field_did(&change.old), &mut seen);
            push(field_did(&change.new), &mut seen);
        }
        if let Some(change) = entry.changes.get("grantee") {
            push(field_did(&change.old), &mut seen);
            push(field_did(&change.new), &mut seen);
        }
        if let Some(account) = &entry.account {
            push(Some(account.clone()), &mut seen);
        }
    }
    out
}

fn field_did(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref()?.as_str().map(str::to_string)
}

/// Filter accepted by `listPermissions`.
#[derive(Clone, Debug, Default)]
pub struct PermissionFilter {
    /// Restrict to this DID.
    pub did: Option<Did>,
    /// Restrict to this schema.
    pub schema_id: Option<u64>,
    /// Restrict to this permission type (serialized `SCREAMING_SNAKE_CASE`).
    pub type_: Option<String>,
    /// Restrict to permissions currently within their effective window and
    /// `ACTIVE`.
    pub only_valid: bool,
}

/// Filter accepted by `listCredentialSchemas`.
#[derive(Clone, Debug, Default)]
pub struct SchemaFilter {
    /// Exact raw schema text to match.
    pub json_schema: Option<String>,
    /// Restrict to a trust registry.
    pub tr_id: Option<u64>,
}

/// Filter accepted by `listTrustRegistries`.
#[derive(Clone, Debug, Default)]
pub struct TrustRegistryFilter {
    /// Restrict to this DID.
    pub did: Option<Did>,
}

/// An on-chain digest record, as returned by `getDigest`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DigestRecord {
    /// The block time the digest was first recorded, used as a credential's
    /// effective issuance time when present.
    pub created: DateTime<Utc>,
}

/// A block-processed push notification.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IndexerEvent {
    /// The indexer finished applying a new block.
    BlockProcessed {
        /// The processed block's height.
        height: u64,
        /// The block's timestamp.
        timestamp: DateTime<Utc>,
    },
}

/// Logical contract for the on-chain VPR indexer.
///
/// Implementations are expected to memoize point-in-time reads for the
/// duration of one poll cycle; `clear_memo` resets that memo at cycle
/// start so no stale intra-cycle reads bleed across cycles.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Current chain head as seen by the indexer.
    async fn block_height(&self) -> Result<u64>;

    /// The change feed for a single block.
    async fn list_changes(&self, block: u64) -> Result<Vec<ChangeActivity>>;

    /// Credential schemas matching `filter`, optionally pinned to a past
    /// block. Indexer responses may key the array as `schemas` or
    /// `credential_schemas`; implementations normalize both at this
    /// boundary.
    async fn list_credential_schemas(
        &self, filter: &SchemaFilter, at_block: Option<u64>,
    ) -> Result<Vec<CredentialSchema>>;

    /// A single credential schema by its VPR json-schema id.
    async fn credential_schema_by_json_schema_id(
        &self, js_id: u64, at_block: Option<u64>,
    ) -> Result<Option<CredentialSchema>>;

    /// Permissions matching `filter`.
    async fn list_permissions(
        &self, filter: &PermissionFilter, at_block: Option<u64>,
    ) -> Result<Vec<Permission>>;

    /// A single permission by id.
    async fn permission(&self, id: u64, at_block: Option<u64>) -> Result<Option<Permission>>;

    /// A permission session by id.
    async fn permission_session(
        &self, id: u64, at_block: Option<u64>,
    ) -> Result<Option<PermissionSession>>;

    /// Permissions downstream of an issuer/verifier permission pair — the
    /// beneficiary tree used by fee/session accounting.
    async fn find_beneficiaries(
        &self, issuer_perm_id: u64, verifier_perm_id: u64, at_block: Option<u64>,
    ) -> Result<Vec<Permission>>;

    /// A trust registry by id.
    async fn trust_registry(&self, id: u64, at_block: Option<u64>) -> Result<Option<TrustRegistry>>;

    /// Trust registries matching `filter`.
    async fn list_trust_registries(
        &self, filter: &TrustRegistryFilter, at_block: Option<u64>,
    ) -> Result<Vec<TrustRegistry>>;

    /// An on-chain digest record by its SRI string.
    async fn digest(&self, digest_sri: &str, at_block: Option<u64>) -> Result<Option<DigestRecord>>;

    /// The trust deposit amount held against an account DID.
    async fn trust_deposit_by_account(&self, did: &str, at_block: Option<u64>) -> Result<u128>;

    /// Raw JSON Schema text for a schema, by its VPR json-schema id.
    async fn fetch_json_schema_content(&self, js_id: u64, at_block: Option<u64>) -> Result<String>;

    /// Resets per-cycle request memoization. Called once at the start of
    /// every poll cycle.
    async fn clear_memo(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(entity_type: &str, account: Option<&str>, changes: &[(&str, &str, &str)]) -> ChangeActivity {
        ChangeActivity {
            timestamp: Utc::now(),
            block_height: 42,
            entity_type: entity_type.to_string(),
            entity_id: "1".to_string(),
            account: account.map(str::to_string),
            msg: None,
            changes: changes
                .iter()
                .map(|(field, old, new)| {
                    (
                        (*field).to_string(),
                        FieldChange {
                            old: Some(serde_json::Value::String((*old).to_string())),
                            new: Some(serde_json::Value::String((*new).to_string())),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn extracts_did_grantee_and_account_fields() {
        let activities = vec![
            activity("permission", None, &[("grantee", "did:web:a.example.com", "did:web:a.example.com")]),
            activity("trust_registry", None, &[("did", "did:web:b.example.com", "did:web:b.example.com")]),
            activity("permission", Some("did:web:c.example.com"), &[]),
        ];
        let mut dids = affected_dids(&activities);
        dids.sort();
        assert_eq!(
            dids,
            vec!["did:web:a.example.com", "did:web:b.example.com", "did:web:c.example.com"]
        );
    }

    #[test]
    fn deduplicates_and_ignores_non_did_accounts() {
        let activities = vec![
            activity("permission", Some("cosmos1abc"), &[("grantee", "did:web:a.example.com", "did:web:a.example.com")]),
            activity("permission", Some("did:web:a.example.com"), &[]),
        ];
        assert_eq!(affected_dids(&activities), vec!["did:web:a.example.com"]);
    }

    #[test]
    fn empty_feed_yields_no_dids() {
        assert!(affected_dids(&[]).is_empty());
    }

    #[test]
    fn feed_extraction_is_idempotent() {
        let activities = vec![activity("permission", Some("did:web:a.example.com"), &[])];
        assert_eq!(affected_dids(&activities), affected_dids(&activities));
    }
}
