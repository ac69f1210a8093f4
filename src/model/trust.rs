//! The authoritative per-DID verdict (`TrustResult`) and its supporting
//! evidence records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::model::credential::{CredentialFormat, EcsType};
use crate::model::did::Did;
use crate::model::registry::{PermissionState, PermissionType};

/// The authoritative per-DID trust verdict.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrustResult {
    /// The DID this verdict is about.
    pub did: Did,

    /// Overall verdict.
    pub trust_status: TrustStatus,

    /// `true` if any valid credential carries a non-null ECS type.
    /// Sandbox-vs-production semantics beyond that are left to DESIGN.md.
    pub production: bool,

    /// Wall-clock time this verdict was computed.
    pub evaluated_at: DateTime<Utc>,

    /// Block height this verdict is anchored to. Always
    /// `evaluated_at_block <= ProcessingState.last_processed_block` at the
    /// moment of write.
    pub evaluated_at_block: u64,

    /// Time this verdict should be refreshed by.
    pub expires_at: DateTime<Utc>,

    /// Credentials that contributed evidence (`VALID` or `IGNORED`).
    pub credentials: Vec<CredentialEvaluation>,

    /// Credentials that failed evaluation.
    pub failed_credentials: Vec<FailedCredential>,

    /// Errors encountered dereferencing this DID's linked VPs. Not
    /// credential failures — VP-level, so excluded from
    /// `failed_credentials`.
    pub vp_dereference_errors: Vec<VpDereferenceError>,
}

impl TrustResult {
    /// Builds an `UNTRUSTED` result carrying a single failed-credential
    /// entry, as used for DID resolution failures and cycle detection.
    #[must_use]
    pub fn untrusted_with_failure(
        did: Did, now: DateTime<Utc>, block: u64, ttl_seconds: i64, failure: FailedCredential,
    ) -> Self {
        Self {
            did,
            trust_status: TrustStatus::Untrusted,
            production: false,
            evaluated_at: now,
            evaluated_at_block: block,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
            credentials: Vec::new(),
            failed_credentials: vec![failure],
            vp_dereference_errors: Vec::new(),
        }
    }

    /// `true` if at least one `VALID` credential is present with a
    /// non-`None` ECS type.
    #[must_use]
    pub fn has_any_production_credential(&self) -> bool {
        self.credentials
            .iter()
            .any(|c| c.result == CredentialResultStatus::Valid && c.ecs_type.is_some())
    }
}

/// Overall trust verdict.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TrustStatus {
    /// Every applicable ecosystem VS requirement was satisfied.
    Trusted,
    /// Some, but not all, applicable ecosystem VS requirements were
    /// satisfied.
    Partial,
    /// No applicable ecosystem VS requirement was satisfied (or resolution
    /// failed outright).
    Untrusted,
}

/// One credential's evaluation outcome, recorded against a `TrustResult`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEvaluation {
    /// Credential id, if the credential declared one.
    pub credential_id: Option<String>,

    /// Whether this credential contributed to trust requirements.
    pub result: CredentialResultStatus,

    /// ECS classification, if the credential's schema matched a reference
    /// digest.
    pub ecs_type: Option<EcsType>,

    /// The DID that presented this credential (the VP holder).
    pub presented_by: Did,

    /// The DID that issued this credential.
    pub issued_by: Did,

    /// Securing mechanism.
    pub format: CredentialFormat,

    /// The time this credential is considered to have taken effect.
    pub effective_issuance_time: DateTime<Utc>,

    /// SRI digest of the credential's schema, computed during evaluation.
    pub digest_sri: Option<String>,

    /// The ecosystem DID this credential's schema belongs to, if resolved.
    pub ecosystem_did: Option<Did>,

    /// On-chain schema id, if resolved.
    pub schema_id: Option<u64>,

    /// Shallow copy of the credential subject's claims.
    pub claims: Map<String, serde_json::Value>,

    /// Evidence chain for the issuer's authorization to issue this
    /// credential. Empty when the credential is `IGNORED`.
    pub permission_chain: Vec<PermissionChainEntry>,
}

/// Whether a credential counted toward trust requirements.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum CredentialResultStatus {
    /// Passed all checks and carries a recognized ECS type.
    Valid,
    /// Passed all checks but is not evidentiary (no recognized ECS type).
    Ignored,
}

/// A credential that failed evaluation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailedCredential {
    /// Credential id, if known at the point of failure.
    pub credential_id: Option<String>,

    /// The failure classification.
    pub error_code: FailureCode,

    /// Human-readable detail.
    pub error_detail: String,

    /// The DID that presented the credential, if known.
    pub presented_by: Option<Did>,

    /// The DID that issued the credential, if known.
    pub issued_by: Option<Did>,
}

impl FailedCredential {
    /// Convenience constructor.
    #[must_use]
    pub fn new(code: FailureCode, detail: impl Into<String>) -> Self {
        Self {
            credential_id: None,
            error_code: code,
            error_detail: detail.into(),
            presented_by: None,
            issued_by: None,
        }
    }
}

/// Failure classification for a single credential.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum FailureCode {
    /// Signature verification failed.
    SignatureInvalid,
    /// Computed digest did not match the declared `digestSRI`.
    DigestSriMismatch,
    /// No active `ISSUER` permission authorizes this credential's issuer.
    IssuerNotAuthorized,
    /// Unexpected error during evaluation.
    EvaluationError,
    /// DID resolution for the presenting or issuing DID failed permanently.
    DidResolutionFailed,
    /// This DID was already on the active resolution path.
    CircularReference,
}

/// An error encountered while dereferencing one of a DID's linked VPs. Not
/// a credential failure.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VpDereferenceError {
    /// The VP endpoint URL that failed.
    pub endpoint: String,
    /// Error detail.
    pub detail: String,
}

/// One entry in an issuer's permission evidence chain.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionChainEntry {
    /// On-chain permission id.
    pub permission_id: u64,

    /// Permission role.
    #[serde(rename = "type")]
    pub type_: PermissionType,

    /// The DID holding this permission.
    pub did: Did,

    /// Whether this DID independently resolves as a trusted Verifiable
    /// Service, filled from the shared trust memo.
    pub did_is_trusted_vs: Option<bool>,

    /// Trust deposit amount, overridden from the on-chain trust-deposit
    /// lookup rather than copied from the permission's own `deposit` field.
    pub deposit: u128,

    /// Permission lifecycle state.
    pub state: PermissionState,

    /// Start of the effective window.
    pub effective_from: DateTime<Utc>,

    /// End of the effective window, if bounded.
    pub effective_until: Option<DateTime<Utc>>,

    /// Service name, when `did` holds a valid `ECS-SERVICE` credential.
    pub service_name: Option<String>,

    /// Organization name, when `did` holds a valid `ECS-ORG`/`ECS-PERSONA`
    /// credential.
    pub organization_name: Option<String>,

    /// Country code, when available from the same credential.
    pub country_code: Option<String>,

    /// Legal jurisdiction, when available from the same credential.
    pub legal_jurisdiction: Option<String>,
}
