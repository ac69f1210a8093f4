//! On-chain VPR entities consumed through the indexer: credential schemas,
//! trust registries and permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::did::Did;

/// A credential schema as recorded on-chain, scoped to a trust registry.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSchema {
    /// On-chain schema id.
    pub id: u64,

    /// Owning trust registry id.
    pub tr_id: u64,

    /// Raw JSON Schema text.
    pub json_schema: String,

    /// Controls who may hold an `ISSUER` permission for this schema.
    pub issuer_perm_management_mode: IssuerPermManagementMode,

    /// Creation time.
    pub created: DateTime<Utc>,

    /// Last archival/deprecation time, if any.
    pub archived: Option<DateTime<Utc>>,
}

/// Controls who may issue under a schema.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuerPermManagementMode {
    /// Anyone may self-register as an issuer.
    Open,
    /// Issuer permissions are granted by the ecosystem's validators.
    Ecosystem,
    /// Issuer permissions require a validating grantor permission
    /// (`ISSUER_GRANTOR`) in the chain.
    GrantorValidation,
}

/// A trust registry: the on-chain entity owning a set of credential schemas
/// and representing an ecosystem.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrustRegistry {
    /// On-chain trust registry id.
    pub id: u64,

    /// The DID that owns this registry — the "ecosystem DID".
    pub did: Did,

    /// Human readable alias, if set.
    pub aliases: Option<Vec<String>>,
}

/// An on-chain permission: a DID's authorization to act in some role for a
/// given schema.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// On-chain permission id.
    pub id: u64,

    /// The schema this permission governs.
    pub schema_id: u64,

    /// Permission role.
    #[serde(rename = "type")]
    pub type_: PermissionType,

    /// The DID granted this permission.
    pub did: Did,

    /// Start of the effective window.
    pub effective_from: DateTime<Utc>,

    /// End of the effective window, if bounded.
    pub effective_until: Option<DateTime<Utc>>,

    /// Trust deposit held against this permission.
    pub deposit: u128,

    /// Current lifecycle state.
    pub state: PermissionState,

    /// The permission that validated/granted this one, if any (populated
    /// for `ISSUER` permissions under `GRANTOR_VALIDATION` mode, and for
    /// grantor permissions themselves).
    pub validator_perm_id: Option<u64>,

    /// Fee charged to the issuer for each credential issued under this
    /// permission, in the registry's fee denomination.
    pub issuance_fee: Option<u128>,

    /// Fee charged to a verifier for each verification performed under this
    /// permission.
    pub verification_fee: Option<u128>,

    /// Discount applied to `issuance_fee`/`verification_fee` for
    /// ecosystem-internal participants, as a permille value.
    pub fee_discount_permille: Option<u32>,
}

/// The role a [`Permission`] grants.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    /// May issue credentials under the schema.
    Issuer,
    /// May verify credentials under the schema.
    Verifier,
    /// May grant `ISSUER` permissions (under `GRANTOR_VALIDATION` mode).
    IssuerGrantor,
    /// May grant `VERIFIER` permissions.
    VerifierGrantor,
    /// Represents the ecosystem's own root authority for the schema.
    Ecosystem,
    /// Represents a credential holder (not an authority role).
    Holder,
}

/// The lifecycle state of a [`Permission`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionState {
    /// Currently valid and usable.
    Active,
    /// Lapsed past its effective window.
    Expired,
    /// Revoked before its effective window lapsed.
    Revoked,
    /// Awaiting validator action (not yet usable).
    Pending,
    /// Rejected by a validator.
    Rejected,
}

/// A permission session: on-chain evidence of fee payment for an
/// issuer/verifier exchange.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSession {
    /// Session id.
    pub id: u64,

    /// The permission of the wallet agent that brokered the exchange.
    pub agent_perm_id: Option<u64>,

    /// Fee records covered by this session.
    pub records: Vec<PermissionSessionRecord>,

    /// Session creation time.
    pub created: DateTime<Utc>,
}

/// One fee record within a [`PermissionSession`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSessionRecord {
    /// Issuer permission id this record pays for.
    pub issuer_perm_id: Option<u64>,
    /// Verifier permission id this record pays for.
    pub verifier_perm_id: Option<u64>,
    /// Wallet agent permission id that brokered the fee payment.
    pub wallet_agent_perm_id: Option<u64>,
}
