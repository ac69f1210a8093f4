//! # Permission Chain Builder
//!
//! Builds the ordered evidence chain backing one credential's issuer
//! authorization: the `ISSUER` permission itself, an optional
//! `ISSUER_GRANTOR` parent, and the ecosystem's own `ECOSYSTEM` permission.
//! Each entry is enriched with the holder's trust deposit and, where
//! already memoized, its own trust status and ECS-derived attributes.
//!
//! This builder never recurses into trust resolution itself — it only
//! reads whatever is already present in the shared trust memo. Recursion
//! into an issuer's own trust status happens one layer up, in the
//! VS-requirement evaluator, before the memo is consulted here.

use std::collections::HashMap;

use crate::error::Result;
use crate::indexer::{IndexerClient, PermissionFilter};
use crate::model::{
    CredentialResultStatus, Did, EcsType, IssuerPermManagementMode, Permission, PermissionChainEntry,
    TrustResult,
};

/// Builds the permission evidence chain for an `ISSUER` permission.
///
/// Partial chains are acceptable: a missing grantor or ecosystem permission
/// does not invalidate the credential evaluation that called this.
///
/// # Errors
///
/// Returns an error only if an indexer call itself fails; missing
/// grantor/ecosystem permissions are simply omitted from the result.
pub async fn build_chain<I: IndexerClient>(
    issuer_perm: &Permission, mgmt_mode: IssuerPermManagementMode, ecosystem_did: &Did,
    at_block: Option<u64>, indexer: &I, trust_memo: &HashMap<Did, TrustResult>,
) -> Result<Vec<PermissionChainEntry>> {
    let mut entries = Vec::with_capacity(3);
    entries.push(to_entry(issuer_perm, indexer, at_block, trust_memo).await?);

    if matches!(mgmt_mode, IssuerPermManagementMode::GrantorValidation) {
        if let Some(validator_id) = issuer_perm.validator_perm_id {
            if let Some(grantor) = indexer.permission(validator_id, at_block).await? {
                entries.push(to_entry(&grantor, indexer, at_block, trust_memo).await?);
            }
        }
    }

    let ecosystem_filter = PermissionFilter {
        did: Some(ecosystem_did.clone()),
        schema_id: None,
        type_: Some("ECOSYSTEM".to_string()),
        only_valid: true,
    };
    if let Some(ecosystem_perm) = indexer.list_permissions(&ecosystem_filter, at_block).await?.into_iter().next()
    {
        entries.push(to_entry(&ecosystem_perm, indexer, at_block, trust_memo).await?);
    }

    Ok(entries)
}

async fn to_entry<I: IndexerClient>(
    perm: &Permission, indexer: &I, at_block: Option<u64>, trust_memo: &HashMap<Did, TrustResult>,
) -> Result<PermissionChainEntry> {
    let deposit = indexer.trust_deposit_by_account(&perm.did, at_block).await?;
    let memoized = trust_memo.get(&perm.did);

    Ok(PermissionChainEntry {
        permission_id: perm.id,
        type_: perm.type_,
        did: perm.did.clone(),
        did_is_trusted_vs: memoized.map(|r| matches!(r.trust_status, crate::model::TrustStatus::Trusted)),
        deposit,
        state: perm.state,
        effective_from: perm.effective_from,
        effective_until: perm.effective_until,
        service_name: ecs_claim(memoized, EcsType::Service, "name"),
        organization_name: ecs_claim(memoized, EcsType::Org, "name").or_else(|| ecs_claim(memoized, EcsType::Persona, "name")),
        country_code: ecs_claim(memoized, EcsType::Org, "countryCode").or_else(|| ecs_claim(memoized, EcsType::Persona, "countryCode")),
        legal_jurisdiction: ecs_claim(memoized, EcsType::Org, "legalJurisdiction"),
    })
}

fn ecs_claim(memoized: Option<&TrustResult>, ecs_type: EcsType, claim_key: &str) -> Option<String> {
    let result = memoized?;
    result
        .credentials
        .iter()
        .find(|c| c.result == CredentialResultStatus::Valid && c.ecs_type == Some(ecs_type))
        .and_then(|c| c.claims.get(claim_key))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::model::{CredentialEvaluation, CredentialFormat, PermissionState, PermissionType, TrustStatus};

    fn sample_permission(id: u64, did: &str) -> Permission {
        Permission {
            id,
            schema_id: 1,
            type_: PermissionType::Issuer,
            did: did.to_string(),
            effective_from: Utc::now(),
            effective_until: None,
            deposit: 0,
            state: PermissionState::Active,
            validator_perm_id: None,
            issuance_fee: None,
            verification_fee: None,
            fee_discount_permille: None,
        }
    }

    fn sample_credential_eval(ecs_type: EcsType, presented_by: &str) -> CredentialEvaluation {
        CredentialEvaluation {
            credential_id: None,
            result: CredentialResultStatus::Valid,
            ecs_type: Some(ecs_type),
            presented_by: presented_by.to_string(),
            issued_by: presented_by.to_string(),
            format: CredentialFormat::W3cJsonLd,
            effective_issuance_time: Utc::now(),
            digest_sri: None,
            ecosystem_did: None,
            schema_id: None,
            claims: serde_json::Map::from_iter([("name".to_string(), serde_json::Value::String("Acme Corp".to_string()))]),
            permission_chain: vec![],
        }
    }

    #[test]
    fn ecs_claim_extracts_name_from_memoized_result() {
        let mut memo = HashMap::new();
        memo.insert(
            "did:web:org.example.com".to_string(),
            TrustResult {
                did: "did:web:org.example.com".to_string(),
                trust_status: TrustStatus::Trusted,
                production: true,
                evaluated_at: Utc::now(),
                evaluated_at_block: 1,
                expires_at: Utc::now(),
                credentials: vec![sample_credential_eval(EcsType::Org, "did:web:org.example.com")],
                failed_credentials: vec![],
                vp_dereference_errors: vec![],
            },
        );
        let name = ecs_claim(memo.get("did:web:org.example.com"), EcsType::Org, "name");
        assert_eq!(name.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn ecs_claim_is_none_when_not_memoized() {
        assert_eq!(ecs_claim(None, EcsType::Org, "name"), None);
    }

    #[test]
    fn sample_permission_carries_through_to_plain_fields() {
        let perm = sample_permission(7, "did:web:issuer.example.com");
        assert_eq!(perm.id, 7);
        assert_eq!(perm.did, "did:web:issuer.example.com");
    }
}
