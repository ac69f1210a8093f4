//! # Schema Resolution
//!
//! Resolves a credential's schema reference to an on-chain
//! [`CredentialSchema`], classifies it by ECS type, and verifies its
//! content against a declared digest.

use crate::config::EcsDigests;
use crate::error::Result;
use crate::indexer::{IndexerClient, SchemaFilter};
use crate::jcs;
use crate::model::{CredentialSchema, EcsType};

/// Parses a VPR schema URI of the shape `vpr:verana:<network>/cs/v1/js/<n>`
/// into its integer json-schema id. Returns `None` for any other shape
/// (ordinary URLs fall back to list-and-match resolution).
#[must_use]
pub fn parse_vpr_schema_uri(uri: &str) -> Option<u64> {
    let rest = uri.strip_prefix("vpr:verana:")?;
    let (_network, path) = rest.split_once('/')?;
    let n = path.strip_prefix("cs/v1/js/")?;
    n.parse().ok()
}

/// Resolves a schema reference string (a VPR URI or an ordinary URL) to the
/// on-chain schema it names, if any.
///
/// A VPR URI is looked up directly by its parsed id. Anything else is
/// resolved by listing on-chain schemas and matching either raw
/// `json_schema` text equality or the schema's own parsed `$id` against
/// `schema_ref`.
///
/// # Errors
///
/// Returns an error if the indexer call itself fails; an unresolved
/// reference is `Ok(None)`, not an error — issuer authorization will fail
/// downstream for a credential with no matching schema.
pub async fn resolve_schema_ref<I: IndexerClient>(
    schema_ref: &str, at_block: Option<u64>, indexer: &I,
) -> Result<Option<CredentialSchema>> {
    if let Some(js_id) = parse_vpr_schema_uri(schema_ref) {
        return indexer.credential_schema_by_json_schema_id(js_id, at_block).await;
    }

    let candidates = indexer.list_credential_schemas(&SchemaFilter::default(), at_block).await?;
    for schema in candidates {
        if schema.json_schema == schema_ref {
            return Ok(Some(schema));
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&schema.json_schema) {
            if value.get("$id").and_then(serde_json::Value::as_str) == Some(schema_ref) {
                return Ok(Some(schema));
            }
        }
    }
    Ok(None)
}

/// Classifies `schema_text` against the four configured reference digests.
#[must_use]
pub fn classify_ecs(schema_text: &str, digests: &EcsDigests) -> Option<EcsType> {
    let digest = jcs::ecs_digest(schema_text).ok()?;
    let hex = jcs::to_hex(&digest);
    if hex == digests.service {
        Some(EcsType::Service)
    } else if hex == digests.org {
        Some(EcsType::Org)
    } else if hex == digests.persona {
        Some(EcsType::Persona)
    } else if hex == digests.user_agent {
        Some(EcsType::UserAgent)
    } else {
        None
    }
}

/// Fetches a schema's on-chain content and verifies it against a declared
/// `digestSRI` value.
///
/// # Errors
///
/// Returns an error if the content fetch fails or the declared digest is
/// malformed; a clean mismatch is `Ok(false)`, not an error.
pub async fn verify_digest_sri<I: IndexerClient>(
    js_id: u64, declared_sri: &str, at_block: Option<u64>, indexer: &I,
) -> Result<bool> {
    let content = indexer.fetch_json_schema_content(js_id, at_block).await?;
    jcs::verify_sri(declared_sri, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EcsDigests;

    #[test]
    fn parses_vpr_schema_uri() {
        assert_eq!(parse_vpr_schema_uri("vpr:verana:mainnet/cs/v1/js/42"), Some(42));
    }

    #[test]
    fn rejects_non_vpr_uris() {
        assert_eq!(parse_vpr_schema_uri("https://example.com/schema.json"), None);
        assert_eq!(parse_vpr_schema_uri("vpr:verana:mainnet/other/shape"), None);
    }

    #[test]
    fn classifies_against_configured_digests() {
        let schema = r#"{"type":"object"}"#;
        let digest = jcs::to_hex(&jcs::ecs_digest(schema).unwrap());
        let digests = EcsDigests { service: digest, org: String::new(), persona: String::new(), user_agent: String::new() };
        assert_eq!(classify_ecs(schema, &digests), Some(EcsType::Service));
    }

    #[test]
    fn unmatched_digest_classifies_as_none() {
        let digests = EcsDigests::default();
        assert_eq!(classify_ecs(r#"{"type":"object"}"#, &digests), None);
    }
}
