//! # Verifiable-Service Requirement Evaluator
//!
//! Groups a DID's valid credentials by the ecosystem that issued their
//! schema, drops ecosystems outside the configured allowlist, and checks
//! each remaining group against VS-REQ-2/3/4. The overall verdict is
//! `TRUSTED` only if every applicable ecosystem is satisfied.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{CredentialEvaluation, Did, EcsType, TrustStatus};
use crate::provider::Provider;
use crate::trust_resolver::{self, EvaluationContext};

/// Evaluates the Verifiable-Service requirement for `did` over its
/// already-valid credentials.
///
/// # Errors
///
/// Returns an error only if recursive trust resolution (VS-REQ-4) itself
/// fails unrecoverably; a resolution that completes with an `UNTRUSTED`
/// verdict is not an error, it simply leaves that ecosystem unsatisfied.
pub async fn evaluate<P: Provider>(
    did: &Did, valid_credentials: &[CredentialEvaluation], ctx: &mut EvaluationContext<'_, P>,
) -> Result<TrustStatus> {
    let mut groups: HashMap<Did, Vec<&CredentialEvaluation>> = HashMap::new();
    for credential in valid_credentials {
        if let Some(ecosystem_did) = &credential.ecosystem_did {
            if ctx.allowed_ecosystem_dids.contains(ecosystem_did) {
                groups.entry(ecosystem_did.clone()).or_default().push(credential);
            }
        }
    }

    if groups.is_empty() {
        return Ok(TrustStatus::Untrusted);
    }

    let total = groups.len();
    let mut satisfied = 0usize;

    for (_ecosystem_did, credentials) in groups {
        if group_satisfied(did, &credentials, ctx).await? {
            satisfied += 1;
        }
    }

    Ok(if satisfied == total {
        TrustStatus::Trusted
    } else if satisfied > 0 {
        TrustStatus::Partial
    } else {
        TrustStatus::Untrusted
    })
}

async fn group_satisfied<P: Provider>(
    did: &Did, credentials: &[&CredentialEvaluation], ctx: &mut EvaluationContext<'_, P>,
) -> Result<bool> {
    let Some(service_cred) = credentials.iter().find(|c| c.ecs_type == Some(EcsType::Service)) else {
        return Ok(false);
    };

    let has_org_or_persona_presented_by =
        |creds: &[&CredentialEvaluation], presenter: &Did| {
            creds.iter().any(|c| {
                matches!(c.ecs_type, Some(EcsType::Org) | Some(EcsType::Persona)) && &c.presented_by == presenter
            })
        };

    if &service_cred.issued_by == did {
        return Ok(has_org_or_persona_presented_by(credentials, did));
    }

    let issuer_result = trust_resolver::resolve(&service_cred.issued_by, ctx).await?;
    Ok(issuer_result.credentials.iter().any(|c| {
        matches!(c.result, crate::model::CredentialResultStatus::Valid)
            && matches!(c.ecs_type, Some(EcsType::Org) | Some(EcsType::Persona))
            && c.presented_by == service_cred.issued_by
    }))
}
