//! Continuous trust resolution over Verifiable Public Registry state.
//!
//! Polls the on-chain indexer block by block, dereferences each affected
//! DID's linked Verifiable Presentations, evaluates the credentials they
//! carry against the on-chain trust registries and permissions, and
//! maintains a `TrustResult` per DID reflecting whether it currently
//! satisfies the Verifiable-Service requirement.
//!
//! # Feature Flags
//!
//! There is no default feature gating here; every module below is part of
//! the resolver's always-on pipeline.

pub mod cache;
pub mod config;
pub mod core;
pub mod credential_eval;
pub mod did_resolver;
pub mod error;
pub mod indexer;
pub mod jcs;
pub mod model;
pub mod permission_chain;
pub mod polling;
pub mod proof;
pub mod provider;
pub mod reattempt_service;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod trust_resolver;
pub mod vp;
pub mod vs_requirement;

/// Fixtures for unit and integration tests: in-memory indexer/DID-resolver
/// doubles and a fixed signing key. Not behind `cfg(test)` so integration
/// tests under `tests/` can reach it as `resolver::test_support`.
pub mod test_support;

/// Re-export DID resolution.
pub mod did {
    pub use credibil_did::*;
}

/// Re-export cryptographic types and functions.
pub mod infosec {
    pub use credibil_infosec::*;
}

/// Re-export basic types used across module boundaries.
pub use crate::core::{Kind, OneMany};
