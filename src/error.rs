//! # Resolver Errors
//!
//! One crate-wide error enum covering conditions that abort a unit of work.
//! Per-credential and per-VP failures are captured as data
//! (`FailedCredential`, `ReattemptableResource`) and do **not** use this
//! type; `Error` is reserved for an unrecoverable invariant violation, or a
//! boundary we can't usefully continue past.

use thiserror::Error;

/// Errors surfaced by the resolver's public API.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration was missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The indexer did not respond, or returned a malformed payload.
    #[error("indexer unavailable: {0}")]
    IndexerUnavailable(String),

    /// A durable-store write would have violated a data invariant (e.g. a
    /// concurrent writer raced the leader).
    #[error("store conflict: {0}")]
    StoreConflict(String),

    /// The advisory leader lock was lost mid-cycle.
    #[error("leader lock lost")]
    LeaderLost,

    /// DID resolution failed in a way classified as permanent: `notFound`,
    /// `invalidDid`, `methodNotSupported`.
    #[error("permanent DID resolution failure for {did}: {reason}")]
    DidResolutionPermanent {
        /// The DID that failed to resolve.
        did: String,
        /// The classified reason string.
        reason: String,
    },

    /// DID resolution failed in a way expected to be transient.
    #[error("transient DID resolution failure for {did}: {reason}")]
    DidResolutionTransient {
        /// The DID that failed to resolve.
        did: String,
        /// The underlying error detail.
        reason: String,
    },

    /// A linked VP endpoint could not be fetched or parsed.
    #[error("failed to dereference VP at {endpoint}: {reason}")]
    VpFetchFailed {
        /// The VP endpoint URL.
        endpoint: String,
        /// The underlying error detail.
        reason: String,
    },

    /// Any other failure, wrapped from lower layers (HTTP client, JSON
    /// parsing, cryptography bindings, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type used throughout the resolver.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classifies a raw DID-resolution error string against the permanent-error
/// set.
#[must_use]
pub fn is_permanent_did_error(reason: &str) -> bool {
    const PERMANENT: &[&str] = &["notFound", "invalidDid", "methodNotSupported"];
    PERMANENT.iter().any(|p| reason.contains(p))
}
