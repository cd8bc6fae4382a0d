//! Error Kinds
//!
//! The public surface (`Orchestrator::plan_route`) never panics; every
//! failure mode is one of the kinds below. Internal plumbing uses
//! `anyhow::Result` and layers are expected to convert into `PlanError`
//! only at the boundary the spec names.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid input: {reason}")]
    InputInvalid { reason: String },

    #[error("place could not be resolved: {reason}")]
    Unresolved { reason: String },

    #[error("no route between the requested places")]
    NoRoute,

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl PlanError {
    pub fn input_invalid(reason: impl Into<String>) -> Self {
        PlanError::InputInvalid {
            reason: reason.into(),
        }
    }

    pub fn unresolved(reason: impl Into<String>) -> Self {
        PlanError::Unresolved {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        PlanError::Internal {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the key-value cache. `CacheDegraded` callers never
/// let this escape into business logic — they fall back to RelStore.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("kv connection error: {0}")]
    Connection(String),
    #[error("kv serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for KvError {
    fn from(e: redis::RedisError) -> Self {
        KvError::Connection(e.to_string())
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}
