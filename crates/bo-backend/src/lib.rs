//! bo-backend
//!
//! Boundary to the hosted backend that owns subscriptions, plans and member
//! spaces.
//!
//! This crate defines the two collaborator contracts the reconciliation pass
//! talks to ([`SubscriptionLookup`], [`ModuleStore`]), the closed error set
//! ([`BackendError`]) and two implementations:
//! - [`RestBackend`]: RPC calls over HTTP (`POST {base}/rest/v1/rpc/{name}`).
//! - [`MemoryBackend`]: in-process store used by tests and dry runs.
//!
//! The Postgres implementation lives in `bo-db`.

pub mod decode;
pub mod memory;
pub mod rest;
pub mod settings;

use std::fmt;

use async_trait::async_trait;
use bo_modules::{FeatureSet, ModuleActivationMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use settings::{BackendSettings, RpcNames};

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// The client's active subscription, as resolved by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan_id: Uuid,
    /// Display name of the plan; compared verbatim against the enterprise list.
    pub plan_name: Option<String>,
    /// `None` when the plan row carries no features column value.
    pub features: Option<FeatureSet>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a backend implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network or transport failure (connection refused, timeout, pool closed).
    Transport(String),
    /// The backend answered with an application-level error.
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// The named RPC does not exist on this deployment.
    RpcMissing { rpc: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// A required configuration value (base url, key) is missing or invalid.
    Config(String),
}

impl BackendError {
    pub fn is_rpc_missing(&self) -> bool {
        matches!(self, BackendError::RpcMissing { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(msg) => write!(f, "transport error: {msg}"),
            BackendError::Api {
                status,
                code: Some(c),
                message,
            } => write!(f, "backend api error status={status} code={c}: {message}"),
            BackendError::Api {
                status,
                code: None,
                message,
            } => write!(f, "backend api error status={status}: {message}"),
            BackendError::RpcMissing { rpc } => write!(f, "backend rpc missing: {rpc}"),
            BackendError::Decode(msg) => write!(f, "decode error: {msg}"),
            BackendError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Resolves the active subscription of a client.
#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    /// `Ok(None)` when the client has no active subscription.
    async fn active_subscription(&self, client_id: Uuid)
        -> Result<Option<Subscription>, BackendError>;
}

/// Reads and persists the per-client module activation map.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Stored map for the client's member space; an absent map reads as empty.
    async fn read_modules(&self, client_id: Uuid) -> Result<ModuleActivationMap, BackendError>;

    /// Ask the backend to reconcile the stored map against `plan_id` and
    /// persist it. Returns the map as stored after the call.
    ///
    /// Implementations must be idempotent: calling twice with the same plan
    /// leaves the same stored map.
    async fn sync_modules_from_plan(
        &self,
        client_id: Uuid,
        plan_id: Uuid,
    ) -> Result<ModuleActivationMap, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_api_with_code() {
        let err = BackendError::Api {
            status: 400,
            code: Some("22P02".to_string()),
            message: "invalid input syntax for type uuid".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "backend api error status=400 code=22P02: invalid input syntax for type uuid"
        );
    }

    #[test]
    fn display_rpc_missing() {
        let err = BackendError::RpcMissing {
            rpc: "sync_modules_from_plan".to_string(),
        };
        assert!(err.is_rpc_missing());
        assert_eq!(err.to_string(), "backend rpc missing: sync_modules_from_plan");
    }

    #[test]
    fn traits_are_object_safe() {
        fn _lookup(_: &dyn SubscriptionLookup) {}
        fn _store(_: &dyn ModuleStore) {}
    }
}
