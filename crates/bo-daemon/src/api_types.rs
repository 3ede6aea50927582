//! Request and response types for all bo-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use bo_runtime::SyncOutcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Hash of the merged config the daemon booted with (if any).
    pub config_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine code: "BAD_CLIENT_ID" | "STORE_UNAVAILABLE"
    pub code: String,
}

// ---------------------------------------------------------------------------
// GET /v1/clients/:client_id/modules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesQuery {
    /// Return before the write-back completes; the result arrives on the bus.
    #[serde(default)]
    pub detach: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientModulesResponse {
    #[serde(flatten)]
    pub outcome: SyncOutcome,
    /// Active module codes, sorted.
    pub enabled: Vec<String>,
}

// ---------------------------------------------------------------------------
// POST /v1/modules/preview
// ---------------------------------------------------------------------------

/// Raw JSON is accepted for both maps; decoding is permissive (see
/// `FeatureSet::from_plan_column`). `features` absent, `null` or not an
/// object means "no plan".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub features: Option<Value>,
    #[serde(default)]
    pub prior: Option<Value>,
    #[serde(default)]
    pub plan_name: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /v1/modules/migrate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateRequest {
    pub modules: Value,
}
