//! Shared runtime state for bo-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum; this module owns
//! nothing async itself apart from the heartbeat task.

use std::time::Duration;

use bo_modules::{merge_over, ModuleActivationMap};
use bo_runtime::{ModuleSync, SyncOutcome, WriteBack};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    ModulesReconciled {
        client_id: Uuid,
        plan_id: Option<Uuid>,
        changes: usize,
        enabled: Vec<String>,
    },
    /// `enabled` is read from the persisted map with the plan-derived
    /// overrides merged over it.
    WriteBackPersisted {
        client_id: Uuid,
        plan_id: Option<Uuid>,
        enabled: Vec<String>,
    },
    WriteBackFailed {
        client_id: Uuid,
        plan_id: Option<Uuid>,
        error: String,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::ModulesReconciled { .. } => "modules_reconciled",
            BusMsg::WriteBackPersisted { .. } => "write_back_persisted",
            BusMsg::WriteBackFailed { .. } => "write_back_failed",
        }
    }

    pub fn reconciled(outcome: &SyncOutcome) -> Self {
        BusMsg::ModulesReconciled {
            client_id: outcome.client_id,
            plan_id: outcome.plan_id,
            changes: outcome.report.changes.len(),
            enabled: outcome.modules.enabled(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    /// Reconciliation pass wired to the configured backend.
    pub sync: ModuleSync,
    pub config_hash: Option<String>,
}

impl AppState {
    pub fn new(sync: ModuleSync, config_hash: Option<String>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "bo-daemon".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            sync,
            config_hash,
        }
    }

    /// Publish a finished write-back. Skipped, disabled and pending
    /// write-backs publish nothing.
    pub fn publish_write_back(
        &self,
        client_id: Uuid,
        plan_id: Option<Uuid>,
        wb: &WriteBack,
        derived: &ModuleActivationMap,
    ) {
        let msg = match wb {
            WriteBack::Persisted { modules } => BusMsg::WriteBackPersisted {
                client_id,
                plan_id,
                enabled: merge_over(modules, derived).enabled(),
            },
            WriteBack::Failed { error } => BusMsg::WriteBackFailed {
                client_id,
                plan_id,
                error: error.clone(),
            },
            _ => return,
        };
        let _ = self.bus.send(msg);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
