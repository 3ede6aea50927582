//! bo-runtime
//!
//! One reconciliation pass for one client:
//! lookup -> read -> compute -> optional write-back -> re-merge.
//!
//! Steps run strictly in that order. Only the prior-map read is fatal; a
//! failed subscription lookup degrades to "no plan" and a failed write-back
//! is logged and reported, never returned as an error.

use std::sync::Arc;

use anyhow::{Context, Result};
use bo_backend::{ModuleStore, Subscription, SubscriptionLookup};
use bo_modules::{merge_over, reconcile_with_report, ModuleActivationMap, ModulePolicy, ReconcileReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Persist the reconciled map through the backend sync RPC.
    pub write_back: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { write_back: true }
    }
}

impl SyncSettings {
    /// Reads `/sync/write_back` (default `true`).
    pub fn from_config_json(config: &Value) -> Self {
        Self {
            write_back: config
                .pointer("/sync/write_back")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What happened to the write-back step of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteBack {
    /// Disabled by configuration.
    Disabled,
    /// No active subscription, so there is no plan id to sync against.
    NoPlan,
    /// Running on a detached task (see [`ModuleSync::load_detached`]).
    Pending,
    /// Persisted; `modules` is the map the store returned.
    Persisted { modules: ModuleActivationMap },
    Failed { error: String },
}

impl WriteBack {
    pub fn is_failed(&self) -> bool {
        matches!(self, WriteBack::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub client_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub plan_name: Option<String>,
    pub report: ReconcileReport,
    /// Map the caller should render.
    pub modules: ModuleActivationMap,
    pub write_back: WriteBack,
}

// ---------------------------------------------------------------------------
// ModuleSync
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ModuleSync {
    policy: Arc<ModulePolicy>,
    lookup: Arc<dyn SubscriptionLookup>,
    store: Arc<dyn ModuleStore>,
    settings: SyncSettings,
}

impl ModuleSync {
    pub fn new(
        policy: ModulePolicy,
        lookup: Arc<dyn SubscriptionLookup>,
        store: Arc<dyn ModuleStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            lookup,
            store,
            settings,
        }
    }

    /// Both collaborators served by one backend.
    pub fn with_backend<B>(policy: ModulePolicy, backend: Arc<B>, settings: SyncSettings) -> Self
    where
        B: SubscriptionLookup + ModuleStore + 'static,
    {
        let lookup: Arc<dyn SubscriptionLookup> = backend.clone();
        let store: Arc<dyn ModuleStore> = backend;
        Self::new(policy, lookup, store, settings)
    }

    pub fn policy(&self) -> &ModulePolicy {
        &self.policy
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    async fn subscription(&self, client_id: Uuid) -> Option<Subscription> {
        match self.lookup.active_subscription(client_id).await {
            Ok(sub) => sub,
            Err(err) => {
                warn!(%client_id, error = %err, "subscription lookup failed; reconciling without a plan");
                None
            }
        }
    }

    /// Steps 1-3: lookup, read, compute. No side effect.
    async fn compute(&self, client_id: Uuid) -> Result<(Option<Subscription>, ReconcileReport)> {
        let sub = self.subscription(client_id).await;

        let prior = self
            .store
            .read_modules(client_id)
            .await
            .with_context(|| format!("read module map failed client_id={client_id}"))?;

        let report = reconcile_with_report(
            &self.policy,
            sub.as_ref().and_then(|s| s.features.as_ref()),
            &prior,
            sub.as_ref().and_then(|s| s.plan_name.as_deref()),
        );

        info!(
            %client_id,
            plan_id = ?sub.as_ref().map(|s| s.plan_id),
            outcome = ?report.outcome,
            changes = report.changes.len(),
            suppressed = report.suppressed.len(),
            "modules reconciled"
        );

        Ok((sub, report))
    }

    fn write_back_target(&self, sub: Option<&Subscription>) -> Result<Uuid, WriteBack> {
        if !self.settings.write_back {
            return Err(WriteBack::Disabled);
        }
        sub.map(|s| s.plan_id).ok_or(WriteBack::NoPlan)
    }

    /// Run a full pass, awaiting the write-back.
    ///
    /// On a successful write-back the returned map is the persisted map with
    /// the plan-derived overrides merged over it again.
    pub async fn load(&self, client_id: Uuid) -> Result<SyncOutcome> {
        let (sub, report) = self.compute(client_id).await?;

        let (modules, write_back) = match self.write_back_target(sub.as_ref()) {
            Err(skipped) => (report.result.clone(), skipped),
            Ok(plan_id) => {
                let wb = persist(self.store.as_ref(), client_id, plan_id).await;
                let modules = match &wb {
                    WriteBack::Persisted { modules } => merge_over(modules, &report.derived),
                    _ => report.result.clone(),
                };
                (modules, wb)
            }
        };

        Ok(outcome(client_id, sub, report, modules, write_back))
    }

    /// Return the in-memory result immediately and run the write-back on a
    /// spawned task.
    ///
    /// Dropping or aborting the handle abandons the write-back; the store
    /// call is idempotent so the next pass converges. Must be called from
    /// within a tokio runtime.
    pub async fn load_detached(
        &self,
        client_id: Uuid,
    ) -> Result<(SyncOutcome, Option<JoinHandle<WriteBack>>)> {
        let (sub, report) = self.compute(client_id).await?;
        let modules = report.result.clone();

        let (write_back, handle) = match self.write_back_target(sub.as_ref()) {
            Err(skipped) => (skipped, None),
            Ok(plan_id) => {
                let store = Arc::clone(&self.store);
                let handle =
                    tokio::spawn(async move { persist(store.as_ref(), client_id, plan_id).await });
                (WriteBack::Pending, Some(handle))
            }
        };

        Ok((outcome(client_id, sub, report, modules, write_back), handle))
    }
}

async fn persist(store: &dyn ModuleStore, client_id: Uuid, plan_id: Uuid) -> WriteBack {
    match store.sync_modules_from_plan(client_id, plan_id).await {
        Ok(modules) => WriteBack::Persisted { modules },
        Err(err) => {
            warn!(%client_id, %plan_id, error = %err, "module write-back failed");
            WriteBack::Failed {
                error: err.to_string(),
            }
        }
    }
}

fn outcome(
    client_id: Uuid,
    sub: Option<Subscription>,
    report: ReconcileReport,
    modules: ModuleActivationMap,
    write_back: WriteBack,
) -> SyncOutcome {
    let (plan_id, plan_name) = match sub {
        Some(s) => (Some(s.plan_id), s.plan_name),
        None => (None, None),
    };
    SyncOutcome {
        client_id,
        plan_id,
        plan_name,
        report,
        modules,
        write_back,
    }
}
