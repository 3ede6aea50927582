//! In-process backend.
//!
//! Holds plans, active subscriptions and member-space module maps in memory.
//! `sync_modules_from_plan` runs the same reconciliation the hosted RPC does,
//! so repeated calls converge. Failure switches let tests and dry runs
//! exercise every error path of the reconciliation pass.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bo_modules::{reconcile, FeatureSet, ModuleActivationMap, ModulePolicy};
use uuid::Uuid;

use crate::{BackendError, ModuleStore, RpcNames, Subscription, SubscriptionLookup};

#[derive(Debug, Clone)]
struct PlanRecord {
    name: Option<String>,
    features: Option<FeatureSet>,
}

#[derive(Debug, Default)]
struct Inner {
    plans: HashMap<Uuid, PlanRecord>,
    /// client -> plan of its active subscription
    active: HashMap<Uuid, Uuid>,
    spaces: HashMap<Uuid, ModuleActivationMap>,
    fail_lookup: bool,
    fail_read: bool,
    fail_sync: bool,
    drop_sync_rpc: bool,
    sync_calls: u64,
}

#[derive(Debug)]
pub struct MemoryBackend {
    policy: ModulePolicy,
    rpc: RpcNames,
    inner: Mutex<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(ModulePolicy::default())
    }
}

impl MemoryBackend {
    pub fn new(policy: ModulePolicy) -> Self {
        Self {
            policy,
            rpc: RpcNames::default(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No invariant spans a panic here; keep serving after a poisoned lock.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_plan(
        &self,
        plan_id: Uuid,
        name: Option<&str>,
        features: Option<FeatureSet>,
    ) {
        self.lock().plans.insert(
            plan_id,
            PlanRecord {
                name: name.map(str::to_string),
                features,
            },
        );
    }

    /// Make `plan_id` the client's active subscription.
    pub fn subscribe(&self, client_id: Uuid, plan_id: Uuid) {
        self.lock().active.insert(client_id, plan_id);
    }

    pub fn unsubscribe(&self, client_id: Uuid) {
        self.lock().active.remove(&client_id);
    }

    pub fn set_modules(&self, client_id: Uuid, modules: ModuleActivationMap) {
        self.lock().spaces.insert(client_id, modules);
    }

    /// Stored map, bypassing failure switches.
    pub fn stored_modules(&self, client_id: Uuid) -> Option<ModuleActivationMap> {
        self.lock().spaces.get(&client_id).cloned()
    }

    pub fn set_fail_lookup(&self, on: bool) {
        self.lock().fail_lookup = on;
    }

    pub fn set_fail_read(&self, on: bool) {
        self.lock().fail_read = on;
    }

    /// Make every sync call fail with a transport error.
    pub fn set_fail_sync(&self, on: bool) {
        self.lock().fail_sync = on;
    }

    /// Behave as a deployment where the sync RPC was never installed.
    pub fn set_drop_sync_rpc(&self, on: bool) {
        self.lock().drop_sync_rpc = on;
    }

    /// Number of sync calls that reached the store (successful or not).
    pub fn sync_calls(&self) -> u64 {
        self.lock().sync_calls
    }
}

#[async_trait]
impl SubscriptionLookup for MemoryBackend {
    async fn active_subscription(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Subscription>, BackendError> {
        let inner = self.lock();
        if inner.fail_lookup {
            return Err(BackendError::Transport(format!(
                "{}: connection reset",
                self.rpc.subscription
            )));
        }
        let Some(plan_id) = inner.active.get(&client_id).copied() else {
            return Ok(None);
        };
        let plan = inner.plans.get(&plan_id).cloned().unwrap_or(PlanRecord {
            name: None,
            features: None,
        });
        Ok(Some(Subscription {
            plan_id,
            plan_name: plan.name,
            features: plan.features,
        }))
    }
}

#[async_trait]
impl ModuleStore for MemoryBackend {
    async fn read_modules(&self, client_id: Uuid) -> Result<ModuleActivationMap, BackendError> {
        let inner = self.lock();
        if inner.fail_read {
            return Err(BackendError::Transport(format!(
                "{}: connection reset",
                self.rpc.read_modules
            )));
        }
        Ok(inner.spaces.get(&client_id).cloned().unwrap_or_default())
    }

    async fn sync_modules_from_plan(
        &self,
        client_id: Uuid,
        plan_id: Uuid,
    ) -> Result<ModuleActivationMap, BackendError> {
        let mut inner = self.lock();
        inner.sync_calls += 1;
        if inner.drop_sync_rpc {
            return Err(BackendError::RpcMissing {
                rpc: self.rpc.sync_modules.clone(),
            });
        }
        if inner.fail_sync {
            return Err(BackendError::Transport(format!(
                "{}: connection reset",
                self.rpc.sync_modules
            )));
        }
        let plan = inner
            .plans
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| BackendError::Api {
                status: 400,
                code: Some("P0002".to_string()),
                message: format!("plan {plan_id} not found"),
            })?;

        let prior = inner.spaces.get(&client_id).cloned().unwrap_or_default();
        let next = reconcile(
            &self.policy,
            plan.features.as_ref(),
            &prior,
            plan.name.as_deref(),
        );
        inner.spaces.insert(client_id, next.clone());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sync_is_idempotent() {
        let b = MemoryBackend::default();
        let client = Uuid::new_v4();
        let plan = Uuid::new_v4();
        b.insert_plan(plan, Some("Pro"), Some(FeatureSet::new().with("accounting", true)));
        b.set_modules(client, ModuleActivationMap::new().with("clients", true));

        let first = b.sync_modules_from_plan(client, plan).await.unwrap();
        let second = b.sync_modules_from_plan(client, plan).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_active("finance"));
        assert!(first.is_active("clients"));
        assert_eq!(b.sync_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_plan_is_api_error() {
        let b = MemoryBackend::default();
        let err = b
            .sync_modules_from_plan(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 400, .. }));
    }
}
