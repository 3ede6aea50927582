//! `bo modules ...` handlers.
//!
//! `reconcile` and `migrate` are offline: they run the engine over JSON given
//! on the command line. `sync` runs a full pass against the live backend.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bo_backend::{BackendSettings, RestBackend};
use bo_config::secrets::resolve_secrets_for_mode;
use bo_config::ConfigMode;
use bo_db::PgBackend;
use bo_modules::{
    migrate_legacy_keys, reconcile_with_report, FeatureSet, ModuleActivationMap, ModulePolicy,
};
use bo_runtime::{ModuleSync, SyncSettings};
use tracing::info;
use uuid::Uuid;

use super::{load_config, load_json_arg, print_json};

// ---------------------------------------------------------------------------
// modules reconcile
// ---------------------------------------------------------------------------

pub fn modules_reconcile(
    features: Option<String>,
    prior: Option<String>,
    plan: Option<String>,
    config_paths: Vec<String>,
) -> Result<()> {
    let loaded = load_config(&config_paths, ConfigMode::Sync)?;
    let policy = ModulePolicy::from_config_json(&loaded.config_json);

    let features = features
        .map(|raw| load_json_arg("--features", &raw))
        .transpose()?
        .and_then(|v| FeatureSet::from_plan_column(&v));
    let prior = match prior {
        Some(raw) => ModuleActivationMap::from_json(&load_json_arg("--prior", &raw)?),
        None => ModuleActivationMap::new(),
    };

    let report = reconcile_with_report(&policy, features.as_ref(), &prior, plan.as_deref());
    print_json(&report)
}

// ---------------------------------------------------------------------------
// modules migrate
// ---------------------------------------------------------------------------

pub fn modules_migrate(modules: String, config_paths: Vec<String>) -> Result<()> {
    let loaded = load_config(&config_paths, ConfigMode::Sync)?;
    let policy = ModulePolicy::from_config_json(&loaded.config_json);

    let map = ModuleActivationMap::from_json(&load_json_arg("--modules", &modules)?);
    let migration = migrate_legacy_keys(&policy, &map);
    print_json(&migration)
}

// ---------------------------------------------------------------------------
// modules sync
// ---------------------------------------------------------------------------

pub async fn modules_sync(client_id: String, config_paths: Vec<String>) -> Result<()> {
    let client_id = Uuid::parse_str(client_id.trim()).context("invalid client_id uuid")?;

    let loaded = load_config(&config_paths, ConfigMode::Sync)?;
    let secrets = resolve_secrets_for_mode(&loaded.config_json, ConfigMode::Sync)?;

    let policy = ModulePolicy::from_config_json(&loaded.config_json);
    let sync_settings = SyncSettings::from_config_json(&loaded.config_json);
    let backend_settings = BackendSettings::from_config_json(&loaded.config_json);

    let sync = match (&secrets.database_url, &secrets.backend_api_key) {
        (Some(url), _) => {
            info!("backend: postgres");
            let pool = bo_db::connect(url).await?;
            let backend = PgBackend::new(pool, backend_settings.rpc.clone())?;
            ModuleSync::with_backend(policy, Arc::new(backend), sync_settings)
        }
        (None, Some(key)) => {
            info!(base_url = ?backend_settings.base_url, "backend: rest");
            let backend = RestBackend::new(&backend_settings, key.clone())?;
            ModuleSync::with_backend(policy, Arc::new(backend), sync_settings)
        }
        (None, None) => return Err(anyhow!("no backend credentials resolved")),
    };

    let outcome = sync.load(client_id).await?;
    print_json(&outcome)
}
