//! bo-modules
//!
//! Module Reconciliation Engine.
//!
//! Given a subscription plan's feature entitlements and a client's stored
//! per-module activation map, computes the authoritative merged map:
//! - plan-derived activations override stored values
//! - modules the plan does not drive keep their stored value
//! - enterprise plans activate every client-facing module
//! - `settings` is never activated here
//!
//! Deterministic, pure logic. No IO. Persistence lives in bo-runtime.

mod engine;
mod migration;
mod policy;
mod types;

pub use engine::{derive_plan_modules, is_fixed_point, merge_over, reconcile, reconcile_with_report};
pub use migration::{migrate_legacy_keys, KeyRename, LegacyMigration};
pub use policy::{FeatureToModuleMap, ModulePolicy, DEFAULT_ENTERPRISE_PLANS};
pub use types::*;
