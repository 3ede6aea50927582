use std::collections::BTreeMap;

use crate::{
    ChangeSource, FeatureSet, ModuleActivationMap, ModuleChange, ModulePolicy, Outcome,
    ReconcileReport, SuppressedActivation,
};

/// Plan-derived overrides plus the evidence needed for the report.
struct Derivation {
    derived: ModuleActivationMap,
    sources: BTreeMap<String, ChangeSource>,
    suppressed: Vec<SuppressedActivation>,
    enterprise_override: bool,
}

fn derive(policy: &ModulePolicy, features: &FeatureSet, plan_name: Option<&str>) -> Derivation {
    let mut derived = ModuleActivationMap::new();
    let mut sources: BTreeMap<String, ChangeSource> = BTreeMap::new();
    let mut suppressed: Vec<SuppressedActivation> = Vec::new();

    for feature in features.active_keys() {
        let code = policy.feature_map.resolve(feature);
        if policy.is_reserved(code) {
            suppressed.push(SuppressedActivation {
                feature: feature.to_string(),
                code: code.to_string(),
            });
            continue;
        }
        derived.set(code, true);
        // First feature (key order) that drives a code is the recorded source.
        sources
            .entry(code.to_string())
            .or_insert_with(|| ChangeSource::Feature(feature.to_string()));
    }

    let enterprise_override = plan_name.map(|p| policy.is_enterprise(p)).unwrap_or(false);
    if enterprise_override {
        for code in policy.client_facing() {
            derived.set(code, true);
            sources.insert(code.to_string(), ChangeSource::EnterprisePlan);
        }
    }

    Derivation {
        derived,
        sources,
        suppressed,
        enterprise_override,
    }
}

/// Plan-derived overrides (steps 1-4), or `None` when there is no feature set.
///
/// The derived map only ever contains `true` values and never a reserved code.
pub fn derive_plan_modules(
    policy: &ModulePolicy,
    features: Option<&FeatureSet>,
    plan_name: Option<&str>,
) -> Option<ModuleActivationMap> {
    features.map(|fs| derive(policy, fs, plan_name).derived)
}

/// `base` overlaid by `derived`; derived values win on key collision.
pub fn merge_over(base: &ModuleActivationMap, derived: &ModuleActivationMap) -> ModuleActivationMap {
    let mut out = base.clone();
    for (code, active) in &derived.modules {
        out.modules.insert(code.clone(), *active);
    }
    out
}

/// Compute the authoritative activation map for one client.
///
/// - No feature set: the prior map is returned unchanged. A plan that failed to
///   load never turns modules off.
/// - Otherwise every active feature turns its mapped module on, an enterprise
///   plan turns every client-facing module on, and the result is the prior map
///   overlaid by those overrides. Modules the plan does not drive keep their
///   prior value.
/// - Reserved modules (`settings`) are never written by this function.
pub fn reconcile(
    policy: &ModulePolicy,
    features: Option<&FeatureSet>,
    prior: &ModuleActivationMap,
    plan_name: Option<&str>,
) -> ModuleActivationMap {
    match derive_plan_modules(policy, features, plan_name) {
        Some(derived) => merge_over(prior, &derived),
        None => prior.clone(),
    }
}

/// [`reconcile`] plus per-module change evidence.
///
/// `reconcile_with_report(..).result == reconcile(..)` for every input.
pub fn reconcile_with_report(
    policy: &ModulePolicy,
    features: Option<&FeatureSet>,
    prior: &ModuleActivationMap,
    plan_name: Option<&str>,
) -> ReconcileReport {
    let Some(features) = features else {
        return ReconcileReport::no_plan(prior);
    };

    let Derivation {
        derived,
        sources,
        mut suppressed,
        enterprise_override,
    } = derive(policy, features, plan_name);

    let result = merge_over(prior, &derived);

    let mut changes: Vec<ModuleChange> = Vec::new();
    for (code, after) in &derived.modules {
        let before = prior.get(code);
        if before == Some(*after) {
            continue;
        }
        let source = sources
            .get(code)
            .cloned()
            .unwrap_or(ChangeSource::EnterprisePlan);
        changes.push(ModuleChange {
            code: code.clone(),
            before,
            after: *after,
            source,
        });
    }

    changes.sort();
    suppressed.sort();

    let outcome = if changes.is_empty() {
        Outcome::Unchanged
    } else {
        Outcome::Changed
    };

    ReconcileReport {
        outcome,
        result,
        derived,
        enterprise_override,
        changes,
        suppressed,
    }
}

/// `true` when re-running [`reconcile`] over `map` with the same plan is a no-op.
///
/// Holds for every map produced by [`reconcile`]; write-back convergence relies on it.
pub fn is_fixed_point(
    policy: &ModulePolicy,
    features: Option<&FeatureSet>,
    map: &ModuleActivationMap,
    plan_name: Option<&str>,
) -> bool {
    reconcile(policy, features, map, plan_name) == *map
}
