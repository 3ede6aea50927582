//! Static configuration of the reconciliation engine.
//!
//! Defaults are compiled in; deployments may override any part under the
//! `/modules` config subtree (see [`ModulePolicy::from_config_json`]).

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::ModuleCode;

/// Plan names that grant every client-facing module. Case-sensitive.
pub const DEFAULT_ENTERPRISE_PLANS: &[&str] = &["Enterprise", "Entreprise"];

/// Feature key -> module code, plan vocabulary to client vocabulary.
const DEFAULT_FEATURE_MAP: &[(&str, &str)] = &[
    ("dashboard", "dashboard"),
    ("invoicing", "invoicing"),
    ("clients", "clients"),
    ("accounting", "finance"),
    ("payroll", "collaborators"),
    ("automations", "automation"),
    ("administration", "settings"),
];

/// Stored key variants written by older clients, mapped to their canonical code.
const DEFAULT_LEGACY_ALIASES: &[(&str, &str)] = &[
    ("collaborateurs", "collaborators"),
    ("collaborator", "collaborators"),
    ("Collaborators", "collaborators"),
    ("hr", "collaborators"),
    ("rh", "collaborators"),
    ("automations", "automation"),
    ("factures", "invoicing"),
    ("facturation", "invoicing"),
    ("entreprise", "company"),
];

// ---------------------------------------------------------------------------
// FeatureToModuleMap
// ---------------------------------------------------------------------------

/// Many-to-one mapping from feature key to module code.
///
/// A feature key without an entry resolves to itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureToModuleMap {
    entries: BTreeMap<String, String>,
}

impl Default for FeatureToModuleMap {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_FEATURE_MAP.iter().copied())
    }
}

impl FeatureToModuleMap {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, feature: impl Into<String>, module: impl Into<String>) {
        self.entries.insert(feature.into(), module.into());
    }

    /// Module code driven by `feature` (identity fallback).
    pub fn resolve<'a>(&'a self, feature: &'a str) -> &'a str {
        self.entries
            .get(feature)
            .map(String::as_str)
            .unwrap_or(feature)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

// ---------------------------------------------------------------------------
// ModulePolicy
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModulePolicy {
    pub feature_map: FeatureToModuleMap,
    pub enterprise_plans: BTreeSet<String>,
    /// Codes this engine never activates (granted out-of-band only).
    pub reserved: BTreeSet<String>,
    pub legacy_aliases: BTreeMap<String, String>,
}

impl Default for ModulePolicy {
    fn default() -> Self {
        Self {
            feature_map: FeatureToModuleMap::default(),
            enterprise_plans: DEFAULT_ENTERPRISE_PLANS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reserved: [ModuleCode::Settings.as_str().to_string()]
                .into_iter()
                .collect(),
            legacy_aliases: DEFAULT_LEGACY_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl ModulePolicy {
    pub fn with_feature_map(mut self, feature_map: FeatureToModuleMap) -> Self {
        self.feature_map = feature_map;
        self
    }

    pub fn is_enterprise(&self, plan_name: &str) -> bool {
        self.enterprise_plans.contains(plan_name)
    }

    pub fn is_reserved(&self, code: &str) -> bool {
        self.reserved.contains(code)
    }

    /// Canonical codes an enterprise plan forces on.
    pub fn client_facing(&self) -> impl Iterator<Item = &'static str> + '_ {
        ModuleCode::ALL
            .into_iter()
            .map(|m| m.as_str())
            .filter(move |code| !self.is_reserved(code))
    }

    /// Build a policy from the merged config JSON.
    ///
    /// Reads (all optional):
    /// - `/modules/feature_map`      object, merged over the default mapping
    /// - `/modules/enterprise_plans` array of strings, replaces the default
    /// - `/modules/legacy_aliases`   object, merged over the default aliases
    ///
    /// `settings` stays reserved whatever the config says; no key can lift it.
    pub fn from_config_json(config: &Value) -> Self {
        let mut policy = Self::default();

        if let Some(map) = config
            .pointer("/modules/feature_map")
            .and_then(Value::as_object)
        {
            for (feature, module) in map {
                if let Some(module) = module.as_str() {
                    policy.feature_map.insert(feature.clone(), module.trim());
                }
            }
        }

        if let Some(plans) = config
            .pointer("/modules/enterprise_plans")
            .and_then(Value::as_array)
        {
            policy.enterprise_plans = plans
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        if let Some(map) = config
            .pointer("/modules/legacy_aliases")
            .and_then(Value::as_object)
        {
            for (legacy, canonical) in map {
                if let Some(canonical) = canonical.as_str() {
                    policy
                        .legacy_aliases
                        .insert(legacy.clone(), canonical.trim().to_string());
                }
            }
        }

        policy
    }
}
