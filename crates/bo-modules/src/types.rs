use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical client-facing module codes.
///
/// Stored activation maps are keyed by [`ModuleCode::as_str`]. Parsing is exact
/// and case-sensitive; legacy spellings are rewritten once by
/// [`crate::migrate_legacy_keys`], never matched at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCode {
    Dashboard,
    Company,
    Clients,
    Invoicing,
    Finance,
    Messages,
    Automation,
    Settings,
    Documents,
    Projects,
    Collaborators,
}

impl ModuleCode {
    pub const ALL: [ModuleCode; 11] = [
        ModuleCode::Dashboard,
        ModuleCode::Company,
        ModuleCode::Clients,
        ModuleCode::Invoicing,
        ModuleCode::Finance,
        ModuleCode::Messages,
        ModuleCode::Automation,
        ModuleCode::Settings,
        ModuleCode::Documents,
        ModuleCode::Projects,
        ModuleCode::Collaborators,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleCode::Dashboard => "dashboard",
            ModuleCode::Company => "company",
            ModuleCode::Clients => "clients",
            ModuleCode::Invoicing => "invoicing",
            ModuleCode::Finance => "finance",
            ModuleCode::Messages => "messages",
            ModuleCode::Automation => "automation",
            ModuleCode::Settings => "settings",
            ModuleCode::Documents => "documents",
            ModuleCode::Projects => "projects",
            ModuleCode::Collaborators => "collaborators",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ModuleCode::ALL.into_iter().find(|m| m.as_str() == s)
    }

    pub fn is_canonical(s: &str) -> bool {
        Self::parse(s).is_some()
    }
}

impl std::fmt::Display for ModuleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loose truthiness for values coming out of JSON columns.
///
/// `true`, non-zero numbers and the strings `"true"` / `"1"` count as active.
/// Everything else (false, null, objects, arrays, other strings) does not.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "true" | "1"),
        _ => false,
    }
}

fn bool_map_from_json(v: &Value) -> BTreeMap<String, bool> {
    match v {
        Value::Object(map) => map
            .iter()
            .map(|(k, vv)| (k.clone(), is_truthy(vv)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

// ---------------------------------------------------------------------------
// FeatureSet
// ---------------------------------------------------------------------------

/// Plan entitlements: feature key (plan vocabulary) -> entitled.
///
/// Owned by the subscription/plan record; never mutated during a pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    pub features: BTreeMap<String, bool>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permissive decode of a plan `features` JSON column.
    ///
    /// Non-object input decodes to an empty set; non-boolean values go through
    /// [`is_truthy`]. Unknown keys are kept (identity fallback applies later).
    pub fn from_json(v: &Value) -> Self {
        Self {
            features: bool_map_from_json(v),
        }
    }

    /// Decode a stored plan `features` column.
    ///
    /// Only an object yields a feature set. `null`, a scalar or an array is a
    /// missing/corrupt column and reads as "no feature set", so reconciliation
    /// leaves the prior map as it was.
    pub fn from_plan_column(v: &Value) -> Option<Self> {
        v.is_object().then(|| Self::from_json(v))
    }

    pub fn with(mut self, key: impl Into<String>, active: bool) -> Self {
        self.features.insert(key.into(), active);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Active feature keys in key order.
    pub fn active_keys(&self) -> impl Iterator<Item = &str> {
        self.features
            .iter()
            .filter(|(_, on)| **on)
            .map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = (K, bool)>>(iter: T) -> Self {
        Self {
            features: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ModuleActivationMap
// ---------------------------------------------------------------------------

/// Per-client module activation map stored on the member space.
///
/// Keys are module codes; an absent key reads as `false`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleActivationMap {
    pub modules: BTreeMap<String, bool>,
}

impl ModuleActivationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permissive decode of a stored `modules` JSON column (`null` -> empty).
    pub fn from_json(v: &Value) -> Self {
        Self {
            modules: bool_map_from_json(v),
        }
    }

    pub fn with(mut self, code: impl Into<String>, active: bool) -> Self {
        self.modules.insert(code.into(), active);
        self
    }

    pub fn set(&mut self, code: impl Into<String>, active: bool) {
        self.modules.insert(code.into(), active);
    }

    pub fn get(&self, code: &str) -> Option<bool> {
        self.modules.get(code).copied()
    }

    pub fn is_active(&self, code: &str) -> bool {
        self.get(code).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Sorted list of active module codes (what the editing surface renders as "on").
    pub fn enabled(&self) -> Vec<String> {
        self.modules
            .iter()
            .filter(|(_, on)| **on)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.modules).unwrap_or(Value::Null)
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for ModuleActivationMap {
    fn from_iter<T: IntoIterator<Item = (K, bool)>>(iter: T) -> Self {
        Self {
            modules: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why a module ended up `true` in the derived map.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "feature", rename_all = "snake_case")]
pub enum ChangeSource {
    /// Driven by an active feature key.
    Feature(String),
    /// Forced by an enterprise plan name.
    EnterprisePlan,
}

/// One module whose value differs between the prior map and the result.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleChange {
    pub code: String,
    /// `None` when the key was absent from the prior map.
    pub before: Option<bool>,
    pub after: bool,
    pub source: ChangeSource,
}

/// An activation the plan asked for but the reserved-module rule dropped.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuppressedActivation {
    pub feature: String,
    pub code: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// No feature set was available; prior map returned as-is.
    NoPlan,
    /// Plan evaluated; nothing differed from the prior map.
    Unchanged,
    /// Plan evaluated; at least one module changed.
    Changed,
}

/// Full reconciliation result. `result` is what callers render and persist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub outcome: Outcome,
    pub result: ModuleActivationMap,
    /// Plan-derived overrides (empty when `outcome == NoPlan`).
    pub derived: ModuleActivationMap,
    pub enterprise_override: bool,
    pub changes: Vec<ModuleChange>,
    pub suppressed: Vec<SuppressedActivation>,
}

impl ReconcileReport {
    pub fn no_plan(prior: &ModuleActivationMap) -> Self {
        Self {
            outcome: Outcome::NoPlan,
            result: prior.clone(),
            derived: ModuleActivationMap::new(),
            enterprise_override: false,
            changes: Vec::new(),
            suppressed: Vec::new(),
        }
    }

    pub fn is_changed(&self) -> bool {
        self.outcome == Outcome::Changed
    }
}
