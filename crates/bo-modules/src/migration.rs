//! One-time rewrite of legacy stored module keys.
//!
//! Older clients stored variants such as `collaborateurs` or `hr` instead of
//! the canonical `collaborators`. Matching is exact against the alias table in
//! [`ModulePolicy::legacy_aliases`]; there is no case-folding or substring
//! matching.

use serde::{Deserialize, Serialize};

use crate::{ModuleActivationMap, ModuleCode, ModulePolicy};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyRename {
    pub from: String,
    pub to: String,
    pub value: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMigration {
    pub modules: ModuleActivationMap,
    pub renamed: Vec<KeyRename>,
    /// Keys that are neither canonical nor a known alias. Left in place.
    pub unrecognised: Vec<String>,
}

impl LegacyMigration {
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty()
    }
}

/// Rewrite alias keys to their canonical code.
///
/// When both the alias and the canonical key are present the canonical value
/// becomes `canonical || alias`, so a grant recorded under either spelling
/// survives. Applying the migration twice is a no-op.
pub fn migrate_legacy_keys(policy: &ModulePolicy, map: &ModuleActivationMap) -> LegacyMigration {
    let mut out = ModuleActivationMap::new();
    let mut renamed: Vec<KeyRename> = Vec::new();
    let mut unrecognised: Vec<String> = Vec::new();

    // Canonical keys first so alias folding sees their stored value.
    for (code, active) in &map.modules {
        if !policy.legacy_aliases.contains_key(code) {
            out.set(code.clone(), *active);
            if !ModuleCode::is_canonical(code) {
                unrecognised.push(code.clone());
            }
        }
    }

    for (legacy, active) in &map.modules {
        let Some(canonical) = policy.legacy_aliases.get(legacy) else {
            continue;
        };
        let merged = out.is_active(canonical) || *active;
        out.set(canonical.clone(), merged);
        renamed.push(KeyRename {
            from: legacy.clone(),
            to: canonical.clone(),
            value: *active,
        });
    }

    unrecognised.sort();
    renamed.sort();

    LegacyMigration {
        modules: out,
        renamed,
        unrecognised,
    }
}
