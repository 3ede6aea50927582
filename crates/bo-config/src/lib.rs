//! bo-config
//!
//! Layered YAML configuration for the back-office services.
//!
//! - Documents are merged in order (base -> environment -> tenant overlay);
//!   later documents override earlier ones key by key.
//! - The merged tree is converted to JSON, serialized canonically and hashed
//!   (SHA-256) so logs can attribute behaviour to an exact config.
//! - Literal secrets are refused: config stores env var NAMES only
//!   (see [`secrets`]).
//! - Each binary declares which subtrees it reads; anything else is reported
//!   as unused ([`report_unused_keys`]).

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

/// Comma-separated list of YAML paths, in merge order.
pub const ENV_CONFIG_PATHS: &str = "BO_CONFIG";

/// Leaf string values starting with one of these are treated as leaked secrets
/// and abort loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "eyJ",        // JWT (backend anon / service-role keys)
    "sbp_",       // backend personal access token
];

// ---------------------------------------------------------------------------
// Modes + consumed-key registry
// ---------------------------------------------------------------------------

/// Which binary surface is consuming the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    /// bo-daemon HTTP surface.
    Serve,
    /// One-shot `bo modules sync` against the backend.
    Sync,
    /// `bo naf seed`.
    Seed,
    /// `bo docs ...`.
    Documents,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Serve => "SERVE",
            ConfigMode::Sync => "SYNC",
            ConfigMode::Seed => "SEED",
            ConfigMode::Documents => "DOCUMENTS",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SERVE" => Ok(ConfigMode::Serve),
            "SYNC" => Ok(ConfigMode::Sync),
            "SEED" => Ok(ConfigMode::Seed),
            "DOCUMENTS" => Ok(ConfigMode::Documents),
            other => bail!(
                "invalid config mode '{}'. expected one of: SERVE | SYNC | SEED | DOCUMENTS",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Consumed JSON-pointer prefixes (sorted, unique).
    pub consumed_prefixes: Vec<String>,
    /// Leaf pointers not covered by any consumed prefix (sorted).
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes each mode actually reads.
///
/// A prefix consumes itself and everything below it ("/backend" consumes
/// "/backend/rpc/sync" but not "/backend_old").
///
/// Reads, by consumer:
/// - bo-modules  `ModulePolicy::from_config_json`      /modules/*
/// - bo-backend  `BackendSettings::from_config_json`   /backend/*
/// - bo-config   `secrets::resolve_secrets_for_mode`   /backend/keys_env/api_key
/// - bo-runtime  `SyncSettings::from_config_json`      /sync/*
/// - bo-daemon   main                                  /daemon/addr
/// - bo-cli      naf seed                              /naf/table
/// - bo-docs     `DocumentSettings::from_config_json`  /documents/*
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Serve => &["/service", "/backend", "/modules", "/sync", "/daemon"],
        ConfigMode::Sync => &["/service", "/backend", "/modules", "/sync"],
        ConfigMode::Seed => &["/service", "/naf"],
        ConfigMode::Documents => &["/service", "/documents"],
    }
}

/// Unused-key report for `mode`.
///
/// `Warn` always returns the report; `Fail` errors with CONFIG_UNUSED_KEYS
/// when the report is not clean.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers_for_mode(mode)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed.iter().any(|c| pointer_covers(c, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes: consumed.into_iter().collect(),
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} unused config leaf key(s): {}",
            report.mode,
            report.unused_leaf_pointers.len(),
            preview(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// Leading "/" enforced, trailing "/" stripped (except the root pointer).
fn normalize_pointer(p: &str) -> String {
    let trimmed = p.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// `prefix` covers `leaf` on a whole-token boundary.
fn pointer_covers(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || prefix == leaf {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                let token = k.replace('~', "~0").replace('/', "~1");
                collect_leaf_pointers(child, &format!("{prefix}/{token}"), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_leaf_pointers(child, &format!("{prefix}/{i}"), out);
            }
        }
        _ if prefix.is_empty() => out.push("/".to_string()),
        _ => out.push(prefix.to_string()),
    }
}

fn preview(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Empty config (`{}`); every consumer falls back to its compiled defaults.
    pub fn defaults() -> Result<Self> {
        load_layered_yaml_from_strings(&[])
    }

    /// Non-blank string at `pointer`, trimmed.
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.config_json
            .pointer(pointer)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn bool_at(&self, pointer: &str) -> Option<bool> {
        self.config_json.pointer(pointer)?.as_bool()
    }

    pub fn u64_at(&self, pointer: &str) -> Option<u64> {
        self.config_json.pointer(pointer)?.as_u64()
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::with_capacity(paths.len());
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Load the paths listed in `BO_CONFIG`, or the defaults when it is unset.
pub fn load_from_env() -> Result<LoadedConfig> {
    match std::env::var(ENV_CONFIG_PATHS) {
        Ok(raw) if !raw.trim().is_empty() => {
            let paths: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            load_layered_yaml(&paths)
        }
        _ => LoadedConfig::defaults(),
    }
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let doc: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; it contributes nothing.
        if doc.is_null() {
            continue;
        }
        let doc = serde_json::to_value(doc).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, doc);
    }

    enforce_no_secret_literals(&merged)?;

    // serde_json::Map is a BTreeMap here (no preserve_order), so key order is
    // sorted and the serialization is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        let Some(s) = v.pointer(&ptr).and_then(Value::as_str) else {
            continue;
        };
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
