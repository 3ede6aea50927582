//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"BO_BACKEND_API_KEY"`).
//! - Binaries call [`resolve_secrets_for_mode`] once at startup and pass the
//!   result into constructors; no other code reads secret env vars.
//! - `Debug` output redacts values.
//! - Error messages name the env var, never its value.
//!
//! # Mode-aware enforcement
//! | Mode       | Required                 |
//! |------------|--------------------------|
//! | SERVE      | api key or database url  |
//! | SYNC       | api key or database url  |
//! | SEED       | nothing                  |
//! | DOCUMENTS  | nothing                  |
//!
//! The database URL is always optional: when present the Postgres adapter is
//! used instead of the REST RPC endpoint.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::ConfigMode;

pub const DEFAULT_API_KEY_VAR: &str = "BO_BACKEND_API_KEY";
pub const DEFAULT_DATABASE_URL_VAR: &str = "BO_DATABASE_URL";

/// Secrets resolved from the environment for one process.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Backend API key (sent as `apikey` + bearer token). `None` if unset/blank.
    pub backend_api_key: Option<String>,
    /// Postgres connection string. `None` if unset/blank.
    pub database_url: Option<String>,
    /// Name of the env var the API key was read from (safe to log).
    pub backend_api_key_var: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "backend_api_key",
                &self.backend_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .field("backend_api_key_var", &self.backend_api_key_var)
            .finish()
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve all secrets for `mode`.
///
/// # Errors
/// SECRETS_MISSING with the env var **name** when a required value is absent.
pub fn resolve_secrets_for_mode(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let api_key_var = read_str_at(config_json, "/backend/keys_env/api_key")
        .unwrap_or_else(|| DEFAULT_API_KEY_VAR.to_string());
    let database_url_var = read_str_at(config_json, "/backend/keys_env/database_url")
        .unwrap_or_else(|| DEFAULT_DATABASE_URL_VAR.to_string());

    let backend_api_key = resolve_env(&api_key_var);
    let database_url = resolve_env(&database_url_var);

    match mode {
        ConfigMode::Serve | ConfigMode::Sync => {
            // A database URL replaces the REST endpoint, and with it the key.
            if backend_api_key.is_none() && database_url.is_none() {
                bail!(
                    "SECRETS_MISSING mode={}: required env var '{}' \
                     (backend api key) is not set or empty, and no '{}' is configured",
                    mode.as_str(),
                    api_key_var,
                    database_url_var,
                );
            }
        }
        ConfigMode::Seed | ConfigMode::Documents => {}
    }

    Ok(ResolvedSecrets {
        backend_api_key,
        database_url,
        backend_api_key_var: api_key_var,
    })
}
