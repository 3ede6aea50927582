//! bo-db
//!
//! Postgres implementation of the backend collaborators.
//!
//! The three RPCs are installed in the database as SQL functions taking the
//! same argument record as the HTTP surface (`p_client_id`, `p_plan_id`).
//! Each call is `select to_jsonb(<rpc>(..))`, so a function may return a
//! jsonb document, a composite row or a set of rows; the payload is decoded
//! with the same rules as the REST adapter. Schema and function bodies are
//! owned by the hosted backend, not by this crate.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bo_backend::decode::{modules_from_json, subscription_from_json};
use bo_backend::{BackendError, ModuleStore, RpcNames, Subscription, SubscriptionLookup};
use bo_modules::ModuleActivationMap;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

pub const ENV_DB_URL: &str = "BO_DATABASE_URL";

/// SQLSTATE `undefined_function`.
const SQLSTATE_UNDEFINED_FUNCTION: &str = "42883";

/// Connect to Postgres using BO_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

// ---------------------------------------------------------------------------
// PgBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
    rpc: RpcNames,
}

impl PgBackend {
    /// Fails with `Config` when an RPC name is not a plain (optionally
    /// schema-qualified) SQL identifier; names are spliced into the query.
    pub fn new(pool: PgPool, rpc: RpcNames) -> Result<Self, BackendError> {
        for name in [&rpc.subscription, &rpc.read_modules, &rpc.sync_modules] {
            if !is_sql_identifier(name) {
                return Err(BackendError::Config(format!(
                    "rpc name '{name}' is not a valid SQL function name"
                )));
            }
        }
        Ok(Self { pool, rpc })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn call(
        &self,
        rpc: &str,
        client_id: Uuid,
        plan_id: Option<Uuid>,
    ) -> Result<Value, BackendError> {
        let rows: Vec<(Option<Value>,)> = match plan_id {
            None => {
                let sql = format!("select to_jsonb({rpc}(p_client_id => $1)) as payload");
                sqlx::query_as(&sql)
                    .bind(client_id)
                    .fetch_all(&self.pool)
                    .await
            }
            Some(plan_id) => {
                let sql = format!(
                    "select to_jsonb({rpc}(p_client_id => $1, p_plan_id => $2)) as payload"
                );
                sqlx::query_as(&sql)
                    .bind(client_id)
                    .bind(plan_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error(rpc, e))?;

        let mut payloads: Vec<Value> = rows.into_iter().filter_map(|(v,)| v).collect();
        Ok(match payloads.len() {
            0 => Value::Null,
            1 => payloads.remove(0),
            _ => Value::Array(payloads),
        })
    }
}

#[async_trait]
impl SubscriptionLookup for PgBackend {
    async fn active_subscription(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Subscription>, BackendError> {
        let payload = self.call(&self.rpc.subscription, client_id, None).await?;
        subscription_from_json(&payload)
    }
}

#[async_trait]
impl ModuleStore for PgBackend {
    async fn read_modules(&self, client_id: Uuid) -> Result<ModuleActivationMap, BackendError> {
        let payload = self.call(&self.rpc.read_modules, client_id, None).await?;
        modules_from_json(&payload)
    }

    async fn sync_modules_from_plan(
        &self,
        client_id: Uuid,
        plan_id: Uuid,
    ) -> Result<ModuleActivationMap, BackendError> {
        let payload = self
            .call(&self.rpc.sync_modules, client_id, Some(plan_id))
            .await?;
        modules_from_json(&payload)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_sql_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|p| {
            let mut chars = p.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn map_sqlx_error(rpc: &str, err: sqlx::Error) -> BackendError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string());
            if code.as_deref() == Some(SQLSTATE_UNDEFINED_FUNCTION) {
                return BackendError::RpcMissing {
                    rpc: rpc.to_string(),
                };
            }
            BackendError::Api {
                status: 500,
                code,
                message: db.message().to_string(),
            }
        }
        decode @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
            BackendError::Decode(format!("{rpc}: {decode}"))
        }
        other => BackendError::Transport(format!("{rpc}: {other}")),
    }
}
