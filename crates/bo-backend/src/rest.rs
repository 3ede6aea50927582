//! RPC-over-HTTP backend.
//!
//! Every call is `POST {base_url}/rest/v1/rpc/{name}` with a JSON argument
//! record and `apikey` + bearer headers. The API key is passed in by the
//! caller; it is never logged.

use std::time::Duration;

use async_trait::async_trait;
use bo_modules::ModuleActivationMap;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::decode::{modules_from_json, subscription_from_json};
use crate::{BackendError, BackendSettings, ModuleStore, RpcNames, Subscription, SubscriptionLookup};

/// Error code the REST layer returns when a function is not in its schema cache.
const PGRST_FUNCTION_NOT_FOUND: &str = "PGRST202";

#[derive(Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    rpc: RpcNames,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"<REDACTED>")
            .field("rpc", &self.rpc)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl RestBackend {
    pub fn new(settings: &BackendSettings, api_key: String) -> Result<Self, BackendError> {
        let base_url = settings
            .base_url
            .clone()
            .ok_or_else(|| BackendError::Config("backend url (/backend/url) is not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(BackendError::Config("backend api key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url,
            api_key,
            rpc: settings.rpc.clone(),
        })
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url.trim_end_matches('/'), name)
    }

    /// Invoke one RPC and return its decoded JSON body (`null` for an empty body).
    pub async fn call(&self, rpc: &str, args: Value) -> Result<Value, BackendError> {
        let resp = self
            .http
            .post(self.rpc_url(rpc))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&args)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("{rpc}: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("{rpc}: body read failed: {e}")))?;

        if !status.is_success() {
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            if status.as_u16() == 404 || body.code.as_deref() == Some(PGRST_FUNCTION_NOT_FOUND) {
                return Err(BackendError::RpcMissing {
                    rpc: rpc.to_string(),
                });
            }
            let message = match (body.message, body.details) {
                (Some(m), Some(d)) => format!("{m} ({d})"),
                (Some(m), None) => m,
                (None, _) => text.chars().take(200).collect(),
            };
            return Err(BackendError::Api {
                status: status.as_u16(),
                code: body.code,
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| BackendError::Decode(format!("{rpc}: response json decode failed: {e}")))
    }
}

#[async_trait]
impl SubscriptionLookup for RestBackend {
    async fn active_subscription(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Subscription>, BackendError> {
        let body = self
            .call(&self.rpc.subscription, json!({ "p_client_id": client_id }))
            .await?;
        subscription_from_json(&body)
    }
}

#[async_trait]
impl ModuleStore for RestBackend {
    async fn read_modules(&self, client_id: Uuid) -> Result<ModuleActivationMap, BackendError> {
        let body = self
            .call(&self.rpc.read_modules, json!({ "p_client_id": client_id }))
            .await?;
        modules_from_json(&body)
    }

    async fn sync_modules_from_plan(
        &self,
        client_id: Uuid,
        plan_id: Uuid,
    ) -> Result<ModuleActivationMap, BackendError> {
        let body = self
            .call(
                &self.rpc.sync_modules,
                json!({ "p_client_id": client_id, "p_plan_id": plan_id }),
            )
            .await?;
        modules_from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_url_and_key() {
        let err = RestBackend::new(&BackendSettings::default(), "k".to_string()).unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));

        let settings = BackendSettings {
            base_url: Some("https://backend.internal/".to_string()),
            ..BackendSettings::default()
        };
        let err = RestBackend::new(&settings, "  ".to_string()).unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));

        let b = RestBackend::new(&settings, "secret-key".to_string()).unwrap();
        assert_eq!(
            b.rpc_url("get_active_subscription"),
            "https://backend.internal/rest/v1/rpc/get_active_subscription"
        );
        assert!(!format!("{b:?}").contains("secret-key"));
    }
}
