use serde_json::Value;

pub const DEFAULT_RPC_SUBSCRIPTION: &str = "get_active_subscription";
pub const DEFAULT_RPC_READ_MODULES: &str = "get_member_space_modules";
pub const DEFAULT_RPC_SYNC_MODULES: &str = "sync_modules_from_plan";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Names of the backend RPCs. Deployments may rename them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcNames {
    pub subscription: String,
    pub read_modules: String,
    pub sync_modules: String,
}

impl Default for RpcNames {
    fn default() -> Self {
        Self {
            subscription: DEFAULT_RPC_SUBSCRIPTION.to_string(),
            read_modules: DEFAULT_RPC_READ_MODULES.to_string(),
            sync_modules: DEFAULT_RPC_SYNC_MODULES.to_string(),
        }
    }
}

/// Non-secret backend settings. The API key is resolved separately
/// (`bo_config::secrets`) and handed to [`crate::RestBackend::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub base_url: Option<String>,
    pub rpc: RpcNames,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            rpc: RpcNames::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendSettings {
    /// Reads (all optional):
    /// - `/backend/url`
    /// - `/backend/timeout_secs`
    /// - `/backend/rpc/{subscription,read_modules,sync_modules}`
    pub fn from_config_json(config: &Value) -> Self {
        let str_at = |p: &str| {
            config
                .pointer(p)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let mut s = Self::default();
        s.base_url = str_at("/backend/url");
        if let Some(t) = config.pointer("/backend/timeout_secs").and_then(Value::as_u64) {
            s.timeout_secs = t.max(1);
        }
        if let Some(n) = str_at("/backend/rpc/subscription") {
            s.rpc.subscription = n;
        }
        if let Some(n) = str_at("/backend/rpc/read_modules") {
            s.rpc.read_modules = n;
        }
        if let Some(n) = str_at("/backend/rpc/sync_modules") {
            s.rpc.sync_modules = n;
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_when_subtree_missing() {
        assert_eq!(BackendSettings::from_config_json(&json!({})), BackendSettings::default());
    }

    #[test]
    fn overrides_are_read() {
        let s = BackendSettings::from_config_json(&json!({
            "backend": {
                "url": " https://backend.internal ",
                "timeout_secs": 0,
                "rpc": { "sync_modules": "sync_modules_from_plan_v2" }
            }
        }));
        assert_eq!(s.base_url.as_deref(), Some("https://backend.internal"));
        assert_eq!(s.timeout_secs, 1);
        assert_eq!(s.rpc.sync_modules, "sync_modules_from_plan_v2");
        assert_eq!(s.rpc.subscription, DEFAULT_RPC_SUBSCRIPTION);
    }
}
