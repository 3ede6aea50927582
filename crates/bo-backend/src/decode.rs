//! Permissive decoding of RPC payloads.
//!
//! Shared by the REST and Postgres adapters. RPCs that return a single row
//! may be exposed as a scalar function (object / `null`) or as a set-returning
//! function (array with zero or one row); both shapes are accepted.

use bo_modules::{is_truthy, FeatureSet, ModuleActivationMap};
use serde_json::Value;
use uuid::Uuid;

use crate::{BackendError, Subscription};

/// Collapse a single-row result to its row (`None` for `null` / `[]`).
fn single_row(v: &Value) -> Result<Option<&Value>, BackendError> {
    match v {
        Value::Null => Ok(None),
        Value::Array(rows) => match rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(row).filter(|r| !r.is_null())),
            rows => Err(BackendError::Decode(format!(
                "expected at most one row, got {}",
                rows.len()
            ))),
        },
        row => Ok(Some(row)),
    }
}

/// Decode the `get_active_subscription` payload.
///
/// Row fields: `plan_id` (alias `id`), `plan_name` (alias `name`), `features`.
pub fn subscription_from_json(v: &Value) -> Result<Option<Subscription>, BackendError> {
    let Some(row) = single_row(v)? else {
        return Ok(None);
    };
    let obj = row
        .as_object()
        .ok_or_else(|| BackendError::Decode(format!("subscription row is not an object: {row}")))?;

    let raw_id = obj
        .get("plan_id")
        .or_else(|| obj.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Decode("subscription row has no plan_id".to_string()))?;
    let plan_id = Uuid::parse_str(raw_id)
        .map_err(|e| BackendError::Decode(format!("plan_id '{raw_id}': {e}")))?;

    let plan_name = obj
        .get("plan_name")
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let features = obj.get("features").and_then(FeatureSet::from_plan_column);

    Ok(Some(Subscription {
        plan_id,
        plan_name,
        features,
    }))
}

/// Decode a module map payload.
///
/// Accepts the map itself (`{"clients": true}`), `null`, a single row
/// wrapping it (`{"modules": {...}}`), or a set of
/// `{"module_code": .., "is_active": ..}` rows.
pub fn modules_from_json(v: &Value) -> Result<ModuleActivationMap, BackendError> {
    match v {
        Value::Null => Ok(ModuleActivationMap::new()),
        Value::Object(obj) => match obj.get("modules") {
            Some(inner) if obj.len() == 1 => Ok(ModuleActivationMap::from_json(inner)),
            _ => Ok(ModuleActivationMap::from_json(v)),
        },
        Value::Array(rows) => {
            let mut out = ModuleActivationMap::new();
            for row in rows {
                if let Some(code) = row.get("module_code").and_then(Value::as_str) {
                    let active = row.get("is_active").map(is_truthy).unwrap_or(false);
                    out.set(code, active);
                } else if rows.len() == 1 {
                    return modules_from_json(row);
                } else {
                    return Err(BackendError::Decode(format!("unexpected module row: {row}")));
                }
            }
            Ok(out)
        }
        other => Err(BackendError::Decode(format!(
            "module map must be an object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAN: &str = "6f1c2b8e-1d2a-4a7e-9d55-0b3f2c9a1e01";

    #[test]
    fn subscription_shapes() {
        let row = json!({"plan_id": PLAN, "plan_name": "Pro", "features": {"invoicing": true}});
        let a = subscription_from_json(&row).unwrap().unwrap();
        let b = subscription_from_json(&json!([row])).unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.plan_name.as_deref(), Some("Pro"));
        assert!(a.features.unwrap().features["invoicing"]);

        assert_eq!(subscription_from_json(&json!(null)).unwrap(), None);
        assert_eq!(subscription_from_json(&json!([])).unwrap(), None);
    }

    #[test]
    fn null_features_is_absent_not_empty() {
        let s = subscription_from_json(&json!({"id": PLAN, "name": "Basic", "features": null}))
            .unwrap()
            .unwrap();
        assert_eq!(s.features, None);
        let s = subscription_from_json(&json!({"id": PLAN, "features": {}}))
            .unwrap()
            .unwrap();
        assert_eq!(s.features, Some(FeatureSet::new()));
    }

    #[test]
    fn non_object_features_is_absent() {
        for bad in [json!("corrupted"), json!(["invoicing"]), json!(7), json!(false)] {
            let row = json!({"plan_id": PLAN, "plan_name": "Enterprise", "features": bad});
            let s = subscription_from_json(&row).unwrap().unwrap();
            assert_eq!(s.features, None, "features {bad}");
            assert_eq!(s.plan_name.as_deref(), Some("Enterprise"));
        }
    }

    #[test]
    fn bad_plan_id_is_decode_error() {
        let err = subscription_from_json(&json!({"plan_id": "nope"})).unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
        let err = subscription_from_json(&json!([{"plan_id": PLAN}, {"plan_id": PLAN}])).unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[test]
    fn module_shapes() {
        let expected = ModuleActivationMap::new()
            .with("clients", true)
            .with("finance", false);
        assert_eq!(
            modules_from_json(&json!({"clients": true, "finance": false})).unwrap(),
            expected
        );
        assert_eq!(
            modules_from_json(&json!({"modules": {"clients": true, "finance": false}})).unwrap(),
            expected
        );
        assert_eq!(
            modules_from_json(&json!([
                {"module_code": "clients", "is_active": true},
                {"module_code": "finance", "is_active": false}
            ]))
            .unwrap(),
            expected
        );
        assert!(modules_from_json(&json!(null)).unwrap().is_empty());
        assert!(modules_from_json(&json!("clients")).is_err());
    }
}
