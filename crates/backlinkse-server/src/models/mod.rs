//! Typed documents and the JSON plumbing shared by every create/patch path.

pub mod account;
pub mod activity;
pub mod content;
pub mod dates;
pub mod site;
pub mod user;
pub mod work;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::store::new_id;

pub use account::{PaymentMethod, Subscription, TeamMember};
pub use activity::Activity;
pub use user::{Principal, Role, User};
pub use work::{Order, Project, Report, SupportTicket};

/// Keys a request body can never set directly.
const PROTECTED: &[&str] = &["_id", "createdAt", "updatedAt", "userId"];

/// Invariants serde cannot express (ranges, lengths).
pub trait Validate {
    fn validate(&self) -> ApiResult<()> {
        Ok(())
    }
}

/// `^\S+@\S+\.\S+$`
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

fn object(body: Value) -> ApiResult<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::validation("Request body must be a JSON object")),
    }
}

/// Build a new document from a request body (or seed entry).
///
/// Protected keys are dropped, a fresh id and timestamps are assigned, and
/// `extra` is applied last so callers can pin owner fields.
pub fn build<D>(body: Value, now: DateTime<Utc>, extra: &[(&str, Value)]) -> ApiResult<D>
where
    D: DeserializeOwned + Validate,
{
    let mut map = object(body)?;
    for key in PROTECTED {
        map.remove(*key);
    }
    map.insert("_id".into(), Value::String(new_id()));
    map.insert("createdAt".into(), serde_json::json!(now));
    map.insert("updatedAt".into(), serde_json::json!(now));
    for (key, value) in extra {
        map.insert((*key).to_owned(), value.clone());
    }
    let doc: D = serde_json::from_value(Value::Object(map))
        .map_err(|e| ApiError::invalid_fields(e.to_string()))?;
    doc.validate()?;
    Ok(doc)
}

/// Apply a shallow JSON merge patch to `doc`. Keys in `PROTECTED` and in
/// `also_ignore` are skipped; `updatedAt` is stamped.
pub fn merge<D>(doc: &D, patch: &Value, now: DateTime<Utc>, also_ignore: &[&str]) -> ApiResult<D>
where
    D: Serialize + DeserializeOwned + Validate,
{
    let Value::Object(patch) = patch else {
        return Err(ApiError::validation("Request body must be a JSON object"));
    };
    let current = serde_json::to_value(doc).map_err(|e| ApiError::Internal(e.into()))?;
    let mut map = object(current)?;
    for (key, value) in patch {
        if PROTECTED.contains(&key.as_str()) || also_ignore.contains(&key.as_str()) {
            continue;
        }
        map.insert(key.clone(), value.clone());
    }
    map.insert("updatedAt".into(), serde_json::json!(now));
    let updated: D = serde_json::from_value(Value::Object(map))
        .map_err(|e| ApiError::invalid_fields(e.to_string()))?;
    updated.validate()?;
    Ok(updated)
}

/// Parse an embedded JSON array of seed entries into documents.
pub fn seed<D>(raw: &str, now: DateTime<Utc>) -> anyhow::Result<Vec<D>>
where
    D: DeserializeOwned + Validate,
{
    let entries: Vec<Value> = serde_json::from_str(raw)?;
    entries
        .into_iter()
        .map(|entry| build(entry, now, &[]).map_err(anyhow::Error::from))
        .collect()
}

/// Set `key` on a JSON object body unless the client already supplied it.
pub fn default_field(body: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = body {
        let missing = map.get(key).map_or(true, Value::is_null);
        if missing {
            map.insert(key.to_owned(), value);
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Widget {
        #[serde(rename = "_id")]
        id: String,
        name: String,
        #[serde(default)]
        size: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl Validate for Widget {
        fn validate(&self) -> ApiResult<()> {
            if self.size > 10 {
                return Err(ApiError::validation("size too large"));
            }
            Ok(())
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("jo@x.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("jo@x"));
        assert!(!is_valid_email("jo x@y.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("jo@x."));
    }

    #[test]
    fn build_ignores_client_ids_and_timestamps() {
        let now = Utc::now();
        let w: Widget = build(
            json!({"_id": "mine", "name": "a", "createdAt": "1999-01-01T00:00:00Z"}),
            now,
            &[],
        )
        .unwrap();
        assert_ne!(w.id, "mine");
        assert_eq!(w.created_at, now);
        assert_eq!(w.size, 0);
    }

    #[test]
    fn build_reports_type_mismatch_as_validation() {
        let err = build::<Widget>(json!({"name": 5}), Utc::now(), &[]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Validation Error");
    }

    #[test]
    fn merge_applies_fields_and_runs_validation() {
        let now = Utc::now();
        let w: Widget = build(json!({"name": "a"}), now, &[]).unwrap();
        let later = now + chrono::Duration::seconds(5);
        let patched = merge(&w, &json!({"size": 3, "_id": "x"}), later, &[]).unwrap();
        assert_eq!(patched.size, 3);
        assert_eq!(patched.id, w.id);
        assert_eq!(patched.updated_at, later);

        assert!(merge(&w, &json!({"size": 11}), later, &[]).is_err());
        assert!(merge(&w, &json!([1, 2]), later, &[]).is_err());
    }
}
