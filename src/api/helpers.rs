use axum::body::Bytes;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{Document, ID_FIELD};

/// Parses a request body that must be a JSON object. An empty body is an empty object.
pub fn body_object(body: &Bytes) -> AppResult<Document> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::bad_params("request body must be a JSON object")),
        Err(e) => Err(AppError::bad_params(format!("malformed JSON body: {e}"))),
    }
}

pub fn required_str(obj: &Document, key: &str) -> AppResult<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_params(format!("missing {key}")))
}

pub fn parse_opt_string(v: Option<&Value>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

pub fn opt_string(obj: &Document, key: &str) -> AppResult<Option<String>> {
    parse_opt_string(obj.get(key)).map_err(|m| AppError::bad_params(format!("{key} {m}")))
}

pub fn parse_opt_bool(v: Option<&Value>) -> Result<Option<bool>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or("must be boolean"),
    }
}

/// Store-assigned ids are UUIDs; anything else is rejected before the store is touched.
pub fn parse_object_id(raw: &str) -> AppResult<String> {
    Uuid::parse_str(raw.trim())
        .map(|u| u.to_string())
        .map_err(|_| AppError::bad_params(format!("invalid id: {raw}")))
}

pub fn parse_task_id(raw: &str) -> AppResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::bad_params(format!("invalid task id: {raw}")))
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Drops client-supplied store ids so they cannot overwrite the assigned one.
pub fn without_id(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_is_empty_object() {
        assert!(body_object(&Bytes::from_static(b"  ")).unwrap().is_empty());
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(body_object(&Bytes::from_static(b"[1]")), Err(AppError::Validation(_))));
        assert!(matches!(body_object(&Bytes::from_static(b"{oops")), Err(AppError::Validation(_))));
    }

    #[test]
    fn required_str_trims_and_rejects_blank() {
        let obj = json!({ "a": "  x ", "b": "   ", "c": 3 });
        let obj = obj.as_object().unwrap();
        assert_eq!(required_str(obj, "a").unwrap(), "x");
        assert!(required_str(obj, "b").is_err());
        assert!(required_str(obj, "c").is_err());
        assert!(required_str(obj, "d").is_err());
    }

    #[test]
    fn object_ids_must_be_uuids() {
        assert!(parse_object_id("not-an-id").is_err());
        let id = uuid::Uuid::new_v4().to_string();
        assert_eq!(parse_object_id(&id).unwrap(), id);
    }
}
