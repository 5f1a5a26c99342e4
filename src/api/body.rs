use crate::api::error::ApiError;
use crate::state::Record;
use axum::http::{header, HeaderMap};
use serde_json::Value;

/// Decode an update body into the attributes to merge
///
/// Tries the body as JSON first. Form-encoded posts from browser clients
/// carry the JSON document as the first form key, so that is tried next.
pub fn decode_update(headers: &HeaderMap, body: &[u8]) -> Result<Record, ApiError> {
    let value = match serde_json::from_slice::<Value>(body) {
        Ok(value) => value,
        Err(_) if is_form(headers) => first_form_key(body)?,
        Err(e) => return Err(ApiError::InvalidBody(e.to_string())),
    };

    match value {
        Value::Object(attributes) => Ok(attributes),
        _ => Err(ApiError::InvalidBody(
            "expected a JSON object of attributes".to_string(),
        )),
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

fn first_form_key(body: &[u8]) -> Result<Value, ApiError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    let (key, _) = pairs
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::InvalidBody("empty form body".to_string()))?;

    serde_json::from_str(&key).map_err(|e| ApiError::InvalidBody(e.to_string()))
}
