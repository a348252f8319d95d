use crate::client::types::ApiResponse;
use crate::prelude::{Error, Result};
use reqwest::header::{ETAG, HeaderMap};
use serde_json::Value;

/// Extracts the entity version token from a read response.
///
/// v4 surfaces expose the token both as the `ETag` header and inside the
/// entity under `$reserved.ETag`; the header wins when both are present.
///
pub fn extract_etag(headers: &HeaderMap, body: &Value) -> Option<String> {
    let from_header = headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);
    if from_header.is_some() {
        return from_header;
    }

    ["/data/$reserved/ETag", "/$reserved/ETag"]
        .iter()
        .find_map(|pointer| body.pointer(pointer))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Returns the ETag of `response` or refuses to continue without one.
///
/// # Arguments
///
/// * `response`: Response of the read preceding a mutation.
/// * `entity`: Description of the entity, used in the error message.
///
pub fn require_etag(response: &ApiResponse, entity: &str) -> Result<String> {
    extract_etag(&response.headers, &response.body).ok_or_else(|| {
        Error::Protocol(format!(
            "no ETag returned for {}, refusing to mutate without concurrency protection",
            entity
        ))
    })
}
