use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::core::errors::ApiError;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(value)?)
        .build())
}

/// Turn the outcome of a domain operation into a response, keeping
/// `ApiError`s as client-facing statuses.
pub fn respond<T: Serialize>(status: u16, result: Result<T, ApiError>) -> anyhow::Result<Response> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(err) => Ok(err.into()),
    }
}

pub fn parse_body<T: DeserializeOwned>(req: &Request) -> Result<T, ApiError> {
    serde_json::from_slice(req.body())
        .map_err(|_| ApiError::BadRequest("Malformed payload".to_string()))
}

/// First path segment after `prefix`, without query string.
pub fn path_param<'a>(path: &'a str, prefix: &str) -> &'a str {
    let rest = path.trim_start_matches(prefix);
    let rest = rest.split('?').next().unwrap_or_default();
    rest.split('/').next().unwrap_or_default()
}
