//! Common API utilities and shared types

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderMap, HeaderValue},
    Json,
};
use serde::Serialize;

use crate::api::middleware::ApiError;

/// Body of endpoints that answer `{}`
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

/// Unwrap a JSON body, turning axum's rejection into a 400 `ApiError`
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation_error(rejection.body_text()))
}

/// Same as `json_body` for query strings
pub fn query_params<T>(
    query: Result<axum::extract::Query<T>, QueryRejection>,
) -> Result<T, ApiError> {
    query
        .map(|axum::extract::Query(params)| params)
        .map_err(|rejection| ApiError::validation_error(rejection.body_text()))
}

/// `Set-Cookie` header carrying the session token
pub fn session_cookie(token: &str, max_age_secs: i64) -> HeaderMap {
    set_cookie(format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age_secs
    ))
}

/// `Set-Cookie` header that removes the session cookie
pub fn clear_session_cookie() -> HeaderMap {
    set_cookie("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0".to_string())
}

fn set_cookie(value: String) -> HeaderMap {
    let mut headers = HeaderMap::new();
    // Tokens are UUIDs, so the value is always a valid header
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(header::SET_COOKIE, value);
    }
    headers
}
