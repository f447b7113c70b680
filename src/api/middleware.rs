//! API middleware
//!
//! Contains:
//! - Shared application state
//! - `ApiError`, the JSON error body every handler returns
//! - `ErrorHandler`, which turns service errors into `ApiError`s
//! - Session authentication

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, UploadConfig};
use crate::db::repositories::{SqlxCompanyRepository, SqlxPhotoRepository, SqlxSessionRepository};
use crate::db::DynDatabasePool;
use crate::models::{Company, ValidationError};
use crate::services::{
    AccountService, AccountServiceError, BusinessHoursEvaluator, CompanySearchService,
    CompanyService, CompanyServiceError, DynClock, LocalPhotoStorage, LoginRateLimiter,
    PhotoService, PhotoServiceError, SearchError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub account_service: Arc<AccountService>,
    pub company_service: Arc<CompanyService>,
    pub search_service: Arc<CompanySearchService>,
    pub photo_service: Arc<PhotoService>,
    pub upload_config: Arc<UploadConfig>,
    pub error_handler: ErrorHandler,
    /// Session cookie Max-Age, in seconds
    pub session_max_age_secs: i64,
}

impl AppState {
    /// Wire repositories and services from configuration
    pub fn new(config: &Config, pool: DynDatabasePool, clock: DynClock) -> anyhow::Result<Self> {
        let company_repo = SqlxCompanyRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let photo_repo = SqlxPhotoRepository::boxed(pool);

        let account_service = AccountService::new(
            company_repo.clone(),
            session_repo,
            Arc::new(LoginRateLimiter::new()),
        )
        .with_session_lifetime(config.session.lifetime_days);

        let evaluator = BusinessHoursEvaluator::new(config.search.tz()?);
        let search_service = CompanySearchService::new(company_repo.clone(), clock, evaluator)
            .with_timeout(config.search.timeout());

        let photo_service = PhotoService::new(
            photo_repo,
            LocalPhotoStorage::boxed(config.upload.path.clone()),
            config.upload.clone(),
        );

        Ok(Self {
            account_service: Arc::new(account_service),
            company_service: Arc::new(CompanyService::new(company_repo)),
            search_service: Arc::new(search_service),
            photo_service: Arc::new(photo_service),
            upload_config: Arc::new(config.upload.clone()),
            error_handler: ErrorHandler::new(),
            session_max_age_secs: config.session.lifetime_days.saturating_mul(24 * 60 * 60),
        })
    }
}

/// Company resolved from the request's session token
#[derive(Debug, Clone)]
pub struct AuthenticatedCompany {
    pub company: Company,
    pub token: String,
}

// ============================================================================
// Error body
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    /// Offending input field, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                path: None,
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        let mut error = Self::new(code, message);
        error.error.details = Some(details);
        error
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        let mut error = Self::validation_error(e.message);
        error.error.path = Some(e.path);
        error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

// ============================================================================
// Error handler
// ============================================================================

/// Maps service errors to API errors.
///
/// Expected failures become 4xx responses. Anything else is logged here and
/// answered with a generic 500 so storage details never reach the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler;

impl ErrorHandler {
    pub fn new() -> Self {
        Self
    }

    /// Log an unexpected failure and hide it behind `INTERNAL_ERROR`
    pub fn internal(&self, operation: &str, error: &anyhow::Error) -> ApiError {
        tracing::error!("{} failed: {:#}", operation, error);
        ApiError::internal_error("Internal server error")
    }

    pub fn account(&self, error: AccountServiceError) -> ApiError {
        match error {
            AccountServiceError::Validation(e) => e.into(),
            AccountServiceError::EmailTaken(_) => ApiError::conflict(error.to_string()),
            AccountServiceError::CompanyNotFound => ApiError::not_found(error.to_string()),
            AccountServiceError::InvalidCredentials
            | AccountServiceError::SessionExpired
            | AccountServiceError::SessionNotFound => ApiError::unauthorized(error.to_string()),
            AccountServiceError::RateLimited => ApiError::with_details(
                "RATE_LIMIT",
                error.to_string(),
                serde_json::json!({ "retryAfter": crate::services::rate_limiter::WINDOW_MINUTES * 60 }),
            ),
            AccountServiceError::InternalError(e) => self.internal("Account operation", &e),
        }
    }

    pub fn company(&self, error: CompanyServiceError) -> ApiError {
        match error {
            CompanyServiceError::Validation(e) => e.into(),
            CompanyServiceError::NotFound(_) => ApiError::not_found(error.to_string()),
            CompanyServiceError::InternalError(e) => self.internal("Company profile operation", &e),
        }
    }

    pub fn photo(&self, error: PhotoServiceError) -> ApiError {
        match error {
            PhotoServiceError::Validation(e) => e.into(),
            PhotoServiceError::InternalError(e) => self.internal("Photo operation", &e),
        }
    }

    pub fn search(&self, error: SearchError) -> ApiError {
        match error {
            SearchError::Validation(e) => e.into(),
            SearchError::Timeout(after) => {
                tracing::warn!("Search timed out after {:?}", after);
                ApiError::new("TIMEOUT", "Search took too long, try a smaller radius")
            }
            SearchError::Storage(e) => self.internal("Company search", &e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract session token from the `Authorization: Bearer` header or the
/// `session` cookie, in that order
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let company = state
        .account_service
        .validate_session(&token)
        .await
        .map_err(|e| state.error_handler.account(e))?;

    request
        .extensions_mut()
        .insert(AuthenticatedCompany { company, token });
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedCompany
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedCompany>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&map), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let map = headers(&[(header::COOKIE, "theme=dark; session=test-token-456")]);
        assert_eq!(extract_session_token(&map), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&map), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        let map = headers(&[(header::AUTHORIZATION, "Basic invalid")]);
        assert!(extract_session_token(&map).is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::new("RATE_LIMIT", "x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::new("TIMEOUT", "x").status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ApiError::internal_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_error_carries_path() {
        let error: ApiError = ValidationError::new("businessHours[2].endsAt", "too late").into();
        let body = serde_json::to_value(&error).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["path"], "businessHours[2].endsAt");
        assert_eq!(body["error"]["message"], "too late");
        assert!(body["error"].get("details").is_none());
    }

    #[test]
    fn test_error_handler_hides_internal_details() {
        let handler = ErrorHandler::new();
        let error = handler.search(SearchError::Storage(anyhow::anyhow!("disk I/O error at page 7")));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.error.message.contains("disk"));
    }

    #[test]
    fn test_error_handler_account_mapping() {
        let handler = ErrorHandler::new();
        assert_eq!(
            handler.account(AccountServiceError::EmailTaken("a@b.co".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            handler.account(AccountServiceError::CompanyNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            handler.account(AccountServiceError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            handler.account(AccountServiceError::SessionExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            handler.account(AccountServiceError::RateLimited).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let error = ErrorHandler::new().search(SearchError::Timeout(std::time::Duration::from_secs(5)));
        assert_eq!(error.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.error.code, "TIMEOUT");
    }
}
