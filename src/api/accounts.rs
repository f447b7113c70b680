//! Account API endpoints
//!
//! - POST /api/v1/companies/register - Register a company
//! - POST /api/v1/companies/login - Log in
//! - POST /api/v1/companies/logout - Log out
//! - GET /api/v1/companies/me - Current company

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::common::{clear_session_cookie, json_body, session_cookie, Empty};
use crate::api::middleware::{ApiError, AppState, AuthenticatedCompany};
use crate::models::{CompanyData, Session};
use crate::services::Credentials;

/// Session as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            expires_at: session.expires_at,
        }
    }
}

/// Response for register and login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub session: SessionResponse,
    pub company_data: Option<CompanyData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub email: String,
    pub company_data: Option<CompanyData>,
}

/// Routes that need no session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// POST /api/v1/companies/register
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(payload)?;

    let (company, session) = state
        .account_service
        .register(input)
        .await
        .map_err(|e| state.error_handler.account(e))?;

    let headers = session_cookie(&session.id, state.session_max_age_secs);
    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            session: session.into(),
            company_data: company.company_data,
        }),
    ))
}

/// POST /api/v1/companies/login
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(payload)?;

    let (company, session) = state
        .account_service
        .login(input)
        .await
        .map_err(|e| state.error_handler.account(e))?;

    let headers = session_cookie(&session.id, state.session_max_age_secs);
    Ok((
        headers,
        Json(AuthResponse {
            session: session.into(),
            company_data: company.company_data,
        }),
    ))
}

/// POST /api/v1/companies/logout
async fn logout(
    State(state): State<AppState>,
    auth: AuthenticatedCompany,
) -> Result<impl IntoResponse, ApiError> {
    state
        .account_service
        .logout(&auth.token)
        .await
        .map_err(|e| state.error_handler.account(e))?;

    Ok((clear_session_cookie(), Json(Empty::default())))
}

/// GET /api/v1/companies/me
async fn me(auth: AuthenticatedCompany) -> Json<MeResponse> {
    Json(MeResponse {
        email: auth.company.email,
        company_data: auth.company.company_data,
    })
}
