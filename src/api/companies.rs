//! Company profile and search endpoints
//!
//! - POST /api/v1/companies/setup - Attach a full profile
//! - PATCH /api/v1/companies/info - Merge-patch the profile
//! - GET /api/v1/companies - Proximity search

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::common::{json_body, query_params, Empty};
use crate::api::middleware::{ApiError, AppState, AuthenticatedCompany};
use crate::models::{CompanyData, CompanyDataPatch};
use crate::services::{FindCompaniesInput, SearchResult};

/// Public search route
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(find_companies))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/setup", post(setup))
        .route("/info", patch(update_info))
}

/// GET /api/v1/companies?aroundCoords=lon,lat&radiusInMeters=..&page=..&sortBy=..&sortOrder=..&mustBeOpen=..
async fn find_companies(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<SearchResult>, ApiError> {
    let pairs = query_params(query)?;
    let input = FindCompaniesInput::from_query_pairs(&pairs)?;

    let result = state
        .search_service
        .find_companies(input)
        .await
        .map_err(|e| state.error_handler.search(e))?;

    Ok(Json(result))
}

/// POST /api/v1/companies/setup
async fn setup(
    State(state): State<AppState>,
    auth: AuthenticatedCompany,
    payload: Result<Json<CompanyData>, JsonRejection>,
) -> Result<Json<Empty>, ApiError> {
    let data = json_body(payload)?;

    state
        .company_service
        .setup(auth.company.id, data)
        .await
        .map_err(|e| state.error_handler.company(e))?;

    Ok(Json(Empty::default()))
}

/// PATCH /api/v1/companies/info
async fn update_info(
    State(state): State<AppState>,
    auth: AuthenticatedCompany,
    payload: Result<Json<CompanyDataPatch>, JsonRejection>,
) -> Result<Json<Empty>, ApiError> {
    let patch = json_body(payload)?;

    state
        .company_service
        .update_info(auth.company.id, patch)
        .await
        .map_err(|e| state.error_handler.company(e))?;

    Ok(Json(Empty::default()))
}
