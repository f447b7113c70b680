//! Company proximity search
//!
//! Entry point for `GET /companies`. Raw query parameters are parsed into a
//! `FindCompaniesInput`, then the search runs:
//! geo filter -> repository `find_near` -> aggregation -> projection.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::db::repositories::CompanyRepository;
use crate::models::{Coordinates, ValidationError};
use crate::services::aggregator::{AggregateQuery, PaginatedAggregator, SortKey, SortOrder};
use crate::services::business_hours::BusinessHoursEvaluator;
use crate::services::clock::DynClock;
use crate::services::geo_query::{GeoFilter, GeoQueryBuilder};
use crate::services::projector::{CompanyView, ResultProjector};

/// Default bound on a single search
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Error types for company search
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Invalid query parameter
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The search did not finish in time
    #[error("Search timed out after {0:?}")]
    Timeout(Duration),

    /// Store failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Validated search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FindCompaniesInput {
    pub around_coords: Coordinates,
    pub radius_in_meters: f64,
    /// 1-based
    pub page: u32,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub must_be_open: bool,
}

impl FindCompaniesInput {
    /// Parse query-string pairs.
    ///
    /// `aroundCoords` may be given once as `lon,lat` or `[lon,lat]`, or twice
    /// (`aroundCoords=lon&aroundCoords=lat`). `mustBeOpen` defaults to false;
    /// every other parameter is required.
    pub fn from_query_pairs(pairs: &[(String, String)]) -> Result<Self, ValidationError> {
        let around_coords = parse_coords(&query_values(pairs, "aroundCoords"))?;

        let radius_in_meters: f64 = single_value(pairs, "radiusInMeters")?
            .trim()
            .parse()
            .map_err(|_| ValidationError::new("radiusInMeters", "must be a number"))?;

        let page: u32 = single_value(pairs, "page")?
            .trim()
            .parse()
            .map_err(|_| ValidationError::new("page", "must be a positive integer"))?;

        let sort_by: SortKey = single_value(pairs, "sortBy")?.parse()?;
        let sort_order: SortOrder = single_value(pairs, "sortOrder")?.parse()?;

        let must_be_open = match query_values(pairs, "mustBeOpen").as_slice() {
            [] => false,
            [value] => parse_bool(*value)
                .ok_or_else(|| ValidationError::new("mustBeOpen", "must be a boolean"))?,
            _ => return Err(ValidationError::new("mustBeOpen", "must be given once")),
        };

        Ok(Self {
            around_coords,
            radius_in_meters,
            page,
            sort_by,
            sort_order,
            must_be_open,
        })
    }
}

fn query_values<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

fn single_value<'a>(pairs: &'a [(String, String)], key: &str) -> Result<&'a str, ValidationError> {
    match query_values(pairs, key).as_slice() {
        [] => Err(ValidationError::new(key, "is required")),
        [value] => Ok(*value),
        _ => Err(ValidationError::new(key, "must be given once")),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_coords(values: &[&str]) -> Result<Coordinates, ValidationError> {
    let invalid = || ValidationError::new("aroundCoords", "must be a [longitude, latitude] pair");
    let number = |s: &str| s.trim().parse::<f64>().map_err(|_| invalid());

    match values {
        [] => Err(ValidationError::new("aroundCoords", "is required")),
        [pair] => {
            let inner = pair.trim();
            let inner = inner
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .unwrap_or(inner);
            match inner.split(',').collect::<Vec<_>>().as_slice() {
                [lon, lat] => Ok(Coordinates::new(number(*lon)?, number(*lat)?)),
                _ => Err(invalid()),
            }
        }
        [lon, lat] => Ok(Coordinates::new(number(*lon)?, number(*lat)?)),
        _ => Err(invalid()),
    }
}

/// Page of search results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub companies: Vec<CompanyView>,
    pub count: usize,
}

/// Company search service
pub struct CompanySearchService {
    company_repo: Arc<dyn CompanyRepository>,
    clock: DynClock,
    evaluator: BusinessHoursEvaluator,
    aggregator: PaginatedAggregator,
    timeout: Duration,
}

impl CompanySearchService {
    pub fn new(
        company_repo: Arc<dyn CompanyRepository>,
        clock: DynClock,
        evaluator: BusinessHoursEvaluator,
    ) -> Self {
        Self {
            company_repo,
            clock,
            evaluator,
            aggregator: PaginatedAggregator::new(),
            timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    /// Override the per-search time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Find companies around a point.
    ///
    /// # Errors
    ///
    /// - `Validation` for bad coordinates, radius or page
    /// - `Timeout` if the search exceeds the configured limit
    /// - `Storage` for database errors
    pub async fn find_companies(
        &self,
        input: FindCompaniesInput,
    ) -> Result<SearchResult, SearchError> {
        let filter = GeoQueryBuilder::new(input.around_coords, input.radius_in_meters).build()?;
        if input.page < 1 {
            return Err(ValidationError::new("page", "must be at least 1").into());
        }

        tracing::debug!(
            lon = input.around_coords.longitude,
            lat = input.around_coords.latitude,
            radius = input.radius_in_meters,
            page = input.page,
            sort_by = %input.sort_by,
            sort_order = %input.sort_order,
            must_be_open = input.must_be_open,
            "Searching companies"
        );

        tokio::time::timeout(self.timeout, self.run(filter, &input))
            .await
            .map_err(|_| {
                tracing::warn!("Company search exceeded {:?}", self.timeout);
                SearchError::Timeout(self.timeout)
            })?
    }

    async fn run(
        &self,
        filter: GeoFilter,
        input: &FindCompaniesInput,
    ) -> Result<SearchResult, SearchError> {
        let candidates = self.company_repo.find_near(&filter).await?;

        let now = self.clock.now();
        let query = AggregateQuery::new(
            input.sort_by,
            input.sort_order,
            input.page,
            input.must_be_open,
        );
        let page = self.aggregator.aggregate(candidates, &query, |c| {
            self.evaluator.is_open_at(&c.data.business_hours, now)
        });

        let projector = ResultProjector::new(self.evaluator);
        let companies = page
            .items
            .into_iter()
            .map(|candidate| projector.project(candidate, now))
            .collect();

        Ok(SearchResult {
            companies,
            count: page.total_count,
        })
    }
}

#[cfg(test)]
mod tests;
