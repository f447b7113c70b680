//! Public shape of search results

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{BusinessHours, Coordinates};
use crate::services::business_hours::BusinessHoursEvaluator;
use crate::services::geo_query::GeoCandidate;

/// A company as returned by search. Carries no id, credentials or storage paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyView {
    pub name: String,
    pub description: String,
    pub phone_number: String,
    pub email: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub address_coords: Coordinates,
    pub business_hours: Vec<BusinessHours>,
    pub is_open_now: bool,
    /// Meters from the search center
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultProjector {
    evaluator: BusinessHoursEvaluator,
}

impl ResultProjector {
    pub fn new(evaluator: BusinessHoursEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn project(&self, candidate: GeoCandidate, now: DateTime<Utc>) -> CompanyView {
        let data = candidate.data;
        let is_open_now = self.evaluator.is_open_at(&data.business_hours, now);
        CompanyView {
            name: data.name,
            description: data.description,
            phone_number: data.phone_number,
            email: data.email,
            address_line1: data.address_line1,
            address_line2: data.address_line2,
            city: data.city,
            state: data.state,
            country: data.country,
            address_coords: data.address_coords,
            business_hours: data.business_hours,
            is_open_now,
            distance: candidate.distance,
        }
    }
}
