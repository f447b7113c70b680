//! Geo-proximity filters
//!
//! `GeoQueryBuilder` turns a validated center and radius into a `GeoFilter`.
//! The filter exposes the longitude/latitude boxes a spatial index is probed
//! with and the exact great-circle distance used to refine the box hits.

use std::f64::consts::PI;

use crate::models::{CompanyData, Coordinates, ValidationError};

/// Mean earth radius in meters (IUGG)
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A company returned by the spatial index, with its distance to the center
#[derive(Debug, Clone, PartialEq)]
pub struct GeoCandidate {
    pub id: i64,
    pub data: CompanyData,
    /// Meters from the filter center
    pub distance: f64,
}

/// Axis-aligned box in degrees. `min_lon <= max_lon` always holds; circles
/// crossing the antimeridian are split into two boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn globe() -> Self {
        Self {
            min_lon: -180.0,
            max_lon: 180.0,
            min_lat: -90.0,
            max_lat: 90.0,
        }
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.longitude)
            && (self.min_lat..=self.max_lat).contains(&point.latitude)
    }
}

/// Circle query over companies, optionally restricted to completed profiles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFilter {
    pub center: Coordinates,
    pub radius_meters: f64,
    /// Skip companies that have not set up their profile
    pub profile_required: bool,
}

impl GeoFilter {
    /// Filter over searchable companies (profile completed).
    pub fn new(center: Coordinates, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
            profile_required: true,
        }
    }

    /// Boxes enclosing the search circle.
    ///
    /// One box in the common case, two when the circle crosses the
    /// antimeridian, a full longitude band when it reaches a pole and the
    /// whole globe when the radius covers half the circumference.
    pub fn bounding_boxes(&self) -> Vec<BoundingBox> {
        let angular = self.radius_meters / EARTH_RADIUS_METERS;
        if angular >= PI {
            return vec![BoundingBox::globe()];
        }

        let lat = self.center.latitude.to_radians();
        let lon = self.center.longitude.to_radians();
        let min_lat = lat - angular;
        let max_lat = lat + angular;

        if min_lat <= -PI / 2.0 || max_lat >= PI / 2.0 {
            return vec![BoundingBox {
                min_lon: -180.0,
                max_lon: 180.0,
                min_lat: min_lat.max(-PI / 2.0).to_degrees(),
                max_lat: max_lat.min(PI / 2.0).to_degrees(),
            }];
        }

        let delta_lon = (angular.sin() / lat.cos()).asin();
        let min_lon = lon - delta_lon;
        let max_lon = lon + delta_lon;
        let (min_lat, max_lat) = (min_lat.to_degrees(), max_lat.to_degrees());

        let band = |min_lon: f64, max_lon: f64| BoundingBox {
            min_lon: min_lon.to_degrees(),
            max_lon: max_lon.to_degrees(),
            min_lat,
            max_lat,
        };

        if min_lon < -PI {
            vec![band(min_lon + 2.0 * PI, PI), band(-PI, max_lon)]
        } else if max_lon > PI {
            vec![band(min_lon, PI), band(-PI, max_lon - 2.0 * PI)]
        } else {
            vec![band(min_lon, max_lon)]
        }
    }

    /// Distance from the center, if `point` lies inside the circle.
    pub fn distance_within(&self, point: &Coordinates) -> Option<f64> {
        let distance = haversine_distance(&self.center, point);
        (distance <= self.radius_meters).then_some(distance)
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Builds a `GeoFilter` from raw search input.
#[derive(Debug, Clone, Copy)]
pub struct GeoQueryBuilder {
    center: Coordinates,
    radius_meters: f64,
}

impl GeoQueryBuilder {
    pub fn new(center: Coordinates, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }

    /// Validate center and radius and produce the filter.
    pub fn build(self) -> Result<GeoFilter, ValidationError> {
        self.center.validate("aroundCoords")?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(ValidationError::new(
                "radiusInMeters",
                "must be a positive number",
            ));
        }
        Ok(GeoFilter::new(self.center, self.radius_meters))
    }
}

/// Point `meters` north of `origin` along its meridian. Used to place test data.
#[cfg(test)]
pub(crate) fn offset_north(origin: Coordinates, meters: f64) -> Coordinates {
    Coordinates::new(
        origin.longitude,
        origin.latitude + (meters / EARTH_RADIUS_METERS).to_degrees(),
    )
}
