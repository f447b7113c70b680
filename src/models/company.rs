//! Company model
//!
//! A company is created with login credentials only. Its public profile
//! (`CompanyData`) is attached later through setup and then edited with
//! merge-patches (`CompanyDataPatch`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::validation::{is_valid_email, require_non_empty, ValidationError};

/// Minutes in a day; the exclusive upper bound of a business-hours window.
pub const MINUTES_PER_DAY: i32 = 1440;

/// Number of weekday slots in a schedule (Monday = 0 ... Sunday = 6).
pub const DAYS_PER_WEEK: usize = 7;

/// Company entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// Store-assigned identifier
    pub id: i64,
    /// Login email (normalized)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Public profile, absent until setup
    pub company_data: Option<CompanyData>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Create a company with credentials only.
    ///
    /// The password must already be hashed.
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            email,
            password_hash,
            company_data: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A point on the globe, serialized as `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Both components finite, longitude in [-180, 180], latitude in [-90, 90].
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if !self.longitude.is_finite() || !self.latitude.is_finite() {
            return Err(ValidationError::new(path, "coordinates must be finite numbers"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::new(
                path,
                "longitude must be between -180 and 180",
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::new(
                path,
                "latitude must be between -90 and 90",
            ));
        }
        Ok(())
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from([longitude, latitude]: [f64; 2]) -> Self {
        Self::new(longitude, latitude)
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.longitude, c.latitude]
    }
}

/// Opening window for one weekday, in minutes since local midnight.
///
/// `startsAt == endsAt` is closed all day; `{0, 1440}` is open all day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessHours {
    pub starts_at: i32,
    pub ends_at: i32,
}

impl BusinessHours {
    pub fn new(starts_at: i32, ends_at: i32) -> Self {
        Self { starts_at, ends_at }
    }

    pub fn closed() -> Self {
        Self::new(0, 0)
    }

    pub fn all_day() -> Self {
        Self::new(0, MINUTES_PER_DAY)
    }

    fn validate(&self, path: &str) -> Result<(), ValidationError> {
        for (field, value) in [("startsAt", self.starts_at), ("endsAt", self.ends_at)] {
            if !(0..=MINUTES_PER_DAY).contains(&value) {
                return Err(ValidationError::new(
                    format!("{}.{}", path, field),
                    format!("must be between 0 and {}", MINUTES_PER_DAY),
                ));
            }
        }
        if self.ends_at < self.starts_at {
            return Err(ValidationError::new(
                format!("{}.endsAt", path),
                "must not be earlier than startsAt",
            ));
        }
        Ok(())
    }
}

/// Public company profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyData {
    pub name: String,
    pub description: String,
    pub phone_number: String,
    /// Public contact email, independent from the login email
    pub email: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub address_coords: Coordinates,
    /// Seven windows, Monday first
    pub business_hours: Vec<BusinessHours>,
}

impl CompanyData {
    /// Full validation of a profile before it is stored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("description", &self.description)?;
        require_non_empty("phoneNumber", &self.phone_number)?;
        require_non_empty("email", &self.email)?;
        if !is_valid_email(self.email.trim()) {
            return Err(ValidationError::new("email", "invalid email format"));
        }
        require_non_empty("addressLine1", &self.address_line1)?;
        require_non_empty("city", &self.city)?;
        require_non_empty("state", &self.state)?;
        require_non_empty("country", &self.country)?;
        self.address_coords.validate("addressCoords")?;

        if self.business_hours.len() != DAYS_PER_WEEK {
            return Err(ValidationError::new(
                "businessHours",
                format!("must contain exactly {} entries", DAYS_PER_WEEK),
            ));
        }
        for (day, hours) in self.business_hours.iter().enumerate() {
            hours.validate(&format!("businessHours[{}]", day))?;
        }
        Ok(())
    }
}

/// Partial update for one weekday; absent fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessHoursPatch {
    pub starts_at: Option<i32>,
    pub ends_at: Option<i32>,
}

/// Merge-patch for `CompanyData`.
///
/// Absent fields keep the stored value. `addressLine2: null` clears the
/// second address line. `businessHours` must list all seven days; a `null`
/// slot keeps that day unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDataPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub address_line1: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub address_line2: Option<Option<String>>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub address_coords: Option<Coordinates>,
    pub business_hours: Option<Vec<Option<BusinessHoursPatch>>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key (`None`).
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl CompanyDataPatch {
    /// Apply the patch on top of `base`, returning the merged profile.
    ///
    /// The result is not validated here; callers validate the merged value.
    pub fn apply(&self, base: &CompanyData) -> Result<CompanyData, ValidationError> {
        let mut merged = base.clone();

        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(description) = &self.description {
            merged.description = description.clone();
        }
        if let Some(phone_number) = &self.phone_number {
            merged.phone_number = phone_number.clone();
        }
        if let Some(email) = &self.email {
            merged.email = email.clone();
        }
        if let Some(line1) = &self.address_line1 {
            merged.address_line1 = line1.clone();
        }
        if let Some(line2) = &self.address_line2 {
            merged.address_line2 = line2.clone();
        }
        if let Some(city) = &self.city {
            merged.city = city.clone();
        }
        if let Some(state) = &self.state {
            merged.state = state.clone();
        }
        if let Some(country) = &self.country {
            merged.country = country.clone();
        }
        if let Some(coords) = self.address_coords {
            merged.address_coords = coords;
        }

        if let Some(days) = &self.business_hours {
            if days.len() != DAYS_PER_WEEK {
                return Err(ValidationError::new(
                    "businessHours",
                    format!("must contain exactly {} entries", DAYS_PER_WEEK),
                ));
            }
            if merged.business_hours.len() != DAYS_PER_WEEK {
                merged.business_hours = vec![BusinessHours::closed(); DAYS_PER_WEEK];
            }
            for (slot, patch) in merged.business_hours.iter_mut().zip(days) {
                if let Some(patch) = patch {
                    if let Some(starts_at) = patch.starts_at {
                        slot.starts_at = starts_at;
                    }
                    if let Some(ends_at) = patch.ends_at {
                        slot.ends_at = ends_at;
                    }
                }
            }
        }

        Ok(merged)
    }
}
