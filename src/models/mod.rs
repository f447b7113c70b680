//! Data models
//!
//! Data structures shared by the database, service and API layers:
//! - Database entities (Company, CompanyPhoto, Session)
//! - Profile payloads and merge-patches
//! - Validation errors

mod company;
mod photo;
mod session;
mod validation;

pub use company::{
    BusinessHours, BusinessHoursPatch, Company, CompanyData, CompanyDataPatch, Coordinates,
    DAYS_PER_WEEK, MINUTES_PER_DAY,
};
pub use photo::{CompanyPhoto, PUBLIC_PHOTO_PREFIX};
pub use session::Session;
pub use validation::{is_valid_email, normalize_email, require_non_empty, ValidationError};

#[cfg(test)]
pub(crate) use company::fixtures;
