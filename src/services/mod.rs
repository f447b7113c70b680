//! Services layer - Business logic
//!
//! Services own the business rules and coordinate repositories:
//! - Accounts, sessions and login throttling
//! - Company profile setup and merge-patch updates
//! - Photo upload and removal
//! - Proximity search (geo filter, open-now evaluation, aggregation)

pub mod account;
pub mod aggregator;
pub mod business_hours;
pub mod clock;
pub mod company;
pub mod company_search;
pub mod geo_query;
pub mod password;
pub mod photo;
pub mod photo_storage;
pub mod projector;
pub mod rate_limiter;

pub use account::{AccountService, AccountServiceError, Credentials};
pub use aggregator::{AggregateQuery, Aggregated, PaginatedAggregator, SortKey, SortOrder, PAGE_SIZE};
pub use business_hours::BusinessHoursEvaluator;
pub use clock::{Clock, DynClock, FixedClock, SystemClock};
pub use company::{CompanyService, CompanyServiceError};
pub use company_search::{CompanySearchService, FindCompaniesInput, SearchError, SearchResult};
pub use geo_query::{GeoCandidate, GeoFilter, GeoQueryBuilder};
pub use password::{hash_password, verify_password};
pub use photo::{PhotoService, PhotoServiceError, PhotoUpload};
pub use photo_storage::{DynPhotoStorage, LocalPhotoStorage, PhotoStorage};
pub use projector::{CompanyView, ResultProjector};
pub use rate_limiter::LoginRateLimiter;
