//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod company;
pub mod photo;
pub mod session;

pub use company::{CompanyRepository, DuplicateEmail, SqlxCompanyRepository};
pub use photo::{PhotoRepository, SqlxPhotoRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
