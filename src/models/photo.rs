//! Company photo model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public URL prefix photos are served under
pub const PUBLIC_PHOTO_PREFIX: &str = "/photos/";

/// A stored photo owned by a company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyPhoto {
    pub id: i64,
    pub company_id: i64,
    /// Location in photo storage
    #[serde(skip_serializing)]
    pub private_path: String,
    /// URL path clients fetch the photo from
    pub public_path: String,
    pub created_at: DateTime<Utc>,
}

impl CompanyPhoto {
    pub fn new(company_id: i64, private_path: String, file_name: &str) -> Self {
        Self {
            id: 0, // Will be set by the database
            company_id,
            private_path,
            public_path: format!("{}{}", PUBLIC_PHOTO_PREFIX, file_name),
            created_at: Utc::now(),
        }
    }
}
