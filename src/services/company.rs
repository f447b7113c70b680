//! Company profile service
//!
//! Setup attaches (or replaces) a full profile. Updates are merge-patches
//! applied on top of the stored profile and re-validated as a whole before
//! being written back.

use crate::db::repositories::CompanyRepository;
use crate::models::{Company, CompanyData, CompanyDataPatch, ValidationError};
use anyhow::Context;
use std::sync::Arc;

/// Error types for profile operations
#[derive(Debug, thiserror::Error)]
pub enum CompanyServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Company or profile missing
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CompanyService {
    company_repo: Arc<dyn CompanyRepository>,
}

impl CompanyService {
    pub fn new(company_repo: Arc<dyn CompanyRepository>) -> Self {
        Self { company_repo }
    }

    /// Validate and store a complete profile
    pub async fn setup(
        &self,
        company_id: i64,
        data: CompanyData,
    ) -> Result<CompanyData, CompanyServiceError> {
        data.validate()?;
        self.store(company_id, &data).await?;
        tracing::info!(company_id, "Company profile set up");
        Ok(data)
    }

    /// Merge `patch` into the stored profile.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the company has no profile yet
    /// - `Validation` if the patch is malformed or the merged profile is invalid
    pub async fn update_info(
        &self,
        company_id: i64,
        patch: CompanyDataPatch,
    ) -> Result<CompanyData, CompanyServiceError> {
        let base = self
            .get_company(company_id)
            .await?
            .company_data
            .ok_or_else(|| CompanyServiceError::NotFound("company profile".to_string()))?;

        let merged = patch.apply(&base)?;
        merged.validate()?;
        self.store(company_id, &merged).await?;
        tracing::debug!(company_id, "Company profile updated");
        Ok(merged)
    }

    /// Company with its profile, if any
    pub async fn get_company(&self, company_id: i64) -> Result<Company, CompanyServiceError> {
        self.company_repo
            .get_by_id(company_id)
            .await
            .context("Failed to get company")?
            .ok_or_else(|| CompanyServiceError::NotFound(format!("company {}", company_id)))
    }

    async fn store(&self, company_id: i64, data: &CompanyData) -> Result<(), CompanyServiceError> {
        let updated = self
            .company_repo
            .save_profile(company_id, data)
            .await
            .context("Failed to save company profile")?;
        if !updated {
            return Err(CompanyServiceError::NotFound(format!("company {}", company_id)));
        }
        Ok(())
    }
}
