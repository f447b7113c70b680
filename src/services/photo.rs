//! Company photo service
//!
//! Uploads are checked as a batch (type and size) before anything is
//! written. Each accepted photo gets a fresh UUID file name, is written to
//! photo storage, then recorded. Deletion only touches photos owned by the
//! requesting company.

use crate::config::UploadConfig;
use crate::db::repositories::PhotoRepository;
use crate::models::{CompanyPhoto, ValidationError, PUBLIC_PHOTO_PREFIX};
use crate::services::photo_storage::DynPhotoStorage;
use anyhow::Context;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PhotoServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// One uploaded file
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub content_type: String,
    pub data: Vec<u8>,
}

pub struct PhotoService {
    photo_repo: Arc<dyn PhotoRepository>,
    storage: DynPhotoStorage,
    config: UploadConfig,
}

impl PhotoService {
    pub fn new(
        photo_repo: Arc<dyn PhotoRepository>,
        storage: DynPhotoStorage,
        config: UploadConfig,
    ) -> Self {
        Self {
            photo_repo,
            storage,
            config,
        }
    }

    /// Store a batch of photos, returning their public URLs in upload order.
    ///
    /// Nothing is stored if any file fails validation.
    pub async fn upload(
        &self,
        company_id: i64,
        uploads: Vec<PhotoUpload>,
    ) -> Result<Vec<String>, PhotoServiceError> {
        if uploads.is_empty() {
            return Err(ValidationError::new("photos", "at least one photo is required").into());
        }
        for (i, upload) in uploads.iter().enumerate() {
            self.check(i, upload)?;
        }

        let mut urls = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let file_name = format!(
                "{}.{}",
                Uuid::new_v4(),
                self.config.get_extension(&upload.content_type)
            );
            let private_path = self.storage.save(&file_name, &upload.data).await?;

            let photo = CompanyPhoto::new(company_id, private_path, &file_name);
            let created = match self.photo_repo.create(&photo).await {
                Ok(created) => created,
                Err(e) => {
                    if let Err(cleanup) = self.storage.delete(&photo.private_path).await {
                        tracing::warn!("Failed to remove orphaned photo: {:#}", cleanup);
                    }
                    return Err(e.context("Failed to record photo").into());
                }
            };
            urls.push(created.public_path);
        }

        tracing::info!(company_id, count = urls.len(), "Photos uploaded");
        Ok(urls)
    }

    /// Public URLs of the company's photos, oldest first
    pub async fn list(&self, company_id: i64) -> Result<Vec<String>, PhotoServiceError> {
        let photos = self
            .photo_repo
            .list_by_company(company_id)
            .await
            .context("Failed to list photos")?;
        Ok(photos.into_iter().map(|p| p.public_path).collect())
    }

    /// Delete the company's photos among `public_urls`, returning how many
    /// were removed. URLs that are unknown or owned by another company are
    /// skipped.
    pub async fn delete(
        &self,
        company_id: i64,
        public_urls: &[String],
    ) -> Result<usize, PhotoServiceError> {
        let paths: Vec<String> = public_urls
            .iter()
            .filter_map(|url| public_path_of(url))
            .map(str::to_string)
            .collect();
        if paths.is_empty() {
            return Ok(0);
        }

        let photos = self
            .photo_repo
            .find_by_public_paths(company_id, &paths)
            .await
            .context("Failed to look up photos")?;

        let mut removed = 0;
        for photo in photos {
            if !self
                .photo_repo
                .delete(company_id, photo.id)
                .await
                .context("Failed to delete photo record")?
            {
                continue;
            }
            if let Err(e) = self.storage.delete(&photo.private_path).await {
                tracing::warn!(photo_id = photo.id, "Photo file not removed: {:#}", e);
            }
            removed += 1;
        }

        tracing::info!(company_id, removed, "Photos deleted");
        Ok(removed)
    }

    fn check(&self, index: usize, upload: &PhotoUpload) -> Result<(), ValidationError> {
        let path = format!("photos[{}]", index);
        if !self.config.is_type_allowed(&upload.content_type) {
            return Err(ValidationError::new(
                path,
                format!(
                    "unsupported type {}, allowed: {}",
                    upload.content_type,
                    self.config.allowed_types.join(", ")
                ),
            ));
        }
        if upload.data.is_empty() {
            return Err(ValidationError::new(path, "file is empty"));
        }
        if upload.data.len() as u64 > self.config.max_file_size {
            return Err(ValidationError::new(
                path,
                format!("file too large, maximum is {} bytes", self.config.max_file_size),
            ));
        }
        Ok(())
    }
}

/// `/photos/<name>` part of a URL, accepting both absolute URLs and bare paths.
fn public_path_of(url: &str) -> Option<&str> {
    url.find(PUBLIC_PHOTO_PREFIX).map(|i| &url[i..])
}
