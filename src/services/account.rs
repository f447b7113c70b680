//! Account service
//!
//! Company registration, login/logout and session management.
//! Emails are normalized (trimmed, lowercased) before every lookup so the
//! same address always maps to the same account.

use crate::db::repositories::{CompanyRepository, DuplicateEmail, SessionRepository};
use crate::models::{is_valid_email, normalize_email, Company, Session, ValidationError};
use crate::services::password::{hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 14;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Error types for account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Email already registered
    #[error("Email '{0}' is already registered")]
    EmailTaken(String),

    /// No company with this email
    #[error("No company registered with this email")]
    CompanyNotFound,

    /// Wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Too many failed logins
    #[error("Too many failed login attempts, try again later")]
    RateLimited,

    /// Session expired
    #[error("Session expired")]
    SessionExpired,

    /// Session not found
    #[error("Session not found")]
    SessionNotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Registration and login payload
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Account service
pub struct AccountService {
    company_repo: Arc<dyn CompanyRepository>,
    session_repo: Arc<dyn SessionRepository>,
    rate_limiter: Arc<LoginRateLimiter>,
    session_lifetime_days: i64,
}

impl AccountService {
    pub fn new(
        company_repo: Arc<dyn CompanyRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self {
            company_repo,
            session_repo,
            rate_limiter,
            session_lifetime_days: DEFAULT_SESSION_LIFETIME_DAYS,
        }
    }

    /// Override the session lifetime
    pub fn with_session_lifetime(mut self, days: i64) -> Self {
        self.session_lifetime_days = days;
        self
    }

    /// Register a company and open its first session.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed email or a short password
    /// - `EmailTaken` if the email is already registered
    /// - `InternalError` for database errors
    pub async fn register(
        &self,
        input: Credentials,
    ) -> Result<(Company, Session), AccountServiceError> {
        let email = normalize_email(&input.email);
        validate_credentials(&email, &input.password)?;

        if self
            .company_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AccountServiceError::EmailTaken(email));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        // A concurrent registration can still win between the lookup and the insert
        let company = match self
            .company_repo
            .create(&Company::new(email.clone(), password_hash))
            .await
        {
            Ok(company) => company,
            Err(e) if e.downcast_ref::<DuplicateEmail>().is_some() => {
                return Err(AccountServiceError::EmailTaken(email));
            }
            Err(e) => return Err(e.context("Failed to create company").into()),
        };

        let session = self.create_session(company.id).await?;
        tracing::info!(company_id = company.id, "Company registered");

        Ok((company, session))
    }

    /// Check credentials and open a new session.
    ///
    /// # Errors
    ///
    /// - `RateLimited` after too many recent failures for this email
    /// - `CompanyNotFound` for an unknown email
    /// - `InvalidCredentials` for a wrong password
    /// - `InternalError` for database errors
    pub async fn login(
        &self,
        input: Credentials,
    ) -> Result<(Company, Session), AccountServiceError> {
        let email = normalize_email(&input.email);

        if self.rate_limiter.is_limited(&email).await {
            tracing::warn!(email = %email, "Login refused, too many failed attempts");
            return Err(AccountServiceError::RateLimited);
        }

        let company = self
            .company_repo
            .get_by_email(&email)
            .await
            .context("Failed to get company by email")?
            .ok_or(AccountServiceError::CompanyNotFound)?;

        let password_valid = verify_password(&input.password, &company.password_hash)
            .context("Failed to verify password")?;

        if !password_valid {
            self.rate_limiter.record_failed_attempt(&email).await;
            tracing::warn!(company_id = company.id, "Login failed, wrong password");
            return Err(AccountServiceError::InvalidCredentials);
        }

        self.rate_limiter.clear_attempts(&email).await;
        let session = self.create_session(company.id).await?;
        tracing::debug!(company_id = company.id, "Company logged in");

        Ok((company, session))
    }

    /// Invalidate a session
    pub async fn logout(&self, token: &str) -> Result<(), AccountServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its company.
    ///
    /// An expired session is deleted on access.
    pub async fn validate_session(&self, token: &str) -> Result<Company, AccountServiceError> {
        let session = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
            .ok_or(AccountServiceError::SessionNotFound)?;

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Err(AccountServiceError::SessionExpired);
        }

        self.company_repo
            .get_by_id(session.company_id)
            .await
            .context("Failed to get company")?
            .ok_or(AccountServiceError::SessionNotFound)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, AccountServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    /// Drop stale login-failure records
    pub async fn cleanup_rate_limiter(&self) {
        self.rate_limiter.cleanup().await;
    }

    async fn create_session(&self, company_id: i64) -> Result<Session, AccountServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            company_id,
            expires_at: now + Duration::days(self.session_lifetime_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if !is_valid_email(email) {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}
