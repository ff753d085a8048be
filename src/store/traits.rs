//! `Database` trait: single async interface for applicant persistence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::DatabaseError;

/// Telegram user id. Doubles as the applicant primary key.
pub type UserId = i64;

/// A persisted applicant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applicant {
    pub id: UserId,
    pub full_name: String,
    pub city: String,
    pub birth_date: NaiveDate,
    pub registration_time: DateTime<Utc>,
    /// Interview summary. Present once the interview is confirmed.
    pub interview_text: Option<String>,
    pub video_path: Option<String>,
    pub address: Option<String>,
}

impl Applicant {
    pub fn interview_completed(&self) -> bool {
        self.interview_text.is_some()
    }
}

/// Fields collected by the identity survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplicant {
    pub id: UserId,
    pub full_name: String,
    pub city: String,
    pub birth_date: NaiveDate,
}

/// Backend-agnostic database trait covering applicant records.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Insert a new applicant registered at `registered_at`.
    ///
    /// Fails with [`DatabaseError::Constraint`] if a record with the same id
    /// already exists.
    async fn insert_applicant(
        &self,
        applicant: &NewApplicant,
        registered_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Get an applicant by user id.
    async fn get_applicant(&self, id: UserId) -> Result<Option<Applicant>, DatabaseError>;

    /// Whether a record exists for this user id.
    async fn applicant_exists(&self, id: UserId) -> Result<bool, DatabaseError> {
        Ok(self.get_applicant(id).await?.is_some())
    }

    /// Store the confirmed interview summary and verification video.
    /// Returns `false` if no record exists for `id`.
    async fn complete_interview(
        &self,
        id: UserId,
        interview_text: &str,
        video_path: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    /// Store the confirmed delivery address.
    /// Returns `false` if no record exists for `id`.
    async fn set_address(&self, id: UserId, address: &str) -> Result<bool, DatabaseError>;

    /// Records without an interview registered at or before `registered_before`,
    /// oldest first.
    async fn list_pending_interviews(
        &self,
        registered_before: DateTime<Utc>,
    ) -> Result<Vec<Applicant>, DatabaseError>;
}
