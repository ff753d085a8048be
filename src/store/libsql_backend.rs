//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Applicant, Database, NewApplicant, UserId};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so that text comparison in SQL matches time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Read a nullable TEXT column.
fn opt_text_col(row: &libsql::Row, idx: i32) -> Result<Option<String>, libsql::Error> {
    match row.get_value(idx)? {
        libsql::Value::Text(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to an Applicant.
///
/// Column order matches APPLICANT_COLUMNS.
fn row_to_applicant(row: &libsql::Row) -> Result<Applicant, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("applicant row parse: {e}"));

    let birth_date_str: String = row.get(3).map_err(parse)?;
    let birth_date = NaiveDate::parse_from_str(&birth_date_str, "%Y-%m-%d").map_err(|e| {
        DatabaseError::Query(format!("invalid birth_date {birth_date_str:?}: {e}"))
    })?;
    let registration_str: String = row.get(4).map_err(parse)?;

    Ok(Applicant {
        id: row.get(0).map_err(parse)?,
        full_name: row.get(1).map_err(parse)?,
        city: row.get(2).map_err(parse)?,
        birth_date,
        registration_time: parse_datetime(&registration_str),
        interview_text: opt_text_col(row, 5).map_err(parse)?,
        video_path: opt_text_col(row, 6).map_err(parse)?,
        address: opt_text_col(row, 7).map_err(parse)?,
    })
}

fn is_constraint_violation(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE constraint") || msg.contains("PRIMARY KEY")
}

// ── Trait implementation ────────────────────────────────────────────

const APPLICANT_COLUMNS: &str =
    "id, full_name, city, birth_date, registration_time, interview_text, video_path, address";

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn insert_applicant(
        &self,
        applicant: &NewApplicant,
        registered_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO applicants (id, full_name, city, birth_date, registration_time) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    applicant.id,
                    applicant.full_name.as_str(),
                    applicant.city.as_str(),
                    applicant.birth_date.format("%Y-%m-%d").to_string(),
                    format_datetime(registered_at),
                ],
            )
            .await
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    DatabaseError::Constraint(format!("applicant {} already exists", applicant.id))
                } else {
                    DatabaseError::Query(format!("insert_applicant: {e}"))
                }
            })?;

        debug!(user_id = applicant.id, "Applicant inserted into DB");
        Ok(())
    }

    async fn get_applicant(&self, id: UserId) -> Result<Option<Applicant>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {APPLICANT_COLUMNS} FROM applicants WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_applicant: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_applicant(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_applicant: {e}"))),
        }
    }

    async fn complete_interview(
        &self,
        id: UserId,
        interview_text: &str,
        video_path: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE applicants SET interview_text = ?1, video_path = ?2 WHERE id = ?3",
                params![interview_text, opt_text(video_path), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_interview: {e}")))?;

        debug!(user_id = id, updated = count, "Interview stored");
        Ok(count > 0)
    }

    async fn set_address(&self, id: UserId, address: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE applicants SET address = ?1 WHERE id = ?2",
                params![address, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_address: {e}")))?;

        debug!(user_id = id, updated = count, "Address stored");
        Ok(count > 0)
    }

    async fn list_pending_interviews(
        &self,
        registered_before: DateTime<Utc>,
    ) -> Result<Vec<Applicant>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICANT_COLUMNS} FROM applicants \
                     WHERE interview_text IS NULL AND registration_time <= ?1 \
                     ORDER BY registration_time ASC"
                ),
                params![format_datetime(registered_before)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_pending_interviews: {e}")))?;

        let mut applicants = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => applicants.push(row_to_applicant(&row)?),
                Ok(None) => break,
                Err(e) => {
                    return Err(DatabaseError::Query(format!("list_pending_interviews: {e}")));
                }
            }
        }
        Ok(applicants)
    }
}
