//! services/timeline_api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `NoteStore` and `PatientStore` ports from the core crate. It reads the
//! clinic's PostgreSQL tables using `sqlx`.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use medical_timeline_core::{
    NoteId, NoteRecord, NoteStore, NoteType, PatientId, PatientStore, PortError, PortResult,
    Reference,
};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use tracing::debug;

/// Store timestamps are rendered the way the record store serialises them.
const STORE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const READ_NOTES_SQL: &str = r#"
    SELECT n.id,
           n.name,
           n.date,
           n.patient_id,
           p.name AS patient_name,
           n.booking_id,
           b.name AS booking_name,
           n.author_id,
           u.name AS author_name,
           n.note_type,
           n.subjective,
           n.objective,
           n.assessment,
           n.plan,
           n.content,
           n.is_important,
           n.is_private,
           (SELECT COUNT(*) FROM vet_medical_note_attachment_rel r WHERE r.note_id = n.id)
               AS attachment_count
      FROM vet_medical_note n
      LEFT JOIN vet_patient p ON p.id = n.patient_id
      LEFT JOIN resource_booking b ON b.id = n.booking_id
      LEFT JOIN res_users u ON u.id = n.author_id
     WHERE n.id = ANY($1)
"#;

const READ_OWNER_SQL: &str = r#"
    SELECT pt.owner_id, o.name AS owner_name
      FROM vet_patient pt
      LEFT JOIN vet_owner o ON o.id = pt.owner_id
     WHERE pt.id = $1
"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn map_sqlx_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn reference(id: Option<i64>, label: Option<String>) -> Reference {
    match id {
        Some(id) => Reference::Labeled(id, label.unwrap_or_default()),
        None => Reference::Absent,
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct NoteRow {
    id: i64,
    name: Option<String>,
    date: Option<NaiveDateTime>,
    patient_id: Option<i64>,
    patient_name: Option<String>,
    booking_id: Option<i64>,
    booking_name: Option<String>,
    author_id: Option<i64>,
    author_name: Option<String>,
    note_type: String,
    subjective: Option<String>,
    objective: Option<String>,
    assessment: Option<String>,
    plan: Option<String>,
    content: Option<String>,
    is_important: bool,
    is_private: bool,
    attachment_count: i64,
}
impl NoteRow {
    fn to_domain(self) -> NoteRecord {
        NoteRecord {
            id: self.id,
            name: self.name,
            date: self
                .date
                .map(|d| d.format(STORE_DATETIME_FORMAT).to_string()),
            patient: reference(self.patient_id, self.patient_name),
            booking: reference(self.booking_id, self.booking_name),
            author: reference(self.author_id, self.author_name),
            note_type: NoteType::from_tag(&self.note_type),
            subjective: self.subjective,
            objective: self.objective,
            assessment: self.assessment,
            plan: self.plan,
            content: self.content,
            important: self.is_important,
            private: self.is_private,
            attachment_count: u32::try_from(self.attachment_count).unwrap_or(u32::MAX),
            owner: Reference::Absent,
        }
    }
}

#[derive(FromRow)]
struct OwnerRow {
    owner_id: Option<i64>,
    owner_name: Option<String>,
}

//=========================================================================================
// Port Trait Implementations
//=========================================================================================

#[async_trait]
impl NoteStore for PgStore {
    async fn read_notes(&self, ids: &[NoteId]) -> PortResult<Vec<NoteRecord>> {
        let rows = sqlx::query_as::<_, NoteRow>(READ_NOTES_SQL)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let found: HashSet<i64> = rows.iter().map(|r| r.id).collect();
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PortError::NotFound(format!(
                "Medical notes {} not found",
                missing.join(", ")
            )));
        }

        debug!(count = rows.len(), "Read medical notes from database.");
        Ok(rows.into_iter().map(NoteRow::to_domain).collect())
    }
}

#[async_trait]
impl PatientStore for PgStore {
    async fn read_owner(&self, patient_id: PatientId) -> PortResult<Reference> {
        let row = sqlx::query_as::<_, OwnerRow>(READ_OWNER_SQL)
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| PortError::NotFound(format!("Patient {} not found", patient_id)))?;

        Ok(reference(row.owner_id, row.owner_name))
    }
}
