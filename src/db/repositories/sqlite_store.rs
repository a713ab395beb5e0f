use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::fmt::Hyphenated;
use uuid::Uuid;

use crate::db::models::{AttendeeRecord, Registration, ValidationRecord};
use crate::db::{AttendeeStore, DatabaseError};
use crate::ledger::Sheet;

const SQL_FIND_REGISTRATION: &str = r#"
SELECT id, name, degree, class_section, year, register_number, email, phone, registered_at
FROM registrations
WHERE register_number = ?1
"#;

const SQL_INSERT_REGISTRATION: &str = r#"
INSERT INTO registrations
    (id, register_number, name, degree, class_section, year, email, phone, registered_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

const SQL_FIND_VALIDATION: &str = r#"
SELECT id, name, degree, class_section, year, register_number, email, phone, validated_at
FROM validations
WHERE register_number = ?1
"#;

const SQL_INSERT_VALIDATION: &str = r#"
INSERT INTO validations
    (id, register_number, name, degree, class_section, year, email, phone, validated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

const SQL_UNSYNCED_REGISTRATIONS: &str = r#"
SELECT id, name, degree, class_section, year, register_number, email, phone, registered_at
FROM registrations
WHERE ledger_synced = 0 AND julianday(registered_at) <= julianday(?1)
ORDER BY registered_at
LIMIT ?2
"#;

const SQL_UNSYNCED_VALIDATIONS: &str = r#"
SELECT id, name, degree, class_section, year, register_number, email, phone, validated_at
FROM validations
WHERE ledger_synced = 0 AND julianday(validated_at) <= julianday(?1)
ORDER BY validated_at
LIMIT ?2
"#;

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: Hyphenated,
    #[sqlx(flatten)]
    attendee: AttendeeRecord,
    registered_at: DateTime<Utc>,
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            attendee: row.attendee,
            registered_at: row.registered_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ValidationRow {
    id: Hyphenated,
    #[sqlx(flatten)]
    attendee: AttendeeRecord,
    validated_at: DateTime<Utc>,
}

impl From<ValidationRow> for ValidationRecord {
    fn from(row: ValidationRow) -> Self {
        Self {
            id: row.id.into_uuid(),
            attendee: row.attendee,
            validated_at: row.validated_at,
        }
    }
}

/// [`AttendeeStore`] backed by the `registrations` and `validations` tables.
///
/// Single-use check-in relies on the `UNIQUE` constraint on
/// `validations.register_number`, not on the read that precedes the insert.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendeeStore for SqliteStore {
    async fn find_registration(
        &self,
        register_number: &str,
    ) -> Result<Option<Registration>, DatabaseError> {
        let row = sqlx::query_as::<_, RegistrationRow>(SQL_FIND_REGISTRATION)
            .bind(register_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Registration::from))
    }

    async fn insert_registration(
        &self,
        attendee: &AttendeeRecord,
    ) -> Result<Registration, DatabaseError> {
        let registration = Registration {
            id: Uuid::now_v7(),
            attendee: attendee.clone(),
            registered_at: Utc::now(),
        };

        sqlx::query(SQL_INSERT_REGISTRATION)
            .bind(registration.id.hyphenated())
            .bind(&attendee.register_number)
            .bind(&attendee.name)
            .bind(&attendee.degree)
            .bind(&attendee.class_section)
            .bind(&attendee.year)
            .bind(&attendee.email)
            .bind(&attendee.phone)
            .bind(registration.registered_at)
            .execute(&self.pool)
            .await?;

        Ok(registration)
    }

    async fn find_validation(
        &self,
        register_number: &str,
    ) -> Result<Option<ValidationRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, ValidationRow>(SQL_FIND_VALIDATION)
            .bind(register_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ValidationRecord::from))
    }

    async fn insert_validation(
        &self,
        attendee: &AttendeeRecord,
    ) -> Result<ValidationRecord, DatabaseError> {
        let record = ValidationRecord {
            id: Uuid::now_v7(),
            attendee: attendee.clone(),
            validated_at: Utc::now(),
        };

        sqlx::query(SQL_INSERT_VALIDATION)
            .bind(record.id.hyphenated())
            .bind(&attendee.register_number)
            .bind(&attendee.name)
            .bind(&attendee.degree)
            .bind(&attendee.class_section)
            .bind(&attendee.year)
            .bind(&attendee.email)
            .bind(&attendee.phone)
            .bind(record.validated_at)
            .execute(&self.pool)
            .await?;

        Ok(record)
    }

    async fn unsynced_registrations(
        &self,
        settled_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Registration>, DatabaseError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(SQL_UNSYNCED_REGISTRATIONS)
            .bind(settled_before)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Registration::from).collect())
    }

    async fn unsynced_validations(
        &self,
        settled_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ValidationRecord>, DatabaseError> {
        let rows = sqlx::query_as::<_, ValidationRow>(SQL_UNSYNCED_VALIDATIONS)
            .bind(settled_before)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ValidationRecord::from).collect())
    }

    async fn mark_synced(&self, sheet: Sheet, id: Uuid) -> Result<(), DatabaseError> {
        let sql = match sheet {
            Sheet::Registrations => "UPDATE registrations SET ledger_synced = 1 WHERE id = ?1",
            Sheet::CheckIns => "UPDATE validations SET ledger_synced = 1 WHERE id = ?1",
        };
        sqlx::query(sql)
            .bind(id.hyphenated())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
