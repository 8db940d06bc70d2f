//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the storage ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use checkin_core::domain::{
    AttendanceRecord, DayKey, EventDays, NewAttendanceRecord, NewRegistrant, Registrant,
    StaffCredentials, StaffIdentity, StaffUser,
};
use checkin_core::identifier::ShortId;
use checkin_core::ports::{
    AttendanceLog, PortError, PortResult, RegistrantStore, StaffDirectory,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const REGISTRANT_COLUMNS: &str = "id, short_id, first_name, last_name, email, institution, \
     designation, contact_number, wed_sept3, thurs_sept4, fri_sept5, sat_sept6, sun_sept7, \
     not_attending, registered_at, email_sent, email_sent_at";

const ATTENDANCE_COLUMNS: &str = "id, registrant_id, short_id, first_name, last_name, email, \
     institution, event_day, checked_in_at, checked_in_by, raw_code";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct PgAdapter {
    pool: PgPool,
}

impl PgAdapter {
    /// Creates a new `PgAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// The registrants column holding the flag for `day`.
fn day_column(day: DayKey) -> &'static str {
    match day {
        DayKey::WedSept3 => "wed_sept3",
        DayKey::ThursSept4 => "thurs_sept4",
        DayKey::FriSept5 => "fri_sept5",
        DayKey::SatSept6 => "sat_sept6",
        DayKey::SunSept7 => "sun_sept7",
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => unexpected(e),
    }
}

fn parse_day(raw: &str) -> PortResult<DayKey> {
    raw.parse::<DayKey>()
        .map_err(|e| PortError::Unexpected(format!("Corrupt event_day column: {}", e)))
}

fn parse_short_id(raw: &str) -> PortResult<ShortId> {
    ShortId::parse(raw)
        .map_err(|e| PortError::Unexpected(format!("Corrupt short_id column: {}", e)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct RegistrantRecord {
    id: Uuid,
    short_id: String,
    first_name: String,
    last_name: String,
    email: String,
    institution: String,
    designation: String,
    contact_number: String,
    wed_sept3: bool,
    thurs_sept4: bool,
    fri_sept5: bool,
    sat_sept6: bool,
    sun_sept7: bool,
    not_attending: bool,
    registered_at: DateTime<Utc>,
    email_sent: bool,
    email_sent_at: Option<DateTime<Utc>>,
}
impl RegistrantRecord {
    fn to_domain(self) -> PortResult<Registrant> {
        Ok(Registrant {
            key: self.id,
            short_id: parse_short_id(&self.short_id)?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            institution: self.institution,
            designation: self.designation,
            contact_number: self.contact_number,
            event_days: EventDays {
                wed_sept3: self.wed_sept3,
                thurs_sept4: self.thurs_sept4,
                fri_sept5: self.fri_sept5,
                sat_sept6: self.sat_sept6,
                sun_sept7: self.sun_sept7,
                not_attending: self.not_attending,
            },
            registered_at: self.registered_at,
            email_sent: self.email_sent,
            email_sent_at: self.email_sent_at,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: Uuid,
    registrant_id: Uuid,
    short_id: String,
    first_name: String,
    last_name: String,
    email: String,
    institution: String,
    event_day: String,
    checked_in_at: DateTime<Utc>,
    checked_in_by: String,
    raw_code: String,
}
impl AttendanceRow {
    fn to_domain(self) -> PortResult<AttendanceRecord> {
        Ok(AttendanceRecord {
            id: self.id,
            registrant_key: self.registrant_id,
            short_id: parse_short_id(&self.short_id)?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            institution: self.institution,
            event_day: parse_day(&self.event_day)?,
            checked_in_at: self.checked_in_at,
            checked_in_by: self.checked_in_by,
            raw_code: self.raw_code,
        })
    }
}

#[derive(FromRow)]
struct StaffRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

fn registrants_to_domain(records: Vec<RegistrantRecord>) -> PortResult<Vec<Registrant>> {
    records.into_iter().map(RegistrantRecord::to_domain).collect()
}

fn attendance_to_domain(rows: Vec<AttendanceRow>) -> PortResult<Vec<AttendanceRecord>> {
    rows.into_iter().map(AttendanceRow::to_domain).collect()
}

//=========================================================================================
// `RegistrantStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RegistrantStore for PgAdapter {
    async fn insert_registrant(
        &self,
        registrant: NewRegistrant,
        short_id: ShortId,
    ) -> PortResult<Registrant> {
        let days = registrant.event_days;
        let sql = format!(
            "INSERT INTO registrants (id, short_id, first_name, last_name, email, institution, \
             designation, contact_number, wed_sept3, thurs_sept4, fri_sept5, sat_sept6, sun_sept7, \
             not_attending) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {}",
            REGISTRANT_COLUMNS
        );
        let record = sqlx::query_as::<_, RegistrantRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(short_id.as_str())
            .bind(&registrant.first_name)
            .bind(&registrant.last_name)
            .bind(&registrant.email)
            .bind(&registrant.institution)
            .bind(&registrant.designation)
            .bind(&registrant.contact_number)
            .bind(days.wed_sept3)
            .bind(days.thurs_sept4)
            .bind(days.fri_sept5)
            .bind(days.sat_sept6)
            .bind(days.sun_sept7)
            .bind(days.not_attending)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    PortError::Conflict(format!("Short ID {} is already issued", short_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn get_registrant(&self, key: Uuid) -> PortResult<Registrant> {
        let sql = format!("SELECT {} FROM registrants WHERE id = $1", REGISTRANT_COLUMNS);
        let record = sqlx::query_as::<_, RegistrantRecord>(&sql)
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("Registrant {} not found", key)))?;
        record.to_domain()
    }

    async fn find_by_short_id(&self, short_id: &ShortId) -> PortResult<Vec<Registrant>> {
        let sql = format!(
            "SELECT {} FROM registrants WHERE short_id = $1 ORDER BY registered_at DESC",
            REGISTRANT_COLUMNS
        );
        let records = sqlx::query_as::<_, RegistrantRecord>(&sql)
            .bind(short_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        registrants_to_domain(records)
    }

    async fn list_registrants(&self) -> PortResult<Vec<Registrant>> {
        let sql = format!(
            "SELECT {} FROM registrants ORDER BY registered_at DESC",
            REGISTRANT_COLUMNS
        );
        let records = sqlx::query_as::<_, RegistrantRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        registrants_to_domain(records)
    }

    async fn count_registrants(&self) -> PortResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrants")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }

    async fn grant_day(&self, key: Uuid, day: DayKey) -> PortResult<Registrant> {
        let sql = format!(
            "UPDATE registrants SET {} = TRUE, not_attending = FALSE WHERE id = $1 RETURNING {}",
            day_column(day),
            REGISTRANT_COLUMNS
        );
        let record = sqlx::query_as::<_, RegistrantRecord>(&sql)
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, || format!("Registrant {} not found", key)))?;
        record.to_domain()
    }

    async fn mark_email_sent(&self, key: Uuid, sent_at: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE registrants SET email_sent = TRUE, email_sent_at = $1 WHERE id = $2",
        )
        .bind(sent_at)
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Registrant {} not found", key)));
        }
        Ok(())
    }
}

//=========================================================================================
// `AttendanceLog` Trait Implementation
//=========================================================================================

#[async_trait]
impl AttendanceLog for PgAdapter {
    async fn append_attendance(&self, record: NewAttendanceRecord) -> PortResult<Uuid> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO attendance_records (id, registrant_id, short_id, first_name, last_name, \
             email, institution, event_day, checked_in_at, checked_in_by, raw_code) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(record.registrant_key)
        .bind(record.short_id.as_str())
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.email)
        .bind(&record.institution)
        .bind(record.event_day.as_str())
        .bind(record.checked_in_at)
        .bind(&record.checked_in_by)
        .bind(&record.raw_code)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn attendance_for_day(&self, day: DayKey) -> PortResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {} FROM attendance_records WHERE event_day = $1 ORDER BY checked_in_at DESC",
            ATTENDANCE_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(day.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        attendance_to_domain(rows)
    }

    async fn attendance_for_registrant(
        &self,
        registrant_key: Uuid,
        day: DayKey,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {} FROM attendance_records WHERE registrant_id = $1 AND event_day = $2 \
             ORDER BY checked_in_at DESC",
            ATTENDANCE_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(registrant_key)
            .bind(day.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        attendance_to_domain(rows)
    }

    async fn count_by_day(&self) -> PortResult<Vec<(DayKey, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT event_day, COUNT(*) FROM attendance_records GROUP BY event_day",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter()
            .map(|(day, count)| Ok((parse_day(&day)?, count.max(0) as u64)))
            .collect()
    }
}

//=========================================================================================
// `StaffDirectory` Trait Implementation
//=========================================================================================

#[async_trait]
impl StaffDirectory for PgAdapter {
    async fn create_staff(&self, email: &str, hashed_password: &str) -> PortResult<StaffUser> {
        let record = sqlx::query_as::<_, StaffRecord>(
            "INSERT INTO staff_users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email, hashed_password",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Staff account {} already exists", email))
            }
            _ => unexpected(e),
        })?;

        Ok(StaffUser {
            user_id: record.user_id,
            email: record.email,
        })
    }

    async fn get_staff_by_email(&self, email: &str) -> PortResult<StaffCredentials> {
        let record = sqlx::query_as::<_, StaffRecord>(
            "SELECT user_id, email, hashed_password FROM staff_users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Staff account {} not found", email)))?;

        Ok(StaffCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<StaffIdentity> {
        let identity: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT s.user_id, u.email FROM auth_sessions s \
             JOIN staff_users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        let (user_id, email) = identity.ok_or(PortError::Unauthorized)?;
        Ok(StaffIdentity { user_id, email })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
