//! crates/checkin_core/src/memory.rs
//!
//! An in-process implementation of the storage ports. Used when no database is
//! configured and as the backing store in tests.

use crate::domain::{
    AttendanceRecord, DayKey, NewAttendanceRecord, NewRegistrant, Registrant, StaffCredentials,
    StaffIdentity, StaffUser,
};
use crate::identifier::ShortId;
use crate::ports::{AttendanceLog, PortError, PortResult, RegistrantStore, StaffDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    registrants: Vec<Registrant>,
    attendance: Vec<AttendanceRecord>,
    staff: Vec<StaffCredentials>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> PortResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> PortResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }
}

#[cfg(test)]
impl InMemoryStore {
    /// Edits a stored registrant in place, as an organiser correcting a record would.
    pub(crate) fn edit_registrant(&self, key: Uuid, edit: impl FnOnce(&mut Registrant)) {
        let mut tables = self.tables.write().unwrap();
        let registrant = tables.registrants.iter_mut().find(|r| r.key == key).unwrap();
        edit(registrant);
    }
}

/// Newest first by the given timestamp.
fn newest_first<T>(mut items: Vec<T>, at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(at(item)));
    items
}

#[async_trait]
impl RegistrantStore for InMemoryStore {
    async fn insert_registrant(
        &self,
        registrant: NewRegistrant,
        short_id: ShortId,
    ) -> PortResult<Registrant> {
        let record = Registrant {
            key: Uuid::new_v4(),
            short_id,
            first_name: registrant.first_name,
            last_name: registrant.last_name,
            email: registrant.email,
            institution: registrant.institution,
            designation: registrant.designation,
            contact_number: registrant.contact_number,
            event_days: registrant.event_days,
            registered_at: Utc::now(),
            email_sent: false,
            email_sent_at: None,
        };
        let mut tables = self.write()?;
        if tables.registrants.iter().any(|r| r.short_id == record.short_id) {
            return Err(PortError::Conflict(format!(
                "Short ID {} is already issued",
                record.short_id
            )));
        }
        tables.registrants.push(record.clone());
        Ok(record)
    }

    async fn get_registrant(&self, key: Uuid) -> PortResult<Registrant> {
        self.read()?
            .registrants
            .iter()
            .find(|r| r.key == key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Registrant {} not found", key)))
    }

    async fn find_by_short_id(&self, short_id: &ShortId) -> PortResult<Vec<Registrant>> {
        let matches = self
            .read()?
            .registrants
            .iter()
            .filter(|r| &r.short_id == short_id)
            .cloned()
            .collect();
        Ok(newest_first(matches, |r: &Registrant| r.registered_at))
    }

    async fn list_registrants(&self) -> PortResult<Vec<Registrant>> {
        let all = self.read()?.registrants.clone();
        Ok(newest_first(all, |r: &Registrant| r.registered_at))
    }

    async fn count_registrants(&self) -> PortResult<u64> {
        Ok(self.read()?.registrants.len() as u64)
    }

    async fn grant_day(&self, key: Uuid, day: DayKey) -> PortResult<Registrant> {
        let mut tables = self.write()?;
        let registrant = tables
            .registrants
            .iter_mut()
            .find(|r| r.key == key)
            .ok_or_else(|| PortError::NotFound(format!("Registrant {} not found", key)))?;
        registrant.event_days.grant(day);
        Ok(registrant.clone())
    }

    async fn mark_email_sent(&self, key: Uuid, sent_at: DateTime<Utc>) -> PortResult<()> {
        let mut tables = self.write()?;
        let registrant = tables
            .registrants
            .iter_mut()
            .find(|r| r.key == key)
            .ok_or_else(|| PortError::NotFound(format!("Registrant {} not found", key)))?;
        registrant.email_sent = true;
        registrant.email_sent_at = Some(sent_at);
        Ok(())
    }
}

#[async_trait]
impl AttendanceLog for InMemoryStore {
    async fn append_attendance(&self, record: NewAttendanceRecord) -> PortResult<Uuid> {
        let id = Uuid::new_v4();
        self.write()?.attendance.push(record.into_record(id));
        Ok(id)
    }

    async fn attendance_for_day(&self, day: DayKey) -> PortResult<Vec<AttendanceRecord>> {
        let records = self
            .read()?
            .attendance
            .iter()
            .filter(|r| r.event_day == day)
            .cloned()
            .collect();
        Ok(newest_first(records, |r: &AttendanceRecord| r.checked_in_at))
    }

    async fn attendance_for_registrant(
        &self,
        registrant_key: Uuid,
        day: DayKey,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let records = self
            .read()?
            .attendance
            .iter()
            .filter(|r| r.registrant_key == registrant_key && r.event_day == day)
            .cloned()
            .collect();
        Ok(newest_first(records, |r: &AttendanceRecord| r.checked_in_at))
    }

    async fn count_by_day(&self) -> PortResult<Vec<(DayKey, u64)>> {
        let tables = self.read()?;
        let mut counts: HashMap<DayKey, u64> = HashMap::new();
        for record in &tables.attendance {
            *counts.entry(record.event_day).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStore {
    async fn create_staff(&self, email: &str, hashed_password: &str) -> PortResult<StaffUser> {
        let mut tables = self.write()?;
        if tables.staff.iter().any(|s| s.email.eq_ignore_ascii_case(email)) {
            return Err(PortError::Conflict(format!("Staff account {} already exists", email)));
        }
        let credentials = StaffCredentials {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let user = StaffUser {
            user_id: credentials.user_id,
            email: credentials.email.clone(),
        };
        tables.staff.push(credentials);
        Ok(user)
    }

    async fn get_staff_by_email(&self, email: &str) -> PortResult<StaffCredentials> {
        self.read()?
            .staff
            .iter()
            .find(|s| s.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Staff account {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.write()?
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<StaffIdentity> {
        let tables = self.read()?;
        let (user_id, expires_at) = tables
            .sessions
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthorized)?;
        if expires_at <= Utc::now() {
            return Err(PortError::Unauthorized);
        }
        tables
            .staff
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| StaffIdentity {
                user_id: s.user_id,
                email: s.email.clone(),
            })
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.write()?.sessions.remove(session_id);
        Ok(())
    }
}
