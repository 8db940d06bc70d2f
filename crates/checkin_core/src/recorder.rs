//! crates/checkin_core/src/recorder.rs
//!
//! Appends one immutable attendance record per accepted check-in.

use crate::domain::{DayKey, NewAttendanceRecord, Registrant, StaffIdentity};
use crate::ports::{AttendanceLog, PortError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Attendance recording failed: {0}")]
pub struct RecordingError(#[from] pub PortError);

#[derive(Clone)]
pub struct AttendanceRecorder {
    log: Arc<dyn AttendanceLog>,
}

impl AttendanceRecorder {
    pub fn new(log: Arc<dyn AttendanceLog>) -> Self {
        Self { log }
    }

    /// Snapshots the registrant's display fields and appends the record.
    pub async fn record(
        &self,
        registrant: &Registrant,
        day: DayKey,
        staff: &StaffIdentity,
        raw_code: &str,
    ) -> Result<Uuid, RecordingError> {
        let record = NewAttendanceRecord::snapshot(registrant, day, staff, raw_code, Utc::now());
        match self.log.append_attendance(record).await {
            Ok(id) => {
                info!(record_id = %id, short_id = %registrant.short_id, %day, "Attendance recorded");
                Ok(id)
            }
            Err(e) => {
                error!(short_id = %registrant.short_id, %day, "Failed to record attendance: {:?}", e);
                Err(RecordingError(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventDays, NewRegistrant};
    use crate::identifier::ShortId;
    use crate::memory::InMemoryStore;
    use crate::ports::RegistrantStore;

    #[tokio::test]
    async fn record_keeps_a_snapshot_of_display_fields() {
        let store = Arc::new(InMemoryStore::new());
        let registrant = store
            .insert_registrant(
                NewRegistrant {
                    first_name: "Ana".into(),
                    last_name: "Reyes".into(),
                    email: "ana@example.org".into(),
                    institution: "UP Diliman".into(),
                    designation: "Researcher".into(),
                    contact_number: "0917".into(),
                    event_days: EventDays::only(&[DayKey::WedSept3]),
                },
                ShortId::parse("Q7K2M9").unwrap(),
            )
            .await
            .unwrap();
        let staff = StaffIdentity {
            user_id: Uuid::new_v4(),
            email: "door@expo.test".into(),
        };

        let recorder = AttendanceRecorder::new(store.clone());
        let id = recorder
            .record(&registrant, DayKey::WedSept3, &staff, "q7k2m9")
            .await
            .unwrap();

        // Later edits to the stored registrant must not leak into history.
        store.edit_registrant(registrant.key, |r| {
            r.institution = "Elsewhere".into();
            r.email = "ana.reyes@example.org".into();
        });
        store.grant_day(registrant.key, DayKey::FriSept5).await.unwrap();
        let edited = store.get_registrant(registrant.key).await.unwrap();
        assert_eq!(edited.institution, "Elsewhere");
        assert!(edited.event_days.is_registered_for(DayKey::FriSept5));

        let records = store.attendance_for_day(DayKey::WedSept3).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, id);
        assert_eq!(record.registrant_key, registrant.key);
        assert_eq!(record.institution, "UP Diliman");
        assert_eq!(record.email, "ana@example.org");
        assert_eq!(record.first_name, "Ana");
        assert_eq!(record.checked_in_by, "door@expo.test");
        assert_eq!(record.raw_code, "q7k2m9");
    }
}
