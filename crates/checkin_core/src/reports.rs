//! crates/checkin_core/src/reports.rs
//!
//! Read-side views over the attendance log for the staff dashboard.

use crate::domain::{AttendanceRecord, DailyAttendance, DayKey};
use crate::ports::{AttendanceLog, PortResult};

/// One row per event day, in calendar order, including days nobody attended yet.
pub async fn attendance_summary(log: &dyn AttendanceLog) -> PortResult<Vec<DailyAttendance>> {
    let counts = log.count_by_day().await?;
    Ok(DayKey::ALL
        .into_iter()
        .map(|day| DailyAttendance {
            day,
            label: day.label(),
            date: day.date(),
            total_attendees: counts
                .iter()
                .filter(|(counted, _)| *counted == day)
                .map(|(_, n)| *n)
                .sum(),
        })
        .collect())
}

/// Everyone checked in on `day`, most recent first.
pub async fn daily_attendance(
    log: &dyn AttendanceLog,
    day: DayKey,
) -> PortResult<Vec<AttendanceRecord>> {
    log.attendance_for_day(day).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewAttendanceRecord, Registrant, EventDays, StaffIdentity};
    use crate::identifier::ShortId;
    use crate::memory::InMemoryStore;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn registrant(code: &str) -> Registrant {
        Registrant {
            key: Uuid::new_v4(),
            short_id: ShortId::parse(code).unwrap(),
            first_name: "Ana".into(),
            last_name: "Reyes".into(),
            email: "ana@example.org".into(),
            institution: "UP".into(),
            designation: "Dean".into(),
            contact_number: "1".into(),
            event_days: EventDays::only(&DayKey::ALL),
            registered_at: Utc::now(),
            email_sent: false,
            email_sent_at: None,
        }
    }

    #[tokio::test]
    async fn summary_is_zero_filled_and_ordered() {
        let store = InMemoryStore::new();
        let staff = StaffIdentity {
            user_id: Uuid::new_v4(),
            email: "door@expo.test".into(),
        };
        let now = Utc::now();
        for (code, day, minutes) in [
            ("AAAAAA", DayKey::FriSept5, 0),
            ("BBBBBB", DayKey::FriSept5, 5),
            ("CCCCCC", DayKey::WedSept3, 1),
        ] {
            let record = NewAttendanceRecord::snapshot(
                &registrant(code),
                day,
                &staff,
                code,
                now + Duration::minutes(minutes),
            );
            store.append_attendance(record).await.unwrap();
        }

        let summary = attendance_summary(&store).await.unwrap();
        let counts: Vec<(DayKey, u64)> = summary.iter().map(|d| (d.day, d.total_attendees)).collect();
        assert_eq!(
            counts,
            vec![
                (DayKey::WedSept3, 1),
                (DayKey::ThursSept4, 0),
                (DayKey::FriSept5, 2),
                (DayKey::SatSept6, 0),
                (DayKey::SunSept7, 0),
            ]
        );
        assert_eq!(summary[0].label, "Wednesday, September 3");

        let friday = daily_attendance(&store, DayKey::FriSept5).await.unwrap();
        assert_eq!(friday[0].short_id.as_str(), "BBBBBB");
        assert_eq!(friday[1].short_id.as_str(), "AAAAAA");
    }
}
