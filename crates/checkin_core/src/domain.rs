//! crates/checkin_core/src/domain.rs
//!
//! Defines the pure, core data structures for the check-in flow.
//! These structs are independent of any database or transport format.

use crate::identifier::ShortId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Event Days
//=========================================================================================

/// One of the five fixed days of the exposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DayKey {
    WedSept3,
    ThursSept4,
    FriSept5,
    SatSept6,
    SunSept7,
}

impl DayKey {
    /// All event days in calendar order.
    pub const ALL: [DayKey; 5] = [
        DayKey::WedSept3,
        DayKey::ThursSept4,
        DayKey::FriSept5,
        DayKey::SatSept6,
        DayKey::SunSept7,
    ];

    /// The wire name of the day, e.g. `wedSept3`.
    pub fn as_str(self) -> &'static str {
        match self {
            DayKey::WedSept3 => "wedSept3",
            DayKey::ThursSept4 => "thursSept4",
            DayKey::FriSept5 => "friSept5",
            DayKey::SatSept6 => "satSept6",
            DayKey::SunSept7 => "sunSept7",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DayKey::WedSept3 => "Wednesday, September 3",
            DayKey::ThursSept4 => "Thursday, September 4",
            DayKey::FriSept5 => "Friday, September 5",
            DayKey::SatSept6 => "Saturday, September 6",
            DayKey::SunSept7 => "Sunday, September 7",
        }
    }

    pub fn date(self) -> NaiveDate {
        let day = match self {
            DayKey::WedSept3 => 3,
            DayKey::ThursSept4 => 4,
            DayKey::FriSept5 => 5,
            DayKey::SatSept6 => 6,
            DayKey::SunSept7 => 7,
        };
        // September 3..=7 of 2025 are all valid calendar dates.
        NaiveDate::from_ymd_opt(2025, 9, day).unwrap_or_default()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name one of the five event days.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event day: '{0}'")]
pub struct UnknownDay(pub String);

impl FromStr for DayKey {
    type Err = UnknownDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DayKey::ALL
            .into_iter()
            .find(|day| day.as_str() == s)
            .ok_or_else(|| UnknownDay(s.to_string()))
    }
}

/// The days a registrant intends to attend, plus the separate `not_attending` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDays {
    pub wed_sept3: bool,
    pub thurs_sept4: bool,
    pub fri_sept5: bool,
    pub sat_sept6: bool,
    pub sun_sept7: bool,
    pub not_attending: bool,
}

impl EventDays {
    /// Builds a set with exactly the given days selected.
    pub fn only(days: &[DayKey]) -> Self {
        let mut event_days = Self::default();
        for day in days {
            event_days.set(*day, true);
        }
        event_days
    }

    pub fn is_registered_for(&self, day: DayKey) -> bool {
        match day {
            DayKey::WedSept3 => self.wed_sept3,
            DayKey::ThursSept4 => self.thurs_sept4,
            DayKey::FriSept5 => self.fri_sept5,
            DayKey::SatSept6 => self.sat_sept6,
            DayKey::SunSept7 => self.sun_sept7,
        }
    }

    pub fn set(&mut self, day: DayKey, attending: bool) {
        let flag = match day {
            DayKey::WedSept3 => &mut self.wed_sept3,
            DayKey::ThursSept4 => &mut self.thurs_sept4,
            DayKey::FriSept5 => &mut self.fri_sept5,
            DayKey::SatSept6 => &mut self.sat_sept6,
            DayKey::SunSept7 => &mut self.sun_sept7,
        };
        *flag = attending;
    }

    /// Adds a day at the gate. A walk-up is attending by definition.
    pub fn grant(&mut self, day: DayKey) {
        self.set(day, true);
        self.not_attending = false;
    }

    /// Registered days in calendar order.
    pub fn registered_days(&self) -> Vec<DayKey> {
        DayKey::ALL
            .into_iter()
            .filter(|day| self.is_registered_for(*day))
            .collect()
    }

    pub fn has_any_day(&self) -> bool {
        DayKey::ALL.into_iter().any(|day| self.is_registered_for(day))
    }
}

//=========================================================================================
// Registrants
//=========================================================================================

/// A person who registered for the exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Registrant {
    /// Persistent storage key assigned by the store.
    pub key: Uuid,
    pub short_id: ShortId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: String,
    pub designation: String,
    pub contact_number: String,
    pub event_days: EventDays,
    pub registered_at: DateTime<Utc>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
}

impl Registrant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The self-registration form as submitted by an attendee.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistrant {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: String,
    pub designation: String,
    pub contact_number: String,
    pub event_days: EventDays,
}

/// Reasons a registration form is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),
    #[error("Please select at least one event day or \"Not Attending\"")]
    NoDaySelected,
    #[error("\"Not Attending\" cannot be combined with event days")]
    ConflictingAttendance,
}

impl NewRegistrant {
    /// Applies the registration form rules and returns a trimmed copy.
    pub fn validate(&self) -> Result<NewRegistrant, ValidationError> {
        let required = [
            ("First name", &self.first_name),
            ("Last name", &self.last_name),
            ("Email", &self.email),
            ("Institution/Organization", &self.institution),
            ("Designation", &self.designation),
            ("Contact number", &self.contact_number),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }

        let email = self.email.trim();
        let valid_email = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            }
            None => false,
        };
        if !valid_email || email.contains(char::is_whitespace) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }

        let days = &self.event_days;
        if !days.has_any_day() && !days.not_attending {
            return Err(ValidationError::NoDaySelected);
        }
        if days.has_any_day() && days.not_attending {
            return Err(ValidationError::ConflictingAttendance);
        }

        Ok(NewRegistrant {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: email.to_string(),
            institution: self.institution.trim().to_string(),
            designation: self.designation.trim().to_string(),
            contact_number: self.contact_number.trim().to_string(),
            event_days: self.event_days,
        })
    }
}

//=========================================================================================
// Attendance
//=========================================================================================

/// An immutable check-in entry. Display fields are a snapshot taken at check-in time.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub registrant_key: Uuid,
    pub short_id: ShortId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: String,
    pub event_day: DayKey,
    pub checked_in_at: DateTime<Utc>,
    pub checked_in_by: String,
    pub raw_code: String,
}

/// A check-in about to be appended to the attendance log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub registrant_key: Uuid,
    pub short_id: ShortId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: String,
    pub event_day: DayKey,
    pub checked_in_at: DateTime<Utc>,
    pub checked_in_by: String,
    pub raw_code: String,
}

impl NewAttendanceRecord {
    pub fn snapshot(
        registrant: &Registrant,
        day: DayKey,
        staff: &StaffIdentity,
        raw_code: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            registrant_key: registrant.key,
            short_id: registrant.short_id.clone(),
            first_name: registrant.first_name.clone(),
            last_name: registrant.last_name.clone(),
            email: registrant.email.clone(),
            institution: registrant.institution.clone(),
            event_day: day,
            checked_in_at: at,
            checked_in_by: staff.email.clone(),
            raw_code: raw_code.to_string(),
        }
    }

    pub fn into_record(self, id: Uuid) -> AttendanceRecord {
        AttendanceRecord {
            id,
            registrant_key: self.registrant_key,
            short_id: self.short_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            institution: self.institution,
            event_day: self.event_day,
            checked_in_at: self.checked_in_at,
            checked_in_by: self.checked_in_by,
            raw_code: self.raw_code,
        }
    }
}

/// Attendee count for one event day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyAttendance {
    pub day: DayKey,
    pub label: &'static str,
    pub date: NaiveDate,
    pub total_attendees: u64,
}

//=========================================================================================
// Staff
//=========================================================================================

// A staff account as seen by the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffUser {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct StaffCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// The staff member performing a check-in, resolved from their auth session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffIdentity {
    pub user_id: Uuid,
    pub email: String,
}

impl From<StaffUser> for StaffIdentity {
    fn from(user: StaffUser) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
        }
    }
}

// Represents a browser login session (auth cookie).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewRegistrant {
        NewRegistrant {
            first_name: " Ana ".into(),
            last_name: "Reyes".into(),
            email: "ana@example.org".into(),
            institution: "UP Diliman".into(),
            designation: "Researcher".into(),
            contact_number: "0917 000 0000".into(),
            event_days: EventDays::only(&[DayKey::WedSept3]),
        }
    }

    #[test]
    fn day_keys_round_trip_through_wire_names() {
        for day in DayKey::ALL {
            assert_eq!(day.as_str().parse::<DayKey>(), Ok(day));
        }
        assert_eq!(
            "wednesday".parse::<DayKey>(),
            Err(UnknownDay("wednesday".into()))
        );
        assert_eq!(
            serde_json::to_string(&DayKey::ThursSept4).unwrap(),
            "\"thursSept4\""
        );
    }

    #[test]
    fn day_dates_follow_calendar_order() {
        assert_eq!(DayKey::WedSept3.date(), NaiveDate::from_ymd_opt(2025, 9, 3).unwrap());
        assert_eq!(DayKey::SunSept7.date(), NaiveDate::from_ymd_opt(2025, 9, 7).unwrap());
        assert_eq!(DayKey::FriSept5.label(), "Friday, September 5");
    }

    #[test]
    fn grant_sets_day_and_clears_not_attending() {
        let mut days = EventDays {
            not_attending: true,
            ..EventDays::default()
        };
        days.grant(DayKey::SatSept6);
        assert!(days.is_registered_for(DayKey::SatSept6));
        assert!(!days.not_attending);
        assert_eq!(days.registered_days(), vec![DayKey::SatSept6]);
    }

    #[test]
    fn event_days_use_camel_case_fields() {
        let days: EventDays = serde_json::from_str(
            r#"{"wedSept3":true,"thursSept4":false,"friSept5":true,"satSept6":false,"sunSept7":false,"notAttending":false}"#,
        )
        .unwrap();
        assert_eq!(days.registered_days(), vec![DayKey::WedSept3, DayKey::FriSept5]);
    }

    #[test]
    fn validate_trims_fields() {
        let cleaned = form().validate().unwrap();
        assert_eq!(cleaned.first_name, "Ana");
    }

    #[test]
    fn validate_rejects_incomplete_forms() {
        let mut missing = form();
        missing.institution = "  ".into();
        assert_eq!(
            missing.validate(),
            Err(ValidationError::MissingField("Institution/Organization"))
        );

        let mut bad_email = form();
        bad_email.email = "ana.example.org".into();
        assert!(matches!(bad_email.validate(), Err(ValidationError::InvalidEmail(_))));

        let mut no_days = form();
        no_days.event_days = EventDays::default();
        assert_eq!(no_days.validate(), Err(ValidationError::NoDaySelected));

        let mut both = form();
        both.event_days.not_attending = true;
        assert_eq!(both.validate(), Err(ValidationError::ConflictingAttendance));
    }

    #[test]
    fn not_attending_alone_is_a_valid_registration() {
        let mut declined = form();
        declined.event_days = EventDays {
            not_attending: true,
            ..EventDays::default()
        };
        assert!(declined.validate().is_ok());
    }
}
