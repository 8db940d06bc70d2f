//! crates/checkin_core/src/gate.rs
//!
//! The gate's state machine. One explicit value holds where a verification is,
//! and `GateState::apply` is the only way to move it:
//!
//! ```text
//! Idle --Submitted--> Validating --Parsed--> Lookup --Found--> DayCheck
//!      --Eligible--> Recording --Recorded/RecordingFailed--> Accepted
//! ```
//!
//! Any step may emit `Failed`, which lands in the terminal `Rejected` state.
//! `Reset` takes a terminal state back to `Idle`.

use crate::domain::{DayKey, Registrant};
use crate::identifier::ShortId;
use crate::payload::PayloadShape;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Outcomes
//=========================================================================================

/// A successful check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub registrant: Registrant,
    pub day: DayKey,
    /// `None` when the attendance write failed.
    pub record_id: Option<Uuid>,
    /// Identity was verified but the visit was not logged; staff reconcile later.
    pub attendance_recording_failed: bool,
    /// Check-ins for the same registrant and day that existed before this one.
    pub previous_check_ins: usize,
}

/// The broad class a rejection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCategory {
    Input,
    NotFound,
    Eligibility,
    Duplicate,
    Unavailable,
}

impl RejectionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionCategory::Input => "input",
            RejectionCategory::NotFound => "not_found",
            RejectionCategory::Eligibility => "eligibility",
            RejectionCategory::Duplicate => "duplicate",
            RejectionCategory::Unavailable => "unavailable",
        }
    }
}

/// Why a presented code was turned away.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("Invalid QR code format")]
    InvalidFormat { input: String },

    #[error("Unsupported QR code payload ({shape})")]
    UnsupportedPayload { shape: PayloadShape },

    #[error("Registration not found")]
    NotFound { code: String },

    #[error(
        "Participant is not registered for {}. They are registered for: {}",
        .attempted.label(),
        describe_days(.eligible, .not_attending)
    )]
    WrongDay {
        registrant: Box<Registrant>,
        attempted: DayKey,
        eligible: Vec<DayKey>,
        not_attending: bool,
    },

    #[error("{} already checked in for {} at {}", .registrant.full_name(), .day.label(), .checked_in_at.format("%H:%M"))]
    AlreadyCheckedIn {
        registrant: Box<Registrant>,
        day: DayKey,
        checked_in_at: DateTime<Utc>,
    },

    #[error("Registration lookup failed: {reason}")]
    LookupFailed { reason: String },
}

impl Rejection {
    pub fn category(&self) -> RejectionCategory {
        match self {
            Rejection::InvalidFormat { .. } | Rejection::UnsupportedPayload { .. } => {
                RejectionCategory::Input
            }
            Rejection::NotFound { .. } => RejectionCategory::NotFound,
            Rejection::WrongDay { .. } => RejectionCategory::Eligibility,
            Rejection::AlreadyCheckedIn { .. } => RejectionCategory::Duplicate,
            Rejection::LookupFailed { .. } => RejectionCategory::Unavailable,
        }
    }

    /// What the person at the gate can do next.
    pub fn guidance(&self) -> &'static str {
        match self {
            Rejection::InvalidFormat { .. } => {
                "Rescan the code or type the 6-character registration ID."
            }
            Rejection::UnsupportedPayload { .. } => {
                "This is an older code format. Enter the registration ID manually."
            }
            Rejection::NotFound { .. } => {
                "Check the code and retry, or look the attendee up on the dashboard."
            }
            Rejection::WrongDay { .. } => {
                "Select one of the registered days, or register the attendee for this day."
            }
            Rejection::AlreadyCheckedIn { .. } => {
                "The attendee is already inside for today. No new check-in was recorded."
            }
            Rejection::LookupFailed { .. } => {
                "The registration store is unreachable. Retry shortly."
            }
        }
    }

    /// The registrant involved, when the rejection happened after lookup.
    pub fn registrant(&self) -> Option<&Registrant> {
        match self {
            Rejection::WrongDay { registrant, .. }
            | Rejection::AlreadyCheckedIn { registrant, .. } => Some(registrant),
            _ => None,
        }
    }
}

fn describe_days(days: &[DayKey], not_attending: &bool) -> String {
    let mut labels: Vec<&str> = days.iter().map(|d| d.label()).collect();
    if *not_attending {
        labels.push("Not Attending");
    }
    if labels.is_empty() {
        "No days selected".to_string()
    } else {
        labels.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Accepted(Admission),
    Rejected(Rejection),
}

impl VerificationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VerificationOutcome::Accepted(_))
    }

    pub fn message(&self) -> String {
        match self {
            VerificationOutcome::Accepted(admission) if admission.attendance_recording_failed => {
                "Verification successful but attendance recording failed".to_string()
            }
            VerificationOutcome::Accepted(admission) => {
                format!("Attendance recorded for {}", admission.day.label())
            }
            VerificationOutcome::Rejected(rejection) => rejection.to_string(),
        }
    }
}

//=========================================================================================
// State Machine
//=========================================================================================

/// Where the registrant lookup should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    ShortId(ShortId),
    /// Storage key carried by a legacy envelope.
    StorageKey(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Idle,
    Validating { input: String },
    Lookup { target: LookupTarget },
    DayCheck { registrant: Box<Registrant> },
    Recording {
        registrant: Box<Registrant>,
        previous_check_ins: usize,
    },
    Accepted(Admission),
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateEvent {
    Submitted(String),
    Parsed(LookupTarget),
    Found(Registrant),
    Eligible { previous_check_ins: usize },
    Recorded { record_id: Uuid, day: DayKey },
    RecordingFailed { day: DayKey },
    Failed(Rejection),
    Reset,
}

impl GateState {
    /// Pure transition. Events that make no sense in the current state leave it unchanged.
    pub fn apply(self, event: GateEvent) -> GateState {
        match (self, event) {
            (GateState::Idle, GateEvent::Submitted(input)) => GateState::Validating { input },

            (GateState::Validating { .. }, GateEvent::Parsed(target)) => {
                GateState::Lookup { target }
            }

            (GateState::Lookup { .. }, GateEvent::Found(registrant)) => GateState::DayCheck {
                registrant: Box::new(registrant),
            },

            (GateState::DayCheck { registrant }, GateEvent::Eligible { previous_check_ins }) => {
                GateState::Recording {
                    registrant,
                    previous_check_ins,
                }
            }

            (
                GateState::Recording {
                    registrant,
                    previous_check_ins,
                },
                GateEvent::Recorded { record_id, day },
            ) => GateState::Accepted(Admission {
                registrant: *registrant,
                day,
                record_id: Some(record_id),
                attendance_recording_failed: false,
                previous_check_ins,
            }),

            (
                GateState::Recording {
                    registrant,
                    previous_check_ins,
                },
                GateEvent::RecordingFailed { day },
            ) => GateState::Accepted(Admission {
                registrant: *registrant,
                day,
                record_id: None,
                attendance_recording_failed: true,
                previous_check_ins,
            }),

            (state, GateEvent::Failed(rejection)) if state.is_in_flight() => {
                GateState::Rejected(rejection)
            }

            (state, GateEvent::Reset) if state.is_terminal() => GateState::Idle,

            (state, _) => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GateState::Accepted(_) | GateState::Rejected(_))
    }

    fn is_in_flight(&self) -> bool {
        !self.is_terminal() && !matches!(self, GateState::Idle)
    }

    /// The verification outcome, once the machine has reached a terminal state.
    pub fn outcome(self) -> Option<VerificationOutcome> {
        match self {
            GateState::Accepted(admission) => Some(VerificationOutcome::Accepted(admission)),
            GateState::Rejected(rejection) => Some(VerificationOutcome::Rejected(rejection)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::Validating { .. } => "validating",
            GateState::Lookup { .. } => "lookup",
            GateState::DayCheck { .. } => "day_check",
            GateState::Recording { .. } => "recording",
            GateState::Accepted(_) => "accepted",
            GateState::Rejected(_) => "rejected",
        }
    }
}
