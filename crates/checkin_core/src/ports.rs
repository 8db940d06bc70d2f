//! crates/checkin_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the check-in core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the document store, barcode libraries, and mail delivery.

use crate::domain::{
    AttendanceRecord, DayKey, NewAttendanceRecord, NewRegistrant, Registrant, StaffCredentials,
    StaffIdentity, StaffUser,
};
use crate::identifier::ShortId;
use crate::render::RenderedCode;
use crate::scanner::{DecodeStrategy, Frame};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

/// The registrant collection of the document store.
#[async_trait]
pub trait RegistrantStore: Send + Sync {
    /// Appends a registrant; the store assigns the key and registration timestamp.
    async fn insert_registrant(
        &self,
        registrant: NewRegistrant,
        short_id: ShortId,
    ) -> PortResult<Registrant>;

    async fn get_registrant(&self, key: Uuid) -> PortResult<Registrant>;

    /// Exact-match query on the short identifier, newest registration first.
    async fn find_by_short_id(&self, short_id: &ShortId) -> PortResult<Vec<Registrant>>;

    /// All registrants, newest registration first.
    async fn list_registrants(&self) -> PortResult<Vec<Registrant>>;

    async fn count_registrants(&self) -> PortResult<u64>;

    /// Sets the flag for `day` and clears `not_attending`.
    async fn grant_day(&self, key: Uuid, day: DayKey) -> PortResult<Registrant>;

    async fn mark_email_sent(&self, key: Uuid, sent_at: DateTime<Utc>) -> PortResult<()>;
}

/// The append-only attendance collection.
#[async_trait]
pub trait AttendanceLog: Send + Sync {
    async fn append_attendance(&self, record: NewAttendanceRecord) -> PortResult<Uuid>;

    /// Check-ins for one day, newest first.
    async fn attendance_for_day(&self, day: DayKey) -> PortResult<Vec<AttendanceRecord>>;

    /// Earlier check-ins of one registrant on one day, newest first.
    async fn attendance_for_registrant(
        &self,
        registrant_key: Uuid,
        day: DayKey,
    ) -> PortResult<Vec<AttendanceRecord>>;

    /// Check-in counts per day. Days without check-ins may be absent.
    async fn count_by_day(&self) -> PortResult<Vec<(DayKey, u64)>>;
}

/// Staff accounts and their browser sessions.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn create_staff(&self, email: &str, hashed_password: &str) -> PortResult<StaffUser>;

    async fn get_staff_by_email(&self, email: &str) -> PortResult<StaffCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<StaffIdentity>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

//=========================================================================================
// Barcode and Mail Ports
//=========================================================================================

/// Encodes a payload string into a scannable 2-D barcode image.
pub trait CodeRenderer: Send + Sync {
    fn render(&self, payload: &str) -> Result<RenderedCode, crate::render::RenderError>;
}

/// One decode pass over an already-captured frame.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &Frame, strategy: DecodeStrategy) -> Option<String>;
}

#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends the confirmation email carrying the registrant's code.
    async fn send_confirmation(&self, registrant: &Registrant, code: &RenderedCode)
        -> PortResult<()>;
}
