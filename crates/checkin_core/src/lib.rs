pub mod domain;
pub mod gate;
pub mod identifier;
pub mod memory;
pub mod payload;
pub mod ports;
pub mod recorder;
pub mod registration;
pub mod render;
pub mod reports;
pub mod scan_session;
pub mod scanner;
pub mod verifier;

pub use domain::{
    AttendanceRecord, AuthSession, DailyAttendance, DayKey, EventDays, NewAttendanceRecord,
    NewRegistrant, Registrant, StaffCredentials, StaffIdentity, StaffUser, UnknownDay,
    ValidationError,
};
pub use gate::{Admission, GateEvent, GateState, Rejection, RejectionCategory, VerificationOutcome};
pub use identifier::{IdentifierError, ShortId};
pub use memory::InMemoryStore;
pub use payload::{CodePayload, PayloadFormat, PayloadShape};
pub use ports::{
    AttendanceLog, CodeRenderer, EmailService, FrameDecoder, PortError, PortResult,
    RegistrantStore, StaffDirectory,
};
pub use recorder::{AttendanceRecorder, RecordingError};
pub use registration::{Registration, RegistrationError, RegistrationService};
pub use render::{RenderError, RenderedCode};
pub use scan_session::{preferred_camera, CameraDevice, CameraFacing, CameraInfo, ScanSession};
pub use scanner::{CodeReader, DecodeStrategy, Decoded, Frame, ScanError};
pub use verifier::{DuplicatePolicy, Verifier, VerifierSettings};
