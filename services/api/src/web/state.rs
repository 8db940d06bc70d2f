//! services/api/src/web/state.rs
//!
//! Defines the application's shared and scan-connection-specific states.

use crate::config::Config;
use checkin_core::domain::{DayKey, StaffIdentity};
use checkin_core::ports::{
    AttendanceLog, CodeRenderer, EmailService, FrameDecoder, RegistrantStore, StaffDirectory,
};
use checkin_core::registration::RegistrationService;
use checkin_core::scan_session::CameraInfo;
use checkin_core::scanner::CodeReader;
use checkin_core::verifier::{Verifier, VerifierSettings};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registrants: Arc<dyn RegistrantStore>,
    pub attendance: Arc<dyn AttendanceLog>,
    pub staff: Arc<dyn StaffDirectory>,
    pub config: Arc<Config>,
    pub verifier: Verifier,
    pub registration: RegistrationService,
    pub reader: CodeReader,
}

/// The adapters the application is wired with.
pub struct Backends {
    pub registrants: Arc<dyn RegistrantStore>,
    pub attendance: Arc<dyn AttendanceLog>,
    pub staff: Arc<dyn StaffDirectory>,
    pub renderer: Arc<dyn CodeRenderer>,
    pub decoder: Arc<dyn FrameDecoder>,
    pub mailer: Arc<dyn EmailService>,
}

impl AppState {
    pub fn new(config: Config, backends: Backends) -> Self {
        let settings = VerifierSettings {
            payload_format: config.payload_format,
            duplicate_policy: config.duplicate_policy,
        };
        let verifier = Verifier::new(
            backends.registrants.clone(),
            backends.attendance.clone(),
            settings,
        );
        let registration = RegistrationService::new(
            backends.registrants.clone(),
            backends.renderer,
            backends.mailer,
            config.id_issue_attempts,
        );

        Self {
            registrants: backends.registrants,
            attendance: backends.attendance,
            staff: backends.staff,
            config: Arc::new(config),
            verifier,
            registration,
            reader: CodeReader::new(backends.decoder),
        }
    }
}

//=========================================================================================
// ScanConnection (Specific to One WebSocket Connection)
//=========================================================================================

/// Where a live scanning connection currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Waiting for the staff member to press capture.
    Ready,
    /// A capture is in flight; the next binary frame belongs to it.
    Capturing,
    /// The camera has been released; only a new connection can scan again.
    Stopped,
}

/// A connection's `ScanMode`, shared by the socket reader and the capture loop.
///
/// The reader claims a capture with `begin_capture` as soon as the request
/// arrives, so a second request is refused before it can arm another frame.
#[derive(Debug, Clone)]
pub struct SharedScanMode(Arc<Mutex<ScanMode>>);

impl SharedScanMode {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(ScanMode::Ready)))
    }

    fn lock(&self) -> MutexGuard<'_, ScanMode> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> ScanMode {
        *self.lock()
    }

    /// Moves `Ready` to `Capturing`. Any other mode is returned as the refusal.
    pub fn begin_capture(&self) -> Result<(), ScanMode> {
        let mut mode = self.lock();
        match *mode {
            ScanMode::Ready => {
                *mode = ScanMode::Capturing;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Back to `Ready` once a capture has been answered. `Stopped` is final.
    pub fn finish_capture(&self) {
        let mut mode = self.lock();
        if *mode == ScanMode::Capturing {
            *mode = ScanMode::Ready;
        }
    }

    pub fn stop(&self) {
        *self.lock() = ScanMode::Stopped;
    }
}

impl Default for SharedScanMode {
    fn default() -> Self {
        Self::new()
    }
}

/// The state for a single, active scanning connection.
pub struct ScanConnection {
    pub staff: StaffIdentity,
    pub day: DayKey,
    pub camera: Option<CameraInfo>,
    pub mode: SharedScanMode,
    /// Cancels an in-flight capture when the client stops or disconnects.
    pub cancellation_token: CancellationToken,
}

impl ScanConnection {
    pub fn new(staff: StaffIdentity, day: DayKey, camera: Option<CameraInfo>) -> Self {
        Self {
            staff,
            day,
            camera,
            mode: SharedScanMode::new(),
            cancellation_token: CancellationToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_capture_at_a_time() {
        let mode = SharedScanMode::new();
        assert_eq!(mode.begin_capture(), Ok(()));
        assert_eq!(mode.clone().begin_capture(), Err(ScanMode::Capturing));

        mode.finish_capture();
        assert_eq!(mode.get(), ScanMode::Ready);
        assert_eq!(mode.begin_capture(), Ok(()));
    }

    #[test]
    fn stopped_is_final() {
        let mode = SharedScanMode::new();
        mode.begin_capture().unwrap();
        mode.stop();
        mode.finish_capture();
        assert_eq!(mode.get(), ScanMode::Stopped);
        assert_eq!(mode.begin_capture(), Err(ScanMode::Stopped));
    }
}
