//! crates/checkin_core/src/scan_session.rs
//!
//! A live camera scanning session. Capture is manually triggered: each
//! trigger grabs exactly one frame and runs the three-strategy decode over it.
//! The session owns the camera exclusively and releases it on every exit path.

use crate::scanner::{CodeReader, Decoded, Frame, ScanError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

/// A camera the session can capture frames from.
#[async_trait]
pub trait CameraDevice: Send {
    async fn capture_frame(&mut self) -> Result<Frame, ScanError>;

    /// Gives the device back. Must be idempotent.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    Environment,
    User,
    Unknown,
}

/// A camera as advertised by the capturing client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CameraInfo {
    pub id: String,
    pub label: String,
    pub facing: CameraFacing,
}

/// Picks the camera to bind: environment-facing first, then anything labelled
/// back/rear, then whatever is first.
pub fn preferred_camera(cameras: &[CameraInfo]) -> Option<&CameraInfo> {
    cameras
        .iter()
        .find(|c| c.facing == CameraFacing::Environment)
        .or_else(|| {
            cameras.iter().find(|c| {
                let label = c.label.to_ascii_lowercase();
                label.contains("back") || label.contains("rear")
            })
        })
        .or_else(|| cameras.first())
}

pub struct ScanSession<D: CameraDevice> {
    device: Option<D>,
    reader: CodeReader,
    attempts: u32,
}

impl<D: CameraDevice> ScanSession<D> {
    pub fn new(device: D, reader: CodeReader) -> Self {
        Self {
            device: Some(device),
            reader,
            attempts: 0,
        }
    }

    /// Number of triggers so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }

    /// Captures one frame and decodes it.
    ///
    /// `NotFound` leaves the session usable for another attempt. A device
    /// error is fatal for the live path: the camera is released before returning.
    /// The decode runs on the blocking pool, so dropping the returned future
    /// (a cancelled `select!`) does not wait for the decoder to finish.
    pub async fn trigger(&mut self) -> Result<Decoded, ScanError> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| ScanError::Device("scanning has been stopped".to_string()))?;
        self.attempts += 1;

        let captured = device.capture_frame().await;
        let frame = match captured {
            Ok(frame) => frame,
            Err(ScanError::Device(reason)) => {
                warn!(attempt = self.attempts, %reason, "Camera failed, releasing device");
                self.stop();
                return Err(ScanError::Device(reason));
            }
            Err(other) => return Err(other),
        };

        let reader = self.reader.clone();
        tokio::task::spawn_blocking(move || reader.decode(&frame))
            .await
            .map_err(|e| ScanError::DecoderFailed(e.to_string()))?
    }

    /// Releases the camera. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            info!(attempts = self.attempts, "Scanning stopped, camera released");
        }
    }
}

impl<D: CameraDevice> Drop for ScanSession<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
