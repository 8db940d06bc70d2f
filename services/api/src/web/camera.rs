//! services/api/src/web/camera.rs
//!
//! The staff client's camera, as seen through a scanning WebSocket.

use crate::adapters::frame_from_image_bytes;
use async_trait::async_trait;
use bytes::Bytes;
use checkin_core::scan_session::CameraDevice;
use checkin_core::scanner::{Frame, ScanError};
use tokio::sync::mpsc;
use tracing::debug;

/// Receives frames the client captured and uploads over the socket.
pub struct ClientCamera {
    frames: Option<mpsc::Receiver<Bytes>>,
}

impl ClientCamera {
    pub fn new(frames: mpsc::Receiver<Bytes>) -> Self {
        Self {
            frames: Some(frames),
        }
    }
}

#[async_trait]
impl CameraDevice for ClientCamera {
    async fn capture_frame(&mut self) -> Result<Frame, ScanError> {
        let frames = self
            .frames
            .as_mut()
            .ok_or_else(|| ScanError::Device("camera released".to_string()))?;

        let bytes = frames
            .recv()
            .await
            .ok_or_else(|| ScanError::Device("camera stream closed".to_string()))?;

        // Image decoding is CPU-bound; keep it off the connection's worker.
        tokio::task::spawn_blocking(move || frame_from_image_bytes(&bytes))
            .await
            .map_err(|e| ScanError::DecoderFailed(e.to_string()))?
    }

    fn release(&mut self) {
        if let Some(mut frames) = self.frames.take() {
            frames.close();
            debug!("Client camera stream closed");
        }
    }
}
