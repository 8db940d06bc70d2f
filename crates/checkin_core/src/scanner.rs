//! crates/checkin_core/src/scanner.rs
//!
//! The code reader. A single decode pass is unreliable under glare, skew, or
//! light-on-dark rendering, so every captured frame is tried with three
//! inversion strategies in a fixed order and the first hit wins.

use crate::ports::FrameDecoder;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("The captured frame is empty or malformed")]
    EmptyFrame,
    #[error("Could not read the uploaded image: {0}")]
    UnreadableImage(String),
    #[error("No QR code found in the frame")]
    NotFound,
    #[error("Camera unavailable: {0}")]
    Device(String),
    #[error("The decoder stopped unexpectedly: {0}")]
    DecoderFailed(String),
}

/// A captured RGBA frame, row-major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ScanError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4));
        match expected {
            Some(len) if len > 0 && len == rgba.len() => Ok(Self {
                width,
                height,
                rgba,
            }),
            _ => Err(ScanError::EmptyFrame),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Per-pixel luma (BT.601 weights), alpha ignored.
    pub fn luma(&self) -> Vec<u8> {
        self.rgba
            .chunks_exact(4)
            .map(|px| {
                let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
                (y / 1000) as u8
            })
            .collect()
    }
}

/// How a decode pass treats polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStrategy {
    /// The decoder's own defaults.
    Auto,
    /// Dark-on-light only.
    DontInvert,
    /// Light-on-dark only.
    OnlyInvert,
}

impl DecodeStrategy {
    /// The order strategies are attempted in.
    pub const ORDER: [DecodeStrategy; 3] = [
        DecodeStrategy::Auto,
        DecodeStrategy::DontInvert,
        DecodeStrategy::OnlyInvert,
    ];
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::Auto => f.write_str("auto"),
            DecodeStrategy::DontInvert => f.write_str("dont_invert"),
            DecodeStrategy::OnlyInvert => f.write_str("only_invert"),
        }
    }
}

/// A successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub payload: String,
    pub strategy: DecodeStrategy,
}

/// Runs the multi-strategy decode over one frame.
#[derive(Clone)]
pub struct CodeReader {
    decoder: Arc<dyn FrameDecoder>,
}

impl CodeReader {
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self { decoder }
    }

    pub fn decode(&self, frame: &Frame) -> Result<Decoded, ScanError> {
        for strategy in DecodeStrategy::ORDER {
            match self.decoder.decode(frame, strategy) {
                Some(payload) if !payload.is_empty() => {
                    debug!(%strategy, "QR code decoded");
                    return Ok(Decoded { payload, strategy });
                }
                _ => debug!(%strategy, "No QR code found with this strategy"),
            }
        }
        Err(ScanError::NotFound)
    }
}
