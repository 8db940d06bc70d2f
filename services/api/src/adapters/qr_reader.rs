//! services/api/src/adapters/qr_reader.rs
//!
//! This module contains the QR code decoder. It implements the `FrameDecoder`
//! port from the `core` crate using `rqrr`, and converts uploaded images into
//! frames with the `image` crate.

use checkin_core::ports::FrameDecoder;
use checkin_core::scanner::{DecodeStrategy, Frame, ScanError};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Decodes QR codes from RGBA frames with `rqrr`.
///
/// * `Auto` hands the luma plane to rqrr's own adaptive binarizer.
/// * `DontInvert` pre-binarizes with a global midpoint threshold, dark modules stay dark.
/// * `OnlyInvert` flips the luma plane so light-on-dark codes read as dark-on-light.
#[derive(Clone, Copy, Debug, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn scan_luma<F>(width: usize, height: usize, pixel: F) -> Option<String>
where
    F: FnMut(usize, usize) -> u8,
{
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, pixel);
    prepared.detect_grids().into_iter().find_map(|grid| match grid.decode() {
        Ok((_meta, content)) => Some(content),
        Err(e) => {
            debug!("QR grid found but not decodable: {:?}", e);
            None
        }
    })
}

//=========================================================================================
// `FrameDecoder` Trait Implementation
//=========================================================================================

impl FrameDecoder for RqrrDecoder {
    fn decode(&self, frame: &Frame, strategy: DecodeStrategy) -> Option<String> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let luma = frame.luma();
        let at = |x: usize, y: usize| luma[y * width + x];

        match strategy {
            DecodeStrategy::Auto => scan_luma(width, height, at),
            DecodeStrategy::DontInvert => {
                let (lo, hi) = luma
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                let threshold = ((lo as u16 + hi as u16) / 2) as u8;
                scan_luma(width, height, |x, y| if at(x, y) <= threshold { 0 } else { 255 })
            }
            DecodeStrategy::OnlyInvert => scan_luma(width, height, |x, y| 255 - at(x, y)),
        }
    }
}

/// Decodes an uploaded PNG/JPEG into an RGBA frame.
pub fn frame_from_image_bytes(bytes: &[u8]) -> Result<Frame, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::EmptyFrame);
    }
    let rgba = image::load_from_memory(bytes)
        .map_err(|e| ScanError::UnreadableImage(e.to_string()))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    Frame::new(width, height, rgba.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frames_contain_no_code() {
        let frame = Frame::new(64, 64, vec![255; 64 * 64 * 4]).unwrap();
        for strategy in DecodeStrategy::ORDER {
            assert_eq!(RqrrDecoder::new().decode(&frame, strategy), None);
        }
    }

    #[test]
    fn garbage_uploads_are_unreadable() {
        assert!(matches!(
            frame_from_image_bytes(b"definitely not a png"),
            Err(ScanError::UnreadableImage(_))
        ));
        assert_eq!(frame_from_image_bytes(&[]), Err(ScanError::EmptyFrame));
    }
}
