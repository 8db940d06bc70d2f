//! services/api/src/adapters/qr_render.rs
//!
//! This module contains the QR code renderer. It implements the `CodeRenderer`
//! port from the `core` crate using the `qrcode` and `image` crates.

use checkin_core::ports::CodeRenderer;
use checkin_core::render::{RenderError, RenderedCode};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Renders black-on-white QR codes with a quiet zone, as PNG.
#[derive(Clone, Debug)]
pub struct QrRenderer {
    min_size: u32,
}

impl QrRenderer {
    /// Creates a new `QrRenderer` producing images at least `min_size` pixels wide.
    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }

    /// Renders the payload to a greyscale image buffer.
    pub fn render_luma(&self, payload: &str) -> Result<image::GrayImage, RenderError> {
        if payload.is_empty() {
            return Err(RenderError::EmptyPayload);
        }
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
            .map_err(|e| RenderError::Encoder(e.to_string()))?;

        Ok(code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_size, self.min_size)
            .quiet_zone(true)
            .dark_color(Luma([0u8]))
            .light_color(Luma([255u8]))
            .build())
    }
}

//=========================================================================================
// `CodeRenderer` Trait Implementation
//=========================================================================================

impl CodeRenderer for QrRenderer {
    fn render(&self, payload: &str) -> Result<RenderedCode, RenderError> {
        let img = self.render_luma(payload)?;
        let (width, height) = img.dimensions();

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| RenderError::Image(e.to_string()))?;

        Ok(RenderedCode { png, width, height })
    }
}
