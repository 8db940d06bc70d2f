//! crates/checkin_core/src/render.rs
//!
//! The output of the code renderer and its failure modes. The encoding itself
//! lives behind the `CodeRenderer` port.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Minimum rendered edge length, in pixels, for codes meant for phones and printouts.
pub const DEFAULT_MIN_SIZE: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("Cannot render an empty payload")]
    EmptyPayload,
    #[error("Barcode encoder rejected the payload: {0}")]
    Encoder(String),
    #[error("Failed to encode the barcode image: {0}")]
    Image(String),
}

/// A rendered barcode as a PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCode {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RenderedCode {
    /// The image as an embeddable `data:` URI, suitable for email bodies.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}
