//! crates/checkin_core/src/payload.rs
//!
//! Recognizes which shape of barcode payload a scan produced. Current codes
//! carry the bare six-character identifier; codes printed by the earlier flow
//! carry a JSON envelope that points at the registrant's storage key.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// The JSON envelope embedded by the earlier registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEnvelope {
    pub registration_id: String,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub event: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodePayload {
    /// A bare string, expected to be a short identifier.
    Bare(String),
    LegacyEnvelope(LegacyEnvelope),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Bare,
    LegacyEnvelope,
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadShape::Bare => f.write_str("bare identifier"),
            PayloadShape::LegacyEnvelope => f.write_str("legacy JSON envelope"),
        }
    }
}

impl CodePayload {
    /// Classifies a raw scan. Anything that is not a JSON object carrying a
    /// `registrationId` is treated as a bare identifier candidate.
    pub fn detect(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            if let Ok(envelope) = serde_json::from_str::<LegacyEnvelope>(trimmed) {
                return CodePayload::LegacyEnvelope(envelope);
            }
        }
        CodePayload::Bare(raw.to_string())
    }

    pub fn shape(&self) -> PayloadShape {
        match self {
            CodePayload::Bare(_) => PayloadShape::Bare,
            CodePayload::LegacyEnvelope(_) => PayloadShape::LegacyEnvelope,
        }
    }
}

/// Which payload shapes the gate accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Only bare identifiers; envelopes are recognized and refused.
    #[default]
    Bare,
    /// Bare identifiers and legacy envelopes (resolved by storage key).
    Legacy,
}

impl PayloadFormat {
    pub fn accepts(self, shape: PayloadShape) -> bool {
        match (self, shape) {
            (_, PayloadShape::Bare) => true,
            (PayloadFormat::Legacy, PayloadShape::LegacyEnvelope) => true,
            (PayloadFormat::Bare, PayloadShape::LegacyEnvelope) => false,
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bare" => Ok(PayloadFormat::Bare),
            "legacy" => Ok(PayloadFormat::Legacy),
            other => Err(format!("'{}' is not one of: bare, legacy", other)),
        }
    }
}
