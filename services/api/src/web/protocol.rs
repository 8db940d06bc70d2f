//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the staff scanning page and
//! the API server for live check-in.

use crate::web::rest::VerificationResponse;
use checkin_core::domain::DayKey;
use checkin_core::scan_session::CameraInfo;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Captured frames are sent as raw Binary messages (PNG or JPEG), one per `Capture`.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the session. This must be the first message sent on the connection.
    Init {
        day: DayKey,
        #[serde(default)]
        cameras: Vec<CameraInfo>,
    },

    /// The staff member pressed capture. Exactly one binary frame follows.
    Capture,

    /// Switches the event day subsequent scans are verified against.
    SelectDay { day: DayKey },

    /// Ends scanning and releases the camera.
    Stop,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is bound to a camera and a day.
    SessionReady {
        day: DayKey,
        camera: Option<String>,
    },

    /// The captured frame held no readable code. The client may capture again.
    NoCodeFound { attempt: u32, guidance: String },

    /// A code was read and run through verification.
    CheckinResult {
        attempt: u32,
        strategy: String,
        result: VerificationResponse,
    },

    DayChanged { day: DayKey },

    /// The camera has been released.
    Stopped { attempts: u32 },

    /// Reports an error to the client, which should display it.
    Error { message: String },
}
