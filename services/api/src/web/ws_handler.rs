//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a live scanning connection.
//! The staff page streams one captured frame per `capture` request; the server
//! decodes it, verifies the code and answers with the outcome.

use crate::web::{
    camera::ClientCamera,
    protocol::{ClientMessage, ServerMessage},
    rest::VerificationResponse,
    state::{AppState, ScanConnection, ScanMode, SharedScanMode},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use bytes::Bytes;
use checkin_core::domain::StaffIdentity;
use checkin_core::scan_session::{preferred_camera, ScanSession};
use checkin_core::scanner::ScanError;
use futures::{
    stream::{SplitSink, SplitStream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffIdentity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, staff))
}

/// Serializes and sends one message. Returns `false` once the client is gone.
async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {:?}", e);
            return true;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, staff: StaffIdentity) {
    info!(staff = %staff.email, "New scanning connection established");

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let mut connection = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init { day, cameras }) => {
                let camera = preferred_camera(&cameras).cloned();
                ScanConnection::new(staff, day, camera)
            }
            Ok(_) => {
                error!("First message was not an Init message.");
                let err = ServerMessage::Error {
                    message: "The first message must be `init`.".to_string(),
                };
                send_message(&ws_sender, &err).await;
                return;
            }
            Err(e) => {
                error!("Invalid Init message: {}", e);
                let err = ServerMessage::Error {
                    message: format!("Invalid init message: {}", e),
                };
                send_message(&ws_sender, &err).await;
                return;
            }
        },
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    let ready = ServerMessage::SessionReady {
        day: connection.day,
        camera: connection.camera.as_ref().map(|c| c.label.clone()),
    };
    if !send_message(&ws_sender, &ready).await {
        error!("Failed to send session ready message.");
        return;
    }

    // --- 2. Wire the client camera and the control channel ---
    let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(1);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<ClientMessage>();
    let reader_task = tokio::spawn(read_client(
        receiver,
        ws_sender.clone(),
        control_tx,
        frame_tx,
        connection.mode.clone(),
        connection.cancellation_token.clone(),
    ));

    let mut session = ScanSession::new(ClientCamera::new(frame_rx), app_state.reader.clone());

    // --- 3. Main Message Loop ---
    while let Some(msg) = control_rx.recv().await {
        match msg {
            ClientMessage::Capture => {
                let keep_going = capture_once(&app_state, &mut session, &connection, &ws_sender).await;
                if !keep_going {
                    break;
                }
            }
            ClientMessage::SelectDay { day } => {
                info!(%day, "Scanning day changed");
                connection.day = day;
                if !send_message(&ws_sender, &ServerMessage::DayChanged { day }).await {
                    break;
                }
            }
            ClientMessage::Stop => {
                info!("Stop message received.");
                break;
            }
            ClientMessage::Init { .. } => {
                warn!("Received subsequent Init message, which is ignored.");
            }
        }
    }

    // --- 4. Cleanup ---
    session.stop();
    connection.mode.stop();
    connection.cancellation_token.cancel();
    send_message(
        &ws_sender,
        &ServerMessage::Stopped {
            attempts: session.attempts(),
        },
    )
    .await;
    reader_task.abort();
    info!(
        staff = %connection.staff.email,
        attempts = session.attempts(),
        "Scanning connection closed."
    );
}

/// Runs one capture-decode-verify cycle. Returns `false` when the session is over.
async fn capture_once(
    app_state: &Arc<AppState>,
    session: &mut ScanSession<ClientCamera>,
    connection: &ScanConnection,
    ws_sender: &WsSender,
) -> bool {
    let token = connection.cancellation_token.clone();
    let result = tokio::select! {
        _ = token.cancelled() => None,
        result = session.trigger() => Some(result),
    };
    let Some(result) = result else {
        info!("Capture cancelled.");
        return false;
    };

    let attempt = session.attempts();
    let reply = match result {
        Ok(decoded) => {
            let outcome = app_state
                .verifier
                .verify(&decoded.payload, connection.day, &connection.staff)
                .await;
            ServerMessage::CheckinResult {
                attempt,
                strategy: decoded.strategy.to_string(),
                result: VerificationResponse::from_outcome(&outcome, connection.day),
            }
        }
        Err(ScanError::NotFound) => ServerMessage::NoCodeFound {
            attempt,
            guidance: "No QR code detected. Hold the code steady in good light and capture again, \
                       or enter the registration ID manually."
                .to_string(),
        },
        Err(ScanError::Device(reason)) => {
            error!("Camera failed: {}", reason);
            let err = ServerMessage::Error {
                message: format!("Camera error: {}. Use manual entry.", reason),
            };
            send_message(ws_sender, &err).await;
            return false;
        }
        Err(other) => ServerMessage::Error {
            message: other.to_string(),
        },
    };
    // The client may capture again as soon as it sees the reply.
    connection.mode.finish_capture();
    send_message(ws_sender, &reply).await
}

/// Splits the socket into control messages and captured frames.
///
/// A `capture` is only passed on when it can claim the connection's mode, and
/// only one frame is forwarded per claimed capture. `stop` and disconnects
/// cancel any in-flight capture.
async fn read_client(
    mut receiver: SplitStream<WebSocket>,
    ws_sender: WsSender,
    control_tx: mpsc::UnboundedSender<ClientMessage>,
    frame_tx: mpsc::Sender<Bytes>,
    mode: SharedScanMode,
    token: CancellationToken,
) {
    let mut awaiting_frame = false;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    match client_msg {
                        ClientMessage::Capture => {
                            if let Err(current) = mode.begin_capture() {
                                debug!(?current, "Refusing capture request");
                                let err = ServerMessage::Error {
                                    message: refusal(current).to_string(),
                                };
                                send_message(&ws_sender, &err).await;
                                continue;
                            }
                            awaiting_frame = true;
                        }
                        ClientMessage::Stop => {
                            mode.stop();
                            token.cancel();
                        }
                        _ => {}
                    }
                    if control_tx.send(client_msg).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to deserialize client message: {}", e),
            },
            Message::Binary(data) => {
                if !awaiting_frame {
                    debug!("Dropping frame sent without a capture request");
                    continue;
                }
                awaiting_frame = false;
                if frame_tx.try_send(data).is_err() {
                    warn!("Camera is not accepting frames; dropping capture");
                }
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    token.cancel();
}

fn refusal(mode: ScanMode) -> &'static str {
    match mode {
        ScanMode::Capturing => "A capture is already in progress. Wait for its result.",
        ScanMode::Stopped => "Scanning has stopped. Reconnect to scan again.",
        ScanMode::Ready => "Capture refused.",
    }
}
