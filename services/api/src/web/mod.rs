pub mod auth;
pub mod camera;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

// Re-export the handlers and state the binaries wire together.
pub use middleware::require_auth;
pub use state::{AppState, Backends};
pub use ws_handler::ws_handler;

/// Builds the full application router: public routes, then staff routes behind `require_auth`.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes + 64 * 1024;

    let public = Router::new()
        .route("/registrations", post(rest::register_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    let staff = Router::new()
        .route("/registrations", get(rest::list_registrations_handler))
        .route("/registrations/count", get(rest::count_registrations_handler))
        .route("/registrations/{key}/code", get(rest::registration_code_handler))
        .route("/registrations/{key}/resend-email", post(rest::resend_email_handler))
        .route("/registrations/{key}/days/{day}", post(rest::grant_day_handler))
        .route("/checkin/verify", post(rest::verify_handler))
        .route("/checkin/scan", post(rest::scan_upload_handler))
        .route("/attendance/summary", get(rest::attendance_summary_handler))
        .route("/attendance/{day}", get(rest::daily_attendance_handler))
        .route("/scan/ws", get(ws_handler))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    public
        .merge(staff)
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
