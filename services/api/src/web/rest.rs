//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::frame_from_image_bytes;
use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use checkin_core::domain::{
    AttendanceRecord, DailyAttendance, DayKey, EventDays, NewRegistrant, Registrant, StaffIdentity,
};
use checkin_core::gate::VerificationOutcome;
use checkin_core::ports::PortError;
use checkin_core::registration::RegistrationError;
use checkin_core::reports;
use checkin_core::scanner::ScanError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        register_handler,
        list_registrations_handler,
        count_registrations_handler,
        registration_code_handler,
        resend_email_handler,
        grant_day_handler,
        verify_handler,
        scan_upload_handler,
        attendance_summary_handler,
        daily_attendance_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(
            RegistrationRequest,
            EventDaysBody,
            RegistrationResponse,
            RegistrantResponse,
            CountResponse,
            ResendResponse,
            VerifyRequest,
            VerificationResponse,
            RegistrantSummary,
            ScanResponse,
            DailyAttendanceResponse,
            AttendanceRecordResponse,
            SignupRequest,
            LoginRequest,
            AuthResponse,
        )
    ),
    tags(
        (name = "Expo Check-in API", description = "Registration, QR check-in and attendance endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Which of the five event days a registrant selected.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventDaysBody {
    #[serde(default)]
    pub wed_sept3: bool,
    #[serde(default)]
    pub thurs_sept4: bool,
    #[serde(default)]
    pub fri_sept5: bool,
    #[serde(default)]
    pub sat_sept6: bool,
    #[serde(default)]
    pub sun_sept7: bool,
    #[serde(default)]
    pub not_attending: bool,
}

impl From<EventDaysBody> for EventDays {
    fn from(body: EventDaysBody) -> Self {
        EventDays {
            wed_sept3: body.wed_sept3,
            thurs_sept4: body.thurs_sept4,
            fri_sept5: body.fri_sept5,
            sat_sept6: body.sat_sept6,
            sun_sept7: body.sun_sept7,
            not_attending: body.not_attending,
        }
    }
}

impl From<EventDays> for EventDaysBody {
    fn from(days: EventDays) -> Self {
        EventDaysBody {
            wed_sept3: days.wed_sept3,
            thurs_sept4: days.thurs_sept4,
            fri_sept5: days.fri_sept5,
            sat_sept6: days.sat_sept6,
            sun_sept7: days.sun_sept7,
            not_attending: days.not_attending,
        }
    }
}

/// The self-registration form.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: String,
    pub designation: String,
    pub contact_number: String,
    pub event_days: EventDaysBody,
}

impl From<RegistrationRequest> for NewRegistrant {
    fn from(req: RegistrationRequest) -> Self {
        NewRegistrant {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            institution: req.institution,
            designation: req.designation,
            contact_number: req.contact_number,
            event_days: req.event_days.into(),
        }
    }
}

/// The response payload sent after a successful registration.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub key: Uuid,
    pub short_id: String,
    pub full_name: String,
    /// The QR code as a `data:image/png;base64,` URI.
    pub qr_code: String,
    pub email_sent: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantResponse {
    pub key: Uuid,
    pub short_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: String,
    pub designation: String,
    pub contact_number: String,
    pub event_days: EventDaysBody,
    pub registered_at: DateTime<Utc>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
}

impl From<Registrant> for RegistrantResponse {
    fn from(r: Registrant) -> Self {
        Self {
            key: r.key,
            short_id: r.short_id.into_string(),
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            institution: r.institution,
            designation: r.designation,
            contact_number: r.contact_number,
            event_days: r.event_days.into(),
            registered_at: r.registered_at,
            email_sent: r.email_sent,
            email_sent_at: r.email_sent_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CountResponse {
    pub total: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResendResponse {
    pub email_sent: bool,
}

/// A manually entered or scanned code to verify for a given day.
#[derive(Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub code: String,
    /// Event day key, e.g. `wedSept3`.
    pub day: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantSummary {
    pub key: Uuid,
    pub short_id: String,
    pub full_name: String,
    pub email: String,
    pub institution: String,
    /// Registered day keys in calendar order.
    pub registered_days: Vec<String>,
}

impl From<&Registrant> for RegistrantSummary {
    fn from(r: &Registrant) -> Self {
        Self {
            key: r.key,
            short_id: r.short_id.to_string(),
            full_name: r.full_name(),
            email: r.email.clone(),
            institution: r.institution.clone(),
            registered_days: r
                .event_days
                .registered_days()
                .into_iter()
                .map(|d| d.as_str().to_string())
                .collect(),
        }
    }
}

/// The outcome of a verification, always delivered with status 200.
#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub accepted: bool,
    /// `accepted`, or the rejection category: `input`, `not_found`, `eligibility`,
    /// `duplicate`, `unavailable`.
    pub reason: String,
    pub message: String,
    pub guidance: Option<String>,
    pub day: String,
    pub registrant: Option<RegistrantSummary>,
    pub record_id: Option<Uuid>,
    pub attendance_recording_failed: bool,
    pub previous_check_ins: usize,
}

impl VerificationResponse {
    pub fn from_outcome(outcome: &VerificationOutcome, day: DayKey) -> Self {
        let message = outcome.message();
        match outcome {
            VerificationOutcome::Accepted(admission) => Self {
                accepted: true,
                reason: "accepted".to_string(),
                message,
                guidance: (admission.previous_check_ins > 0).then(|| {
                    format!(
                        "Already checked in {} time(s) today. Entry allowed.",
                        admission.previous_check_ins
                    )
                }),
                day: day.as_str().to_string(),
                registrant: Some(RegistrantSummary::from(&admission.registrant)),
                record_id: admission.record_id,
                attendance_recording_failed: admission.attendance_recording_failed,
                previous_check_ins: admission.previous_check_ins,
            },
            VerificationOutcome::Rejected(rejection) => Self {
                accepted: false,
                reason: rejection.category().as_str().to_string(),
                message,
                guidance: Some(rejection.guidance().to_string()),
                day: day.as_str().to_string(),
                registrant: rejection.registrant().map(RegistrantSummary::from),
                record_id: None,
                attendance_recording_failed: false,
                previous_check_ins: 0,
            },
        }
    }
}

/// The decoded code of an uploaded image and its verification.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub code: String,
    /// The binarization strategy that found the code.
    pub strategy: String,
    pub result: VerificationResponse,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendanceResponse {
    pub day: String,
    pub label: String,
    pub date: NaiveDate,
    pub total_attendees: u64,
}

impl From<DailyAttendance> for DailyAttendanceResponse {
    fn from(d: DailyAttendance) -> Self {
        Self {
            day: d.day.as_str().to_string(),
            label: d.label.to_string(),
            date: d.date,
            total_attendees: d.total_attendees,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordResponse {
    pub id: Uuid,
    pub registrant_key: Uuid,
    pub short_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub institution: String,
    pub event_day: String,
    pub checked_in_at: DateTime<Utc>,
    pub checked_in_by: String,
    pub raw_code: String,
}

impl From<AttendanceRecord> for AttendanceRecordResponse {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            id: r.id,
            registrant_key: r.registrant_key,
            short_id: r.short_id.into_string(),
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            institution: r.institution,
            event_day: r.event_day.as_str().to_string(),
            checked_in_at: r.checked_in_at,
            checked_in_by: r.checked_in_by,
            raw_code: r.raw_code,
        }
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, String);

fn port_error(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

fn registration_error(context: &str, e: RegistrationError) -> HandlerError {
    match e {
        RegistrationError::Invalid(reason) => (StatusCode::BAD_REQUEST, reason.to_string()),
        RegistrationError::IdentifierSpaceExhausted(_) => {
            error!("{}: {}", context, e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        RegistrationError::Render(reason) => {
            error!("{}: {}", context, reason);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
        RegistrationError::Port(port) => port_error(context, port),
    }
}

/// Parses an event day key, answering 400 for anything else.
pub(crate) fn parse_day(raw: &str) -> Result<DayKey, HandlerError> {
    raw.trim()
        .parse::<DayKey>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

//=========================================================================================
// Registration Handlers
//=========================================================================================

/// Register for the exposition.
///
/// Issues a short registration ID, renders its QR code and sends the
/// confirmation email. An email failure is reported but does not fail the request.
#[utoipa::path(
    post,
    path = "/registrations",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Registered", body = RegistrationResponse),
        (status = 400, description = "Invalid registration form"),
        (status = 503, description = "No registration ID could be issued"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegistrationRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let registration = state
        .registration
        .register(req.into())
        .await
        .map_err(|e| registration_error("Failed to register", e))?;

    let response = RegistrationResponse {
        key: registration.registrant.key,
        short_id: registration.registrant.short_id.to_string(),
        full_name: registration.registrant.full_name(),
        qr_code: registration.code.data_uri(),
        email_sent: registration.email_sent,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List all registrations, newest first.
#[utoipa::path(
    get,
    path = "/registrations",
    responses(
        (status = 200, description = "All registrations", body = [RegistrantResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_registrations_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RegistrantResponse>>, HandlerError> {
    let registrants = state
        .registrants
        .list_registrants()
        .await
        .map_err(|e| port_error("Failed to list registrations", e))?;
    Ok(Json(registrants.into_iter().map(RegistrantResponse::from).collect()))
}

/// Count registrations.
#[utoipa::path(
    get,
    path = "/registrations/count",
    responses(
        (status = 200, description = "Registration count", body = CountResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn count_registrations_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CountResponse>, HandlerError> {
    let total = state
        .registrants
        .count_registrants()
        .await
        .map_err(|e| port_error("Failed to count registrations", e))?;
    Ok(Json(CountResponse { total }))
}

/// Download a registrant's QR code as PNG.
#[utoipa::path(
    get,
    path = "/registrations/{key}/code",
    params(("key" = Uuid, Path, description = "Registrant storage key")),
    responses(
        (status = 200, description = "QR code image", content_type = "image/png"),
        (status = 404, description = "Unknown registrant")
    )
)]
pub async fn registration_code_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let code = state
        .registration
        .code_for(key)
        .await
        .map_err(|e| registration_error("Failed to render QR code", e))?;

    let disposition = format!("attachment; filename=\"registration-{}.png\"", key);
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        code.png,
    ))
}

/// Send the confirmation email again.
#[utoipa::path(
    post,
    path = "/registrations/{key}/resend-email",
    params(("key" = Uuid, Path, description = "Registrant storage key")),
    responses(
        (status = 200, description = "Delivery attempted", body = ResendResponse),
        (status = 404, description = "Unknown registrant")
    )
)]
pub async fn resend_email_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<Uuid>,
) -> Result<Json<ResendResponse>, HandlerError> {
    let email_sent = state
        .registration
        .resend_confirmation(key)
        .await
        .map_err(|e| registration_error("Failed to resend confirmation", e))?;
    Ok(Json(ResendResponse { email_sent }))
}

/// Register an attendee for an additional day at the gate.
#[utoipa::path(
    post,
    path = "/registrations/{key}/days/{day}",
    params(
        ("key" = Uuid, Path, description = "Registrant storage key"),
        ("day" = String, Path, description = "Event day key, e.g. `friSept5`")
    ),
    responses(
        (status = 200, description = "Updated registrant", body = RegistrantResponse),
        (status = 400, description = "Unknown event day"),
        (status = 404, description = "Unknown registrant")
    )
)]
pub async fn grant_day_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffIdentity>,
    Path((key, day)): Path<(Uuid, String)>,
) -> Result<Json<RegistrantResponse>, HandlerError> {
    let day = parse_day(&day)?;
    let registrant = state
        .verifier
        .grant_day(key, day, &staff)
        .await
        .map_err(|e| port_error("Failed to update event days", e))?;
    Ok(Json(registrant.into()))
}

//=========================================================================================
// Check-in Handlers
//=========================================================================================

/// Verify a typed or scanned registration code for a day.
#[utoipa::path(
    post,
    path = "/checkin/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification outcome", body = VerificationResponse),
        (status = 400, description = "Unknown event day"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffIdentity>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerificationResponse>, HandlerError> {
    let day = parse_day(&req.day)?;
    let outcome = state.verifier.verify(&req.code, day, &staff).await;
    Ok(Json(VerificationResponse::from_outcome(&outcome, day)))
}

/// Decode a QR code from an uploaded photo and verify it.
///
/// Accepts multipart/form-data with a `day` text part and an `image` file part.
#[utoipa::path(
    post,
    path = "/checkin/scan",
    request_body(content_type = "multipart/form-data", description = "`day` and a PNG/JPEG `image`."),
    responses(
        (status = 200, description = "Code read and verified", body = ScanResponse),
        (status = 400, description = "Missing part or unknown event day"),
        (status = 413, description = "Image too large"),
        (status = 422, description = "No readable QR code in the image")
    )
)]
pub async fn scan_upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffIdentity>,
    mut multipart: Multipart,
) -> Result<Json<ScanResponse>, HandlerError> {
    let mut day: Option<DayKey> = None;
    let mut image: Option<bytes::Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("day") => {
                let text = field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read day: {}", e))
                })?;
                day = Some(parse_day(&text)?);
            }
            Some("image") => {
                let data = field.bytes().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read image bytes: {}", e))
                })?;
                if data.len() > state.config.max_upload_bytes {
                    return Err((StatusCode::PAYLOAD_TOO_LARGE, "Image too large".to_string()));
                }
                image = Some(data);
            }
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let day = day.ok_or((StatusCode::BAD_REQUEST, "Missing `day` part".to_string()))?;
    let image = image.ok_or((StatusCode::BAD_REQUEST, "Missing `image` part".to_string()))?;

    let reader = state.reader.clone();
    let decoded = tokio::task::spawn_blocking(move || {
        let frame = frame_from_image_bytes(&image)?;
        reader.decode(&frame)
    })
    .await
    .map_err(|e| {
        error!("Decode task failed: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to decode image".to_string())
    })?
    .map_err(|e| match e {
        ScanError::NotFound => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "No QR code found in the image. Retake the photo or enter the ID manually."
                .to_string(),
        ),
        other => (StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
    })?;

    let outcome = state.verifier.verify(&decoded.payload, day, &staff).await;
    Ok(Json(ScanResponse {
        code: decoded.payload,
        strategy: decoded.strategy.to_string(),
        result: VerificationResponse::from_outcome(&outcome, day),
    }))
}

//=========================================================================================
// Attendance Handlers
//=========================================================================================

/// Attendee counts for all five days.
#[utoipa::path(
    get,
    path = "/attendance/summary",
    responses(
        (status = 200, description = "Per-day attendance", body = [DailyAttendanceResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn attendance_summary_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DailyAttendanceResponse>>, HandlerError> {
    let summary = reports::attendance_summary(state.attendance.as_ref())
        .await
        .map_err(|e| port_error("Failed to load attendance summary", e))?;
    Ok(Json(summary.into_iter().map(Into::into).collect()))
}

/// Everyone checked in on a day, most recent first.
#[utoipa::path(
    get,
    path = "/attendance/{day}",
    params(("day" = String, Path, description = "Event day key, e.g. `wedSept3`")),
    responses(
        (status = 200, description = "Check-ins for the day", body = [AttendanceRecordResponse]),
        (status = 400, description = "Unknown event day")
    )
)]
pub async fn daily_attendance_handler(
    State(state): State<Arc<AppState>>,
    Path(day): Path<String>,
) -> Result<Json<Vec<AttendanceRecordResponse>>, HandlerError> {
    let day = parse_day(&day)?;
    let records = reports::daily_attendance(state.attendance.as_ref(), day)
        .await
        .map_err(|e| port_error("Failed to load attendance", e))?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_core::gate::{Admission, Rejection};
    use checkin_core::identifier::ShortId;

    fn registrant() -> Registrant {
        Registrant {
            key: Uuid::new_v4(),
            short_id: ShortId::parse("Q7K2M9").unwrap(),
            first_name: "Ana".into(),
            last_name: "Reyes".into(),
            email: "ana@example.org".into(),
            institution: "UP".into(),
            designation: "Dean".into(),
            contact_number: "1".into(),
            event_days: EventDays::only(&[DayKey::WedSept3]),
            registered_at: Utc::now(),
            email_sent: true,
            email_sent_at: None,
        }
    }

    #[test]
    fn bad_day_keys_are_bad_requests() {
        assert_eq!(parse_day(" friSept5 "), Ok(DayKey::FriSept5));
        assert_eq!(parse_day("friday").unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn accepted_outcomes_carry_the_registrant() {
        let outcome = VerificationOutcome::Accepted(Admission {
            registrant: registrant(),
            day: DayKey::WedSept3,
            record_id: Some(Uuid::new_v4()),
            attendance_recording_failed: false,
            previous_check_ins: 0,
        });
        let response = VerificationResponse::from_outcome(&outcome, DayKey::WedSept3);
        assert!(response.accepted);
        assert_eq!(response.reason, "accepted");
        assert_eq!(response.guidance, None);
        assert_eq!(response.registrant.unwrap().registered_days, vec!["wedSept3"]);
    }

    #[test]
    fn rejections_carry_category_and_guidance() {
        let outcome = VerificationOutcome::Rejected(Rejection::WrongDay {
            registrant: Box::new(registrant()),
            attempted: DayKey::FriSept5,
            eligible: vec![DayKey::WedSept3],
            not_attending: false,
        });
        let response = VerificationResponse::from_outcome(&outcome, DayKey::FriSept5);
        assert!(!response.accepted);
        assert_eq!(response.reason, "eligibility");
        assert!(response.message.contains("Wednesday, September 3"));
        assert!(response.guidance.is_some());
        assert!(response.registrant.is_some());
    }

    #[test]
    fn port_errors_map_to_statuses() {
        assert_eq!(port_error("x", PortError::NotFound("gone".into())).0, StatusCode::NOT_FOUND);
        assert_eq!(port_error("x", PortError::Conflict("dup".into())).0, StatusCode::CONFLICT);
        let (status, body) = port_error("Failed to list", PortError::Unexpected("db down".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to list");
    }
}
