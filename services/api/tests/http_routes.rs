//! The REST surface through the real router: which routes need a staff
//! session, staff signup and login, and what a gate override logs.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use checkin_core::domain::DayKey;
use checkin_core::memory::InMemoryStore;
use checkin_core::ports::{AttendanceLog, RegistrantStore};
use common::{app, app_with, seed, signed_in, STAFF_EMAIL};
use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

async fn send(app: &Router, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(json) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn registration_form() -> Value {
    json!({
        "firstName": "Ana",
        "lastName": "Reyes",
        "email": "ana@example.org",
        "institution": "UP Diliman",
        "designation": "Researcher",
        "contactNumber": "0917 000 0000",
        "eventDays": { "wedSept3": true, "friSept5": true }
    })
}

#[tokio::test]
async fn staff_routes_answer_401_without_a_session() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(&store);
    let key = seed(&store, "Q7K2M9", &[DayKey::WedSept3]).await.key;

    let staff_routes = [
        (Method::GET, "/registrations".to_string(), None),
        (Method::GET, "/registrations/count".to_string(), None),
        (Method::GET, format!("/registrations/{key}/code"), None),
        (Method::POST, format!("/registrations/{key}/resend-email"), None),
        (Method::POST, format!("/registrations/{key}/days/friSept5"), None),
        (
            Method::POST,
            "/checkin/verify".to_string(),
            Some(json!({ "code": "Q7K2M9", "day": "wedSept3" })),
        ),
        (Method::GET, "/attendance/summary".to_string(), None),
        (Method::GET, "/attendance/wedSept3".to_string(), None),
        (Method::GET, "/scan/ws".to_string(), None),
    ];
    for (method, uri, body) in staff_routes {
        let response = send(&app, method.clone(), &uri, None, body.clone()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");

        let response = send(&app, method.clone(), &uri, Some("session=forged"), body).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri} with a forged cookie");
    }

    // Nothing was checked in along the way.
    assert!(store.attendance_for_day(DayKey::WedSept3).await.unwrap().is_empty());
}

#[tokio::test]
async fn registering_is_public_but_listing_is_not() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(&store);

    let response = send(&app, Method::POST, "/registrations", None, Some(registration_form())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered = json_body(response).await;
    let short_id = registered["shortId"].as_str().unwrap().to_string();
    assert_eq!(short_id.len(), 6);
    assert!(registered["qrCode"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(registered["fullName"], "Ana Reyes");

    let response = send(&app, Method::GET, "/registrations", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = signed_in(&store).await;
    let response = send(&app, Method::GET, "/registrations", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["shortId"], short_id.as_str());
    assert_eq!(listed[0]["eventDays"]["friSept5"], true);

    let response = send(&app, Method::GET, "/registrations/count", Some(&cookie), None).await;
    assert_eq!(json_body(response).await["total"], 1);
}

#[tokio::test]
async fn invalid_registrations_are_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(&store);

    let mut no_days = registration_form();
    no_days["eventDays"] = json!({});
    let response = send(&app, Method::POST, "/registrations", None, Some(no_days)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.count_registrants().await.unwrap(), 0);
}

#[tokio::test]
async fn signup_is_refused_without_the_configured_code() {
    let signup = |code: &str| {
        json!({
            "email": "Gate@Expo.test",
            "password": "correct horse",
            "signupCode": code
        })
    };

    // Unset code: signup is disabled entirely.
    let store = Arc::new(InMemoryStore::new());
    let disabled = app(&store);
    let response = send(&disabled, Method::POST, "/auth/signup", None, Some(signup("anything"))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let enabled = app_with(&store, &[("STAFF_SIGNUP_CODE", "expo-2025")]);
    let response = send(&enabled, Method::POST, "/auth/signup", None, Some(signup("expo-2024"))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&enabled, Method::POST, "/auth/signup", None, Some(signup("expo-2025"))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session="));
    assert_eq!(json_body(response).await["email"], "gate@expo.test");

    let response = send(&enabled, Method::POST, "/auth/signup", None, Some(signup("expo-2025"))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let mut short = signup("expo-2025");
    short["email"] = json!("other@expo.test");
    short["password"] = json!("short");
    let response = send(&enabled, Method::POST, "/auth/signup", None, Some(short)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_needs_the_right_password() {
    let store = Arc::new(InMemoryStore::new());
    let app = app_with(&store, &[("STAFF_SIGNUP_CODE", "expo-2025")]);
    let response = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "email": "gate@expo.test", "password": "correct horse", "signupCode": "expo-2025" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let login = |email: &str, password: &str| json!({ "email": email, "password": password });

    let response = send(&app, Method::POST, "/auth/login", None, Some(login("gate@expo.test", "battery staple"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let response = send(&app, Method::POST, "/auth/login", None, Some(login("nobody@expo.test", "correct horse"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, Method::POST, "/auth/login", None, Some(login("GATE@expo.test", "correct horse"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let response = send(&app, Method::GET, "/registrations/count", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, Method::GET, "/registrations/count", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn manual_verification_checks_in_once_signed_in() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(&store);
    let cookie = signed_in(&store).await;
    seed(&store, "Q7K2M9", &[DayKey::WedSept3]).await;

    let verify = json!({ "code": " q7k2m9 ", "day": "wedSept3" });
    let response = send(&app, Method::POST, "/checkin/verify", Some(&cookie), Some(verify)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    assert_eq!(result["accepted"], true);
    assert_eq!(result["registrant"]["shortId"], "Q7K2M9");

    let records = store.attendance_for_day(DayKey::WedSept3).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].checked_in_by, STAFF_EMAIL);

    let wrong_day = json!({ "code": "Q7K2M9", "day": "sunSept7" });
    let result = json_body(send(&app, Method::POST, "/checkin/verify", Some(&cookie), Some(wrong_day)).await).await;
    assert_eq!(result["accepted"], false);
    assert_eq!(result["reason"], "eligibility");

    let bad_day = json!({ "code": "Q7K2M9", "day": "monday" });
    let response = send(&app, Method::POST, "/checkin/verify", Some(&cookie), Some(bad_day)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn gate_override_is_logged_once_with_the_staff_member() {
    let store = Arc::new(InMemoryStore::new());
    let app = app(&store);
    let cookie = signed_in(&store).await;
    let key = seed(&store, "Z9Y8X7", &[DayKey::WedSept3]).await.key;

    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let uri = format!("/registrations/{key}/days/sunSept7");
    let response = send(&app, Method::POST, &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["eventDays"]["sunSept7"], true);

    let output = logs.contents();
    assert_eq!(output.matches("Day granted at the gate").count(), 1, "{output}");
    assert!(output.contains(STAFF_EMAIL), "{output}");
    assert!(output.contains("Z9Y8X7"), "{output}");

    let response = send(&app, Method::POST, &format!("/registrations/{key}/days/someday"), Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
