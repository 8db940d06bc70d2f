//! Wiring shared by the HTTP and scanning socket tests: the full router over
//! the in-memory store and the real QR adapters.

#![allow(dead_code)]

use api_lib::adapters::{LogMailer, QrRenderer, RqrrDecoder};
use api_lib::config::Config;
use api_lib::web::{router, AppState, Backends};
use axum::Router;
use checkin_core::domain::{DayKey, EventDays, NewRegistrant, Registrant};
use checkin_core::identifier::ShortId;
use checkin_core::memory::InMemoryStore;
use checkin_core::ports::{RegistrantStore, StaffDirectory};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

pub const STAFF_EMAIL: &str = "door@expo.test";
pub const SESSION_ID: &str = "gate-session";

pub fn config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn app_with(store: &Arc<InMemoryStore>, vars: &[(&str, &str)]) -> Router {
    let config = config(vars);
    let backends = Backends {
        registrants: store.clone(),
        attendance: store.clone(),
        staff: store.clone(),
        renderer: Arc::new(QrRenderer::new(config.qr_min_size)),
        decoder: Arc::new(RqrrDecoder::new()),
        mailer: Arc::new(LogMailer::new()),
    };
    router(Arc::new(AppState::new(config, backends)))
}

pub fn app(store: &Arc<InMemoryStore>) -> Router {
    app_with(store, &[])
}

/// Creates a staff account with a live session and returns the cookie header value.
pub async fn signed_in(store: &InMemoryStore) -> String {
    let user = store.create_staff(STAFF_EMAIL, "not-a-real-hash").await.unwrap();
    store
        .create_auth_session(SESSION_ID, user.user_id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    format!("session={}", SESSION_ID)
}

pub async fn seed(store: &InMemoryStore, code: &str, days: &[DayKey]) -> Registrant {
    store
        .insert_registrant(
            NewRegistrant {
                first_name: "Ana".into(),
                last_name: "Reyes".into(),
                email: "ana@example.org".into(),
                institution: "UP Diliman".into(),
                designation: "Researcher".into(),
                contact_number: "0917 000 0000".into(),
                event_days: EventDays::only(days),
            },
            ShortId::parse(code).unwrap(),
        )
        .await
        .unwrap()
}
