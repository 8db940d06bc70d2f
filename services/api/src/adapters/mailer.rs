//! services/api/src/adapters/mailer.rs
//!
//! This module contains the email adapter. It implements the `EmailService`
//! port by logging the confirmation email instead of delivering it.

use async_trait::async_trait;
use checkin_core::domain::Registrant;
use checkin_core::ports::{EmailService, PortResult};
use checkin_core::render::RenderedCode;
use tracing::info;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Writes confirmation emails to the log. Useful until a mail relay is configured.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

/// The subject line and plain-text body of a confirmation email.
pub fn compose_confirmation(registrant: &Registrant) -> (String, String) {
    let days: Vec<&str> = registrant
        .event_days
        .registered_days()
        .into_iter()
        .map(|day| day.label())
        .collect();
    let attendance = if days.is_empty() {
        "You indicated that you will not be attending in person.".to_string()
    } else {
        format!("You are registered for: {}.", days.join("; "))
    };

    let subject = format!("Your registration ID: {}", registrant.short_id);
    let body = format!(
        "Dear {},\n\nThank you for registering.\n\nRegistration ID: {}\n{}\n\n\
         Please present the attached QR code at the entrance for check-in.",
        registrant.full_name(),
        registrant.short_id,
        attendance
    );
    (subject, body)
}

//=========================================================================================
// `EmailService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmailService for LogMailer {
    async fn send_confirmation(&self, registrant: &Registrant, code: &RenderedCode) -> PortResult<()> {
        let (subject, body) = compose_confirmation(registrant);
        info!(
            to = %registrant.email,
            subject = %subject,
            qr_bytes = code.png.len(),
            "Simulated confirmation email"
        );
        tracing::debug!("{}", body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_core::domain::{DayKey, EventDays};
    use checkin_core::identifier::ShortId;
    use chrono::Utc;
    use uuid::Uuid;

    fn registrant(event_days: EventDays) -> Registrant {
        Registrant {
            key: Uuid::new_v4(),
            short_id: ShortId::parse("Q7K2M9").unwrap(),
            first_name: "Ana".into(),
            last_name: "Reyes".into(),
            email: "ana@example.org".into(),
            institution: "UP".into(),
            designation: "Dean".into(),
            contact_number: "1".into(),
            event_days,
            registered_at: Utc::now(),
            email_sent: false,
            email_sent_at: None,
        }
    }

    #[test]
    fn confirmation_names_the_code_and_days() {
        let (subject, body) =
            compose_confirmation(&registrant(EventDays::only(&[DayKey::FriSept5])));
        assert!(subject.contains("Q7K2M9"));
        assert!(body.contains("Dear Ana Reyes"));
        assert!(body.contains("Friday, September 5"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let declined = registrant(EventDays {
            not_attending: true,
            ..EventDays::default()
        });
        let code = RenderedCode {
            png: vec![1, 2, 3],
            width: 300,
            height: 300,
        };
        assert!(LogMailer::new().send_confirmation(&declined, &code).await.is_ok());
        assert!(compose_confirmation(&declined).1.contains("not be attending"));
    }
}
