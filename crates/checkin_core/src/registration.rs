//! crates/checkin_core/src/registration.rs
//!
//! Self-registration: validate the form, mint a unique short identifier,
//! store the registrant, render their code, and send the confirmation email.

use crate::domain::{NewRegistrant, Registrant, ValidationError};
use crate::identifier::{self, ShortId};
use crate::ports::{CodeRenderer, EmailService, PortError, RegistrantStore};
use crate::render::{RenderError, RenderedCode};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default number of draws before giving up on finding an unused identifier.
pub const DEFAULT_ISSUE_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("Could not issue a unique registration ID after {0} attempts")]
    IdentifierSpaceExhausted(usize),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// A completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub registrant: Registrant,
    pub code: RenderedCode,
    pub email_sent: bool,
}

#[derive(Clone)]
pub struct RegistrationService {
    registrants: Arc<dyn RegistrantStore>,
    renderer: Arc<dyn CodeRenderer>,
    mailer: Arc<dyn EmailService>,
    issue_attempts: usize,
}

impl RegistrationService {
    pub fn new(
        registrants: Arc<dyn RegistrantStore>,
        renderer: Arc<dyn CodeRenderer>,
        mailer: Arc<dyn EmailService>,
        issue_attempts: usize,
    ) -> Self {
        Self {
            registrants,
            renderer,
            mailer,
            issue_attempts: issue_attempts.max(1),
        }
    }

    pub async fn register(&self, form: NewRegistrant) -> Result<Registration, RegistrationError> {
        let form = form.validate()?;
        let mut registrant = self.insert_unique(form, identifier::issue).await?;
        info!(key = %registrant.key, short_id = %registrant.short_id, "Registrant stored");

        let code = self.renderer.render(registrant.short_id.as_str())?;
        let email_sent = self.deliver(&mut registrant, &code).await;

        Ok(Registration {
            registrant,
            code,
            email_sent,
        })
    }

    /// Sends the confirmation email again. Returns whether it went out.
    pub async fn resend_confirmation(&self, key: Uuid) -> Result<bool, RegistrationError> {
        let mut registrant = self.registrants.get_registrant(key).await?;
        let code = self.renderer.render(registrant.short_id.as_str())?;
        Ok(self.deliver(&mut registrant, &code).await)
    }

    /// The rendered code of an existing registrant.
    pub async fn code_for(&self, key: Uuid) -> Result<RenderedCode, RegistrationError> {
        let registrant = self.registrants.get_registrant(key).await?;
        Ok(self.renderer.render(registrant.short_id.as_str())?)
    }

    /// Draws identifiers and inserts until the store accepts one.
    ///
    /// The store enforces short ID uniqueness and answers a collision with
    /// `Conflict`, which costs one attempt.
    async fn insert_unique(
        &self,
        form: NewRegistrant,
        mut draw: impl FnMut() -> ShortId,
    ) -> Result<Registrant, RegistrationError> {
        for attempt in 1..=self.issue_attempts {
            let candidate = draw();
            match self
                .registrants
                .insert_registrant(form.clone(), candidate.clone())
                .await
            {
                Ok(registrant) => return Ok(registrant),
                Err(PortError::Conflict(_)) => {
                    warn!(%candidate, attempt, "Issued short ID collides with an existing registration")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(RegistrationError::IdentifierSpaceExhausted(self.issue_attempts))
    }

    // A failed email never fails the registration itself.
    async fn deliver(&self, registrant: &mut Registrant, code: &RenderedCode) -> bool {
        if let Err(e) = self.mailer.send_confirmation(registrant, code).await {
            error!(key = %registrant.key, "Failed to send confirmation email: {:?}", e);
            return false;
        }
        let sent_at = Utc::now();
        if let Err(e) = self.registrants.mark_email_sent(registrant.key, sent_at).await {
            error!(key = %registrant.key, "Email sent but status update failed: {:?}", e);
        } else {
            registrant.email_sent = true;
            registrant.email_sent_at = Some(sent_at);
        }
        true
    }
}
