//! crates/checkin_core/src/verifier.rs
//!
//! The verifier drives the gate state machine for one presented code:
//! format gate, registrant lookup, day eligibility, duplicate policy, and
//! attendance recording. Every run ends in an explicit accept or reject.

use crate::domain::{DayKey, Registrant, StaffIdentity};
use crate::gate::{GateEvent, GateState, LookupTarget, Rejection, VerificationOutcome};
use crate::identifier::ShortId;
use crate::payload::{CodePayload, PayloadFormat, PayloadShape};
use crate::ports::{AttendanceLog, PortError, PortResult, RegistrantStore};
use crate::recorder::AttendanceRecorder;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// What to do when a registrant has already been checked in for the day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Accept again, and report how many earlier check-ins exist.
    #[default]
    Warn,
    /// Turn the second scan away without recording it.
    Reject,
    /// Accept silently; earlier check-ins are not even looked up.
    Allow,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(DuplicatePolicy::Warn),
            "reject" => Ok(DuplicatePolicy::Reject),
            "allow" => Ok(DuplicatePolicy::Allow),
            other => Err(format!("'{}' is not one of: warn, reject, allow", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifierSettings {
    pub payload_format: PayloadFormat,
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Clone)]
pub struct Verifier {
    registrants: Arc<dyn RegistrantStore>,
    attendance: Arc<dyn AttendanceLog>,
    recorder: AttendanceRecorder,
    settings: VerifierSettings,
}

impl Verifier {
    pub fn new(
        registrants: Arc<dyn RegistrantStore>,
        attendance: Arc<dyn AttendanceLog>,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            registrants,
            recorder: AttendanceRecorder::new(attendance.clone()),
            attendance,
            settings,
        }
    }

    /// Verifies a scanned or typed code for `day` and records the check-in on acceptance.
    pub async fn verify(&self, raw: &str, day: DayKey, staff: &StaffIdentity) -> VerificationOutcome {
        let mut gate = GateState::Idle.apply(GateEvent::Submitted(raw.to_string()));

        while !gate.is_terminal() {
            let event = match &gate {
                GateState::Validating { input } => self.validate(input),
                GateState::Lookup { target } => self.lookup(target).await,
                GateState::DayCheck { registrant } => self.check_day(registrant, day).await,
                GateState::Recording { registrant, .. } => {
                    match self.recorder.record(registrant, day, staff, raw).await {
                        Ok(record_id) => GateEvent::Recorded { record_id, day },
                        Err(_) => GateEvent::RecordingFailed { day },
                    }
                }
                GateState::Idle | GateState::Accepted(_) | GateState::Rejected(_) => break,
            };
            gate = gate.apply(event);
        }

        let outcome = gate.outcome().unwrap_or_else(|| {
            VerificationOutcome::Rejected(Rejection::InvalidFormat {
                input: raw.to_string(),
            })
        });
        match &outcome {
            VerificationOutcome::Accepted(admission) => info!(
                short_id = %admission.registrant.short_id,
                %day,
                recording_failed = admission.attendance_recording_failed,
                previous_check_ins = admission.previous_check_ins,
                "Check-in accepted"
            ),
            VerificationOutcome::Rejected(rejection) => info!(
                %day,
                category = rejection.category().as_str(),
                "Check-in rejected: {}", rejection
            ),
        }
        outcome
    }

    /// On-site override: adds `day` to the registrant and clears `not_attending`.
    pub async fn grant_day(
        &self,
        registrant_key: Uuid,
        day: DayKey,
        staff: &StaffIdentity,
    ) -> PortResult<Registrant> {
        let registrant = self.registrants.grant_day(registrant_key, day).await?;
        info!(
            key = %registrant.key,
            short_id = %registrant.short_id,
            %day,
            staff = %staff.email,
            "Day granted at the gate"
        );
        Ok(registrant)
    }

    fn validate(&self, input: &str) -> GateEvent {
        match CodePayload::detect(input) {
            CodePayload::LegacyEnvelope(envelope) => {
                if self.settings.payload_format.accepts(PayloadShape::LegacyEnvelope) {
                    GateEvent::Parsed(LookupTarget::StorageKey(envelope.registration_id))
                } else {
                    GateEvent::Failed(Rejection::UnsupportedPayload {
                        shape: PayloadShape::LegacyEnvelope,
                    })
                }
            }
            CodePayload::Bare(code) => match ShortId::parse(&code) {
                Ok(short_id) => GateEvent::Parsed(LookupTarget::ShortId(short_id)),
                Err(_) => GateEvent::Failed(Rejection::InvalidFormat { input: code }),
            },
        }
    }

    async fn lookup(&self, target: &LookupTarget) -> GateEvent {
        let (code, found) = match target {
            LookupTarget::ShortId(short_id) => {
                let found = self.registrants.find_by_short_id(short_id).await.map(|matches| {
                    if matches.len() > 1 {
                        warn!(%short_id, matches = matches.len(), "Short ID is not unique, using newest registration");
                    }
                    matches.into_iter().next()
                });
                (short_id.to_string(), found)
            }
            LookupTarget::StorageKey(key) => {
                let found = match Uuid::parse_str(key) {
                    Ok(uuid) => match self.registrants.get_registrant(uuid).await {
                        Ok(registrant) => Ok(Some(registrant)),
                        Err(PortError::NotFound(_)) => Ok(None),
                        Err(e) => Err(e),
                    },
                    Err(_) => Ok(None),
                };
                (key.clone(), found)
            }
        };

        match found {
            Ok(Some(registrant)) => GateEvent::Found(registrant),
            Ok(None) => GateEvent::Failed(Rejection::NotFound { code }),
            Err(e) => {
                warn!(%code, "Registrant lookup failed: {:?}", e);
                GateEvent::Failed(Rejection::LookupFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn check_day(&self, registrant: &Registrant, day: DayKey) -> GateEvent {
        if !registrant.event_days.is_registered_for(day) {
            return GateEvent::Failed(Rejection::WrongDay {
                registrant: Box::new(registrant.clone()),
                attempted: day,
                eligible: registrant.event_days.registered_days(),
                not_attending: registrant.event_days.not_attending,
            });
        }

        if self.settings.duplicate_policy == DuplicatePolicy::Allow {
            return GateEvent::Eligible {
                previous_check_ins: 0,
            };
        }

        let earlier = match self
            .attendance
            .attendance_for_registrant(registrant.key, day)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                // The duplicate check is advisory; entry does not depend on it.
                warn!(short_id = %registrant.short_id, %day, "Duplicate check failed: {:?}", e);
                Vec::new()
            }
        };

        match (self.settings.duplicate_policy, earlier.first()) {
            (DuplicatePolicy::Reject, Some(latest)) => GateEvent::Failed(Rejection::AlreadyCheckedIn {
                registrant: Box::new(registrant.clone()),
                day,
                checked_in_at: latest.checked_in_at,
            }),
            _ => {
                if !earlier.is_empty() {
                    warn!(short_id = %registrant.short_id, %day, previous = earlier.len(), "Registrant already checked in today");
                }
                GateEvent::Eligible {
                    previous_check_ins: earlier.len(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttendanceRecord, EventDays, NewAttendanceRecord, NewRegistrant};
    use crate::gate::RejectionCategory;
    use crate::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn staff() -> StaffIdentity {
        StaffIdentity {
            user_id: Uuid::new_v4(),
            email: "door@expo.test".into(),
        }
    }

    fn form(days: &[DayKey]) -> NewRegistrant {
        NewRegistrant {
            first_name: "Ana".into(),
            last_name: "Reyes".into(),
            email: "ana@example.org".into(),
            institution: "UP Diliman".into(),
            designation: "Researcher".into(),
            contact_number: "0917".into(),
            event_days: EventDays::only(days),
        }
    }

    async fn seeded(days: &[DayKey], code: &str) -> (Arc<InMemoryStore>, Registrant) {
        let store = Arc::new(InMemoryStore::new());
        let registrant = store
            .insert_registrant(form(days), ShortId::parse(code).unwrap())
            .await
            .unwrap();
        (store, registrant)
    }

    fn verifier(store: &Arc<InMemoryStore>, settings: VerifierSettings) -> Verifier {
        Verifier::new(store.clone(), store.clone(), settings)
    }

    /// Counts lookups so the format gate can be shown to short-circuit.
    struct CountingStore {
        inner: InMemoryStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl RegistrantStore for CountingStore {
        async fn insert_registrant(&self, r: NewRegistrant, id: ShortId) -> PortResult<Registrant> {
            self.inner.insert_registrant(r, id).await
        }
        async fn get_registrant(&self, key: Uuid) -> PortResult<Registrant> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get_registrant(key).await
        }
        async fn find_by_short_id(&self, id: &ShortId) -> PortResult<Vec<Registrant>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_short_id(id).await
        }
        async fn list_registrants(&self) -> PortResult<Vec<Registrant>> {
            self.inner.list_registrants().await
        }
        async fn count_registrants(&self) -> PortResult<u64> {
            self.inner.count_registrants().await
        }
        async fn grant_day(&self, key: Uuid, day: DayKey) -> PortResult<Registrant> {
            self.inner.grant_day(key, day).await
        }
        async fn mark_email_sent(&self, key: Uuid, at: chrono::DateTime<chrono::Utc>) -> PortResult<()> {
            self.inner.mark_email_sent(key, at).await
        }
    }

    /// An attendance log whose writes always fail.
    struct BrokenLog;

    #[async_trait]
    impl AttendanceLog for BrokenLog {
        async fn append_attendance(&self, _record: NewAttendanceRecord) -> PortResult<Uuid> {
            Err(PortError::Unexpected("write quota exceeded".into()))
        }
        async fn attendance_for_day(&self, _day: DayKey) -> PortResult<Vec<AttendanceRecord>> {
            Ok(Vec::new())
        }
        async fn attendance_for_registrant(&self, _key: Uuid, _day: DayKey) -> PortResult<Vec<AttendanceRecord>> {
            Err(PortError::Unexpected("read quota exceeded".into()))
        }
        async fn count_by_day(&self) -> PortResult<Vec<(DayKey, u64)>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_without_lookup() {
        let store = Arc::new(CountingStore {
            inner: InMemoryStore::new(),
            lookups: AtomicUsize::new(0),
        });
        let verifier = Verifier::new(store.clone(), Arc::new(InMemoryStore::new()), VerifierSettings::default());

        for raw in ["abc", "TOOLONG1", "AB-123", ""] {
            let outcome = verifier.verify(raw, DayKey::WedSept3, &staff()).await;
            assert_eq!(
                outcome,
                VerificationOutcome::Rejected(Rejection::InvalidFormat { input: raw.to_string() })
            );
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_day_lists_eligible_days() {
        let (store, _) = seeded(&[DayKey::WedSept3], "Q7K2M9").await;
        let outcome = verifier(&store, VerifierSettings::default())
            .verify("Q7K2M9", DayKey::ThursSept4, &staff())
            .await;

        match outcome {
            VerificationOutcome::Rejected(Rejection::WrongDay { eligible, attempted, .. }) => {
                assert_eq!(eligible, vec![DayKey::WedSept3]);
                assert_eq!(attempted, DayKey::ThursSept4);
            }
            other => panic!("expected wrong day, got {other:?}"),
        }
        assert!(store.attendance_for_day(DayKey::ThursSept4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn eligible_registrant_is_accepted_and_recorded_once() {
        let (store, registrant) = seeded(&[DayKey::WedSept3], "Q7K2M9").await;
        let outcome = verifier(&store, VerifierSettings::default())
            .verify("Q7K2M9", DayKey::WedSept3, &staff())
            .await;

        let admission = match outcome {
            VerificationOutcome::Accepted(admission) => admission,
            other => panic!("expected acceptance, got {other:?}"),
        };
        assert!(!admission.attendance_recording_failed);
        assert_eq!(admission.previous_check_ins, 0);

        let records = store.attendance_for_day(DayKey::WedSept3).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_day, DayKey::WedSept3);
        assert_eq!(records[0].registrant_key, registrant.key);
        assert_eq!(Some(records[0].id), admission.record_id);
    }

    #[tokio::test]
    async fn lowercase_entry_is_normalized_before_lookup() {
        let (store, registrant) = seeded(&[DayKey::WedSept3], "ABC123").await;
        let outcome = verifier(&store, VerifierSettings::default())
            .verify("abc123", DayKey::WedSept3, &staff())
            .await;
        match outcome {
            VerificationOutcome::Accepted(admission) => {
                assert_eq!(admission.registrant.key, registrant.key)
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
        // The raw code is kept as typed.
        let records = store.attendance_for_day(DayKey::WedSept3).await.unwrap();
        assert_eq!(records[0].raw_code, "abc123");
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (store, _) = seeded(&[DayKey::WedSept3], "Q7K2M9").await;
        let outcome = verifier(&store, VerifierSettings::default())
            .verify("ZZZZZZ", DayKey::WedSept3, &staff())
            .await;
        assert_eq!(
            outcome,
            VerificationOutcome::Rejected(Rejection::NotFound { code: "ZZZZZZ".into() })
        );
    }

    #[tokio::test]
    async fn recording_failure_still_admits() {
        let (store, _) = seeded(&[DayKey::FriSept5], "Q7K2M9").await;
        let verifier = Verifier::new(store.clone(), Arc::new(BrokenLog), VerifierSettings::default());

        let outcome = verifier.verify("Q7K2M9", DayKey::FriSept5, &staff()).await;
        assert!(outcome.is_accepted());
        assert_eq!(
            outcome.message(),
            "Verification successful but attendance recording failed"
        );
        match outcome {
            VerificationOutcome::Accepted(admission) => {
                assert!(admission.attendance_recording_failed);
                assert_eq!(admission.record_id, None);
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_policies() {
        let (store, _) = seeded(&[DayKey::WedSept3], "Q7K2M9").await;

        let warn = verifier(&store, VerifierSettings::default());
        warn.verify("Q7K2M9", DayKey::WedSept3, &staff()).await;
        match warn.verify("Q7K2M9", DayKey::WedSept3, &staff()).await {
            VerificationOutcome::Accepted(admission) => assert_eq!(admission.previous_check_ins, 1),
            other => panic!("expected acceptance, got {other:?}"),
        }

        let reject = verifier(
            &store,
            VerifierSettings {
                duplicate_policy: DuplicatePolicy::Reject,
                ..VerifierSettings::default()
            },
        );
        let outcome = reject.verify("Q7K2M9", DayKey::WedSept3, &staff()).await;
        match &outcome {
            VerificationOutcome::Rejected(rejection) => {
                assert_eq!(rejection.category(), RejectionCategory::Duplicate)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(store.attendance_for_day(DayKey::WedSept3).await.unwrap().len(), 2);

        let allow = verifier(
            &store,
            VerifierSettings {
                duplicate_policy: DuplicatePolicy::Allow,
                ..VerifierSettings::default()
            },
        );
        match allow.verify("Q7K2M9", DayKey::WedSept3, &staff()).await {
            VerificationOutcome::Accepted(admission) => assert_eq!(admission.previous_check_ins, 0),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn legacy_envelopes_follow_the_payload_format() {
        let (store, registrant) = seeded(&[DayKey::SatSept6], "Q7K2M9").await;
        let envelope = format!(
            r#"{{"registrationId":"{}","timestamp":"2025-08-01T00:00:00Z","event":"Expo"}}"#,
            registrant.key
        );

        let strict = verifier(&store, VerifierSettings::default());
        match strict.verify(&envelope, DayKey::SatSept6, &staff()).await {
            VerificationOutcome::Rejected(Rejection::UnsupportedPayload { .. }) => {}
            other => panic!("expected unsupported payload, got {other:?}"),
        }

        let lenient = verifier(
            &store,
            VerifierSettings {
                payload_format: PayloadFormat::Legacy,
                ..VerifierSettings::default()
            },
        );
        assert!(lenient.verify(&envelope, DayKey::SatSept6, &staff()).await.is_accepted());

        let unknown = r#"{"registrationId":"not-a-key"}"#;
        assert_eq!(
            lenient.verify(unknown, DayKey::SatSept6, &staff()).await,
            VerificationOutcome::Rejected(Rejection::NotFound { code: "not-a-key".into() })
        );
    }

    #[tokio::test]
    async fn grant_day_then_verify_succeeds() {
        let (store, registrant) = seeded(&[DayKey::WedSept3], "Q7K2M9").await;
        let verifier = verifier(&store, VerifierSettings::default());

        assert!(!verifier.verify("Q7K2M9", DayKey::SunSept7, &staff()).await.is_accepted());
        let updated = verifier.grant_day(registrant.key, DayKey::SunSept7, &staff()).await.unwrap();
        assert_eq!(updated.event_days.registered_days(), vec![DayKey::WedSept3, DayKey::SunSept7]);
        assert!(verifier.verify("Q7K2M9", DayKey::SunSept7, &staff()).await.is_accepted());
    }

    #[test]
    fn duplicate_policy_parses() {
        assert_eq!("Reject".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Reject));
        assert!("block".parse::<DuplicatePolicy>().is_err());
    }
}
