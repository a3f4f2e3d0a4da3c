//! Student check-in: decoded QR payload → server validation → device
//! location → submission.
//!
//! One attempt walks `Idle → Scanning → Validating → LocatingDevice →
//! Submitting → Succeeded | Failed`. The camera may deliver the same code
//! many times per second; only the decode that *claims* the `Scanning`
//! state starts an attempt, every other decode is dropped.
//!
//! Cancellation bumps an epoch broadcast over a `watch` channel. In-flight
//! waits race against it, and any late result carrying an old ticket is
//! discarded without touching the phase.
use std::future::Future;
use std::sync::Arc;

use common::logger::{TraceId, attempt_span, warn_if_slow};
use gateway::types::{AttendanceRecord, AttendanceSubmission};
use gateway::{AttendanceApi, ClientError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, warn};

use crate::biometrics::BiometricSource;
use crate::config::FlowConfig;
use crate::location::{Geolocator, LocationError, locate};
use crate::outbox::Outbox;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Validating,
    LocatingDevice,
    Submitting,
    Succeeded(Box<AttendanceRecord>),
    Failed(ScanFailure),
}

impl ScanPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanPhase::Succeeded(_) | ScanPhase::Failed(_))
    }

    fn in_flight(&self) -> bool {
        matches!(
            self,
            ScanPhase::Validating | ScanPhase::LocatingDevice | ScanPhase::Submitting
        )
    }
}

/// Why an attempt ended without a recorded check-in. The `Display` text is
/// what the user is shown.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanFailure {
    #[error("camera permission is required to scan attendance codes")]
    PermissionsDenied,

    #[error("invalid or expired QR code")]
    InvalidQr,

    #[error("{0}")]
    Validation(String),

    #[error("could not get your location: {0}")]
    Location(String),

    #[error("timed out waiting for your location")]
    LocationTimeout,

    #[error("face check unavailable: {0}")]
    Biometrics(String),

    #[error("you appear to be offline; your attendance was queued and will be synced later")]
    Queued,

    #[error("your session has expired; please log in again")]
    SessionExpired,

    #[error("{0}")]
    Rejected(String),
}

impl ScanFailure {
    pub fn requires_login(&self) -> bool {
        matches!(self, ScanFailure::SessionExpired)
    }

    fn from_client(err: &ClientError) -> Self {
        match err {
            ClientError::SessionExpired => ScanFailure::SessionExpired,
            ClientError::Validation(msg) => ScanFailure::Validation(msg.clone()),
            other => ScanFailure::Rejected(other.to_string()),
        }
    }
}

impl From<LocationError> for ScanFailure {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::Timeout => ScanFailure::LocationTimeout,
            other => ScanFailure::Location(other.to_string()),
        }
    }
}

/// Proof that the holder owns the current attempt. Stale once the machine is
/// cancelled or a newer attempt is claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    attempt: u64,
    epoch: u64,
}

impl Ticket {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

struct Inner {
    phase: ScanPhase,
    attempt: u64,
}

/// The check-in state machine. All transitions happen under one lock.
pub struct ScanMachine {
    inner: Mutex<Inner>,
    epoch: watch::Sender<u64>,
}

impl Default for ScanMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanMachine {
    pub fn new() -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner {
                phase: ScanPhase::Idle,
                attempt: 0,
            }),
            epoch,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.inner.lock().phase.clone()
    }

    /// `Idle → Scanning` once the camera permission is granted. A denial
    /// leaves the machine idle.
    pub fn begin_scanning(&self, permission_granted: bool) -> Result<(), ScanFailure> {
        if !permission_granted {
            warn!(target: "scan", "camera permission denied");
            return Err(ScanFailure::PermissionsDenied);
        }

        let mut inner = self.inner.lock();
        if inner.phase == ScanPhase::Idle {
            inner.phase = ScanPhase::Scanning;
            debug!(target: "scan", "scanning");
        }
        Ok(())
    }

    /// Atomically moves `Scanning → Validating` for a non-empty payload and
    /// hands out the ticket for the new attempt. Returns `None` in any other
    /// phase.
    pub fn claim(&self, payload: &str) -> Option<Ticket> {
        if payload.trim().is_empty() {
            return None;
        }

        let mut inner = self.inner.lock();
        if inner.phase != ScanPhase::Scanning {
            return None;
        }

        inner.phase = ScanPhase::Validating;
        inner.attempt += 1;
        Some(Ticket {
            attempt: inner.attempt,
            epoch: *self.epoch.borrow(),
        })
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        let inner = self.inner.lock();
        self.owns(&inner, ticket)
    }

    /// Applies `next` if `ticket` still owns an in-flight attempt.
    pub fn advance(&self, ticket: Ticket, next: ScanPhase) -> bool {
        let mut inner = self.inner.lock();
        if !self.owns(&inner, ticket) {
            debug!(target: "scan", attempt = ticket.attempt, "dropping result for stale attempt");
            return false;
        }

        inner.phase = next;
        true
    }

    /// "Scan again": terminal → `Scanning`. No-op otherwise.
    pub fn reset(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.phase.is_terminal() {
            return false;
        }
        inner.phase = ScanPhase::Scanning;
        true
    }

    /// Abandons whatever is in flight and returns to `Idle`.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        inner.phase = ScanPhase::Idle;
        self.epoch.send_modify(|epoch| *epoch += 1);
        debug!(target: "scan", attempt = inner.attempt, "scan cancelled");
    }

    /// Resolves once `ticket` has been cancelled.
    pub async fn cancelled(&self, ticket: Ticket) {
        let mut rx = self.epoch.subscribe();
        // The sender lives as long as `self`, so this only returns on a bump.
        let _ = rx.wait_for(|epoch| *epoch != ticket.epoch).await;
    }

    fn owns(&self, inner: &Inner, ticket: Ticket) -> bool {
        inner.attempt == ticket.attempt
            && *self.epoch.borrow() == ticket.epoch
            && inner.phase.in_flight()
    }
}

/// What happened to one decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Another attempt owns the machine, or the payload was empty.
    Ignored,
    /// The attempt was cancelled before it finished.
    Cancelled,
    /// The attempt reached this terminal phase.
    Finished(ScanPhase),
}

/// Drives attempts through the [`ScanMachine`].
#[derive(Clone)]
pub struct ScanFlow {
    api: Arc<dyn AttendanceApi>,
    locator: Arc<dyn Geolocator>,
    biometrics: Arc<dyn BiometricSource>,
    outbox: Outbox,
    machine: Arc<ScanMachine>,
    config: FlowConfig,
}

impl ScanFlow {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        locator: Arc<dyn Geolocator>,
        biometrics: Arc<dyn BiometricSource>,
        outbox: Outbox,
        config: FlowConfig,
    ) -> Self {
        Self {
            api,
            locator,
            biometrics,
            outbox,
            machine: Arc::new(ScanMachine::new()),
            config,
        }
    }

    pub fn machine(&self) -> &ScanMachine {
        &self.machine
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn phase(&self) -> ScanPhase {
        self.machine.phase()
    }

    pub fn begin_scanning(&self, permission_granted: bool) -> Result<(), ScanFailure> {
        self.machine.begin_scanning(permission_granted)
    }

    pub fn reset(&self) -> bool {
        self.machine.reset()
    }

    pub fn cancel(&self) {
        self.machine.cancel()
    }

    /// Feeds one camera decode into the machine. Safe to call concurrently;
    /// at most one call per attempt does any work.
    pub async fn on_decoded(&self, payload: &str) -> DecodeOutcome {
        let Some(ticket) = self.machine.claim(payload) else {
            return DecodeOutcome::Ignored;
        };

        let trace_id = TraceId::default();
        let span = attempt_span(ticket.attempt, &trace_id);
        self.run(ticket, payload).instrument(span).await
    }

    async fn run(&self, ticket: Ticket, payload: &str) -> DecodeOutcome {
        info!(target: "scan", "qr decoded; validating");

        let validation = match self
            .until_cancelled(ticket, self.timed("qr_validate", self.api.validate_qr(payload)))
            .await
        {
            None => return DecodeOutcome::Cancelled,
            Some(Ok(v)) => v,
            Some(Err(e)) => return self.fail(ticket, ScanFailure::from_client(&e)),
        };

        if !validation.valid {
            return self.fail(ticket, ScanFailure::InvalidQr);
        }

        let (session_id, class_id, schedule_id) = match (
            non_empty(validation.session_id),
            non_empty(validation.class_id),
            non_empty(validation.schedule_id),
        ) {
            (Some(s), Some(c), Some(sch)) => (s, c, sch),
            _ => {
                return self.fail(
                    ticket,
                    ScanFailure::Validation("QR code is missing session details".into()),
                );
            }
        };

        let span = tracing::Span::current();
        span.record("session_id", session_id.as_str());
        span.record("class_id", class_id.as_str());

        if !self.machine.advance(ticket, ScanPhase::LocatingDevice) {
            return DecodeOutcome::Cancelled;
        }

        let position = match self
            .until_cancelled(
                ticket,
                locate(self.locator.as_ref(), self.config.location_timeout),
            )
            .await
        {
            None => return DecodeOutcome::Cancelled,
            Some(Ok(p)) => p,
            Some(Err(e)) => return self.fail(ticket, e.into()),
        };

        if !self.machine.advance(ticket, ScanPhase::Submitting) {
            return DecodeOutcome::Cancelled;
        }

        let sample = match self.until_cancelled(ticket, self.biometrics.capture()).await {
            None => return DecodeOutcome::Cancelled,
            Some(Ok(s)) => s,
            Some(Err(e)) => return self.fail(ticket, ScanFailure::Biometrics(e.to_string())),
        };

        let submission = AttendanceSubmission::new(
            session_id,
            class_id,
            schedule_id,
            position,
            sample.liveness_passed,
            sample.face_embedding,
        );

        let submitted = self
            .until_cancelled(
                ticket,
                self.timed("attendance_submit", self.api.submit_attendance(&submission)),
            )
            .await;

        match submitted {
            None => DecodeOutcome::Cancelled,
            Some(Ok(record)) => {
                info!(target: "scan", record_id = %record.id, "attendance recorded");
                if self
                    .machine
                    .advance(ticket, ScanPhase::Succeeded(Box::new(record)))
                {
                    DecodeOutcome::Finished(self.machine.phase())
                } else {
                    DecodeOutcome::Cancelled
                }
            }
            Some(Err(e)) if e.is_network() => {
                if !self.machine.is_current(ticket) {
                    return DecodeOutcome::Cancelled;
                }
                warn!(target: "scan", error = %e, "backend unreachable; queueing check-in");
                self.outbox.push(submission);
                self.fail(ticket, ScanFailure::Queued)
            }
            Some(Err(e)) => self.fail(ticket, ScanFailure::from_client(&e)),
        }
    }

    fn fail(&self, ticket: Ticket, failure: ScanFailure) -> DecodeOutcome {
        warn!(target: "scan", reason = %failure, "scan attempt failed");
        if self.machine.advance(ticket, ScanPhase::Failed(failure.clone())) {
            DecodeOutcome::Finished(ScanPhase::Failed(failure))
        } else {
            DecodeOutcome::Cancelled
        }
    }

    async fn until_cancelled<F: Future>(&self, ticket: Ticket, fut: F) -> Option<F::Output> {
        tokio::select! {
            out = fut => Some(out),
            _ = self.machine.cancelled(ticket) => None,
        }
    }

    async fn timed<F: Future>(&self, label: &'static str, fut: F) -> F::Output {
        warn_if_slow(label, self.config.slow_call, fut).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_requires_scanning_and_payload() {
        let machine = ScanMachine::new();
        assert!(machine.claim("token").is_none());

        machine.begin_scanning(true).unwrap();
        assert!(machine.claim("   ").is_none());

        let ticket = machine.claim("token").unwrap();
        assert_eq!(ticket.attempt(), 1);
        assert_eq!(machine.phase(), ScanPhase::Validating);
        assert!(machine.claim("token").is_none());
    }

    #[test]
    fn permission_denial_stays_idle() {
        let machine = ScanMachine::new();
        assert_eq!(
            machine.begin_scanning(false),
            Err(ScanFailure::PermissionsDenied)
        );
        assert_eq!(machine.phase(), ScanPhase::Idle);
    }

    #[test]
    fn cancel_invalidates_ticket() {
        let machine = ScanMachine::new();
        machine.begin_scanning(true).unwrap();
        let ticket = machine.claim("token").unwrap();

        machine.cancel();

        assert!(!machine.is_current(ticket));
        assert!(!machine.advance(ticket, ScanPhase::LocatingDevice));
        assert_eq!(machine.phase(), ScanPhase::Idle);
    }

    #[test]
    fn reset_only_from_terminal() {
        let machine = ScanMachine::new();
        machine.begin_scanning(true).unwrap();
        assert!(!machine.reset());

        let ticket = machine.claim("token").unwrap();
        assert!(machine.advance(ticket, ScanPhase::Failed(ScanFailure::InvalidQr)));
        assert!(!machine.advance(ticket, ScanPhase::Submitting));

        assert!(machine.reset());
        assert_eq!(machine.phase(), ScanPhase::Scanning);

        let next = machine.claim("token").unwrap();
        assert_eq!(next.attempt(), 2);
        assert!(!machine.is_current(ticket));
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let machine = Arc::new(ScanMachine::new());
        machine.begin_scanning(true).unwrap();
        let ticket = machine.claim("token").unwrap();

        let waiter = {
            let machine = machine.clone();
            tokio::spawn(async move { machine.cancelled(ticket).await })
        };
        machine.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("cancel should wake waiters")
            .unwrap();
    }

    #[test]
    fn failure_messages() {
        assert!(ScanFailure::Queued.to_string().contains("queued"));
        assert!(ScanFailure::SessionExpired.requires_login());
        assert_eq!(
            ScanFailure::from(LocationError::Timeout),
            ScanFailure::LocationTimeout
        );
        assert_eq!(
            ScanFailure::from_client(&ClientError::Api {
                message: "QR code expired".into(),
                status: 400
            }),
            ScanFailure::Rejected("QR code expired".into())
        );
    }
}
