//! Call Session Controller
//!
//! Besitzt die [`Session`], validiert die Nummer, stößt genau einen
//! Call-Request an und lässt währenddessen den Sekunden-Ticker laufen.
//!
//! Jeder angenommene Submit und jeder Reset erhöht die Generation.
//! Ticker-Ticks und Responses tragen die Generation ihres Versuchs und
//! werden verworfen, sobald sie nicht mehr zur aktuellen passt.

use super::state::{normalize_candidate, CallStatus, Session};
use super::view::SessionView;
use crate::placement::CallPlacer;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Abstand zwischen zwei Ticks der Anzeige
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please enter a valid phone number")]
    MissingPhoneNumber,

    #[error("A call is already being placed")]
    CallInProgress,

    #[error("Session must be reset before placing another call")]
    NotIdle,
}

// ============================================================================
// EVENTS & OUTCOMES
// ============================================================================

/// Events die vom CallController ausgelöst werden
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Zustand oder Zählung hat sich geändert
    Changed(SessionView),
}

/// Ergebnis eines angenommenen Submits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Endpoint hat OK gemeldet, Session ist `success`
    Succeeded,
    /// Transport- oder Statusfehler, Session ist `error`
    Failed,
    /// Response kam nach einem Reset und wurde ignoriert
    Discarded,
}

// ============================================================================
// TICKER
// ============================================================================

/// Sekunden-Ticker eines Versuchs. Drop bricht den Task ab.
struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    fn start(
        shared: Weak<Mutex<Shared>>,
        event_tx: broadcast::Sender<SessionEvent>,
        generation: u64,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let start = Instant::now() + TICK_INTERVAL;
            let mut interval = tokio::time::interval_at(start, TICK_INTERVAL);
            loop {
                interval.tick().await;

                let Some(strong) = shared.upgrade() else {
                    break;
                };
                let mut guard = strong.lock();
                if guard.generation != generation || !guard.session.tick() {
                    break;
                }

                tracing::trace!(generation, elapsed = guard.session.elapsed_seconds(), "Tick");
                let _ = event_tx.send(SessionEvent::Changed(SessionView::from(&guard.session)));
            }
        });

        Self { handle }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// SHARED STATE
// ============================================================================

/// Alles was Ticker, Request-Task und Trigger gemeinsam verändern
struct Shared {
    session: Session,
    generation: u64,
    ticker: Option<Ticker>,
}

// ============================================================================
// CALL CONTROLLER
// ============================================================================

/// Zustandsautomat `idle → calling → success | error`, Reset zurück nach `idle`
pub struct CallController {
    shared: Arc<Mutex<Shared>>,
    placer: Arc<dyn CallPlacer>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl CallController {
    /// Erstellt einen Controller mit frischer Session
    pub fn new(placer: Arc<dyn CallPlacer>) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            shared: Arc::new(Mutex::new(Shared {
                session: Session::new(),
                generation: 0,
                ticker: None,
            })),
            placer,
            event_tx,
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Kopie der aktuellen Session
    pub fn snapshot(&self) -> Session {
        self.shared.lock().session.clone()
    }

    /// Anzeige-Zustand der aktuellen Session
    pub fn view(&self) -> SessionView {
        SessionView::from(&self.shared.lock().session)
    }

    /// Speichert den aktuellen Kandidaten aus dem Eingabefeld
    pub fn set_phone_number(&self, value: Option<String>) -> SessionView {
        let mut shared = self.shared.lock();
        shared.session.set_phone_number(value);
        self.publish(&shared.session)
    }

    /// Sendet mit der zuletzt gespeicherten Nummer ab
    pub async fn submit_current(&self) -> Result<AttemptOutcome, SessionError> {
        let candidate = self.shared.lock().session.phone_number().map(str::to_string);
        self.submit(candidate).await
    }

    /// Fordert den Anruf für `candidate` an
    ///
    /// Ohne Nummer bleibt die Session `idle` und bekommt die
    /// Validierungsmeldung. Sonst startet der Ticker, es geht genau ein
    /// Request raus und die Funktion kehrt nach dessen Auflösung zurück.
    /// Der Request läuft in einem eigenen Task weiter, auch wenn dieser
    /// Future vorher verworfen wird.
    pub async fn submit(&self, candidate: Option<String>) -> Result<AttemptOutcome, SessionError> {
        let (generation, phone_number) = self.begin_attempt(candidate)?;

        tracing::info!(generation, "Requesting call");

        let placer = Arc::clone(&self.placer);
        let shared = Arc::clone(&self.shared);
        let event_tx = self.event_tx.clone();

        let request = tokio::spawn(async move {
            let placed = match placer.place_call(&phone_number).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(generation, "Call error: {}", e);
                    false
                }
            };
            Self::finish_attempt(&shared, &event_tx, generation, placed)
        });

        match request.await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(generation, "Call placement task aborted: {}", e);
                Ok(Self::finish_attempt(
                    &self.shared,
                    &self.event_tx,
                    generation,
                    false,
                ))
            }
        }
    }

    /// Zurück zu einer frischen `idle` Session, aus jedem Zustand
    ///
    /// Stoppt den Ticker. Ein noch offener Request läuft weiter, seine
    /// Response wird aber verworfen.
    pub fn reset(&self) -> SessionView {
        let mut shared = self.shared.lock();
        shared.ticker = None;
        shared.generation += 1;
        shared.session.reset();

        tracing::info!(generation = shared.generation, "Session reset");
        self.publish(&shared.session)
    }

    // ========================================================================
    // PRIVATE METHODS
    // ========================================================================

    /// Prüft Zustand und Nummer, wechselt nach `calling`, startet den Ticker
    fn begin_attempt(&self, candidate: Option<String>) -> Result<(u64, String), SessionError> {
        let mut shared = self.shared.lock();

        match shared.session.status() {
            CallStatus::Idle => {}
            CallStatus::Calling => {
                tracing::warn!("Submit ignored, call already in progress");
                return Err(SessionError::CallInProgress);
            }
            CallStatus::Success | CallStatus::Error => return Err(SessionError::NotIdle),
        }

        let Some(phone_number) = normalize_candidate(candidate) else {
            shared.session.reject_missing_number();
            self.publish(&shared.session);
            return Err(SessionError::MissingPhoneNumber);
        };

        shared.generation += 1;
        let generation = shared.generation;

        shared.session.begin_call(phone_number.clone());
        shared.ticker = Some(Ticker::start(
            Arc::downgrade(&self.shared),
            self.event_tx.clone(),
            generation,
        ));
        self.publish(&shared.session);

        Ok((generation, phone_number))
    }

    /// Übernimmt das Ergebnis, sofern der Versuch noch aktuell ist
    fn finish_attempt(
        shared: &Mutex<Shared>,
        event_tx: &broadcast::Sender<SessionEvent>,
        generation: u64,
        placed: bool,
    ) -> AttemptOutcome {
        let mut shared = shared.lock();

        if shared.generation != generation || shared.session.status() != CallStatus::Calling {
            tracing::debug!(
                generation,
                current = shared.generation,
                "Discarding stale call placement response"
            );
            return AttemptOutcome::Discarded;
        }

        shared.ticker = None;

        let outcome = if placed {
            shared.session.succeed();
            AttemptOutcome::Succeeded
        } else {
            shared.session.fail();
            AttemptOutcome::Failed
        };

        tracing::info!(
            generation,
            elapsed = shared.session.elapsed_seconds(),
            "Call request finished: {}",
            shared.session.status()
        );
        let _ = event_tx.send(SessionEvent::Changed(SessionView::from(&shared.session)));

        outcome
    }

    /// Sendet den neuen Zustand, solange der Lock noch gehalten wird
    fn publish(&self, session: &Session) -> SessionView {
        let view = SessionView::from(session);
        let _ = self.event_tx.send(SessionEvent::Changed(view.clone()));
        view
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.ticker = None;
        shared.generation += 1;
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("CallController")
            .field("session", &shared.session)
            .field("generation", &shared.generation)
            .field("ticking", &shared.ticker.is_some())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{CALL_FAILED_MESSAGE, INVALID_PHONE_NUMBER_MESSAGE};
    use crate::placement::PlacementError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;
    use tracing_test::traced_test;

    const NUMBER: &str = "+911234567890";

    type Reply = Result<(), PlacementError>;

    /// Placer dessen Antworten der Test einzeln freigibt
    #[derive(Default)]
    struct FakePlacer {
        calls: parking_lot::Mutex<Vec<String>>,
        replies: parking_lot::Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    }

    impl FakePlacer {
        /// Nächster Request wartet bis der Sender benutzt wird
        fn gate(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().push_back(rx);
            tx
        }

        /// Nächster Request antwortet sofort
        fn respond(&self, reply: Reply) {
            let _ = self.gate().send(reply);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CallPlacer for FakePlacer {
        async fn place_call(&self, phone_number: &str) -> Result<(), PlacementError> {
            self.calls.lock().push(phone_number.to_string());
            let reply = self.replies.lock().pop_front();
            match reply {
                Some(rx) => rx
                    .await
                    .unwrap_or(Err(PlacementError::Status(StatusCode::BAD_GATEWAY))),
                None => Err(PlacementError::Status(StatusCode::SERVICE_UNAVAILABLE)),
            }
        }
    }

    fn controller() -> (Arc<CallController>, Arc<FakePlacer>) {
        let placer = Arc::new(FakePlacer::default());
        let controller = Arc::new(CallController::new(placer.clone()));
        (controller, placer)
    }

    fn spawn_submit(
        controller: &Arc<CallController>,
        number: &str,
    ) -> JoinHandle<Result<AttemptOutcome, SessionError>> {
        let controller = Arc::clone(controller);
        let number = number.to_string();
        tokio::spawn(async move { controller.submit(Some(number)).await })
    }

    /// Lässt gespawnte Tasks laufen ohne eine volle Sekunde zu verbrauchen
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_submit_without_number_stays_idle() {
        let (controller, placer) = controller();

        let result = controller.submit(None).await;

        assert_eq!(result, Err(SessionError::MissingPhoneNumber));
        let session = controller.snapshot();
        assert_eq!(session.status(), CallStatus::Idle);
        assert_eq!(session.error_message(), INVALID_PHONE_NUMBER_MESSAGE);
        assert!(placer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submit_with_empty_number_stays_idle() {
        let (controller, placer) = controller();

        let result = controller.submit(Some(String::new())).await;

        assert_eq!(result, Err(SessionError::MissingPhoneNumber));
        assert_eq!(controller.snapshot().status(), CallStatus::Idle);
        assert!(placer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_successful_call() {
        let (controller, placer) = controller();
        placer.respond(Ok(()));

        let outcome = controller.submit(Some(NUMBER.to_string())).await;

        assert_eq!(outcome, Ok(AttemptOutcome::Succeeded));
        let session = controller.snapshot();
        assert_eq!(session.status(), CallStatus::Success);
        assert!(session.error_message().is_empty());
        assert_eq!(placer.calls(), vec![NUMBER.to_string()]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_phone_number_is_not_logged() {
        let (controller, placer) = controller();
        placer.respond(Err(PlacementError::Status(StatusCode::INTERNAL_SERVER_ERROR)));

        controller.submit(Some(NUMBER.to_string())).await.unwrap();

        assert!(logs_contain("Requesting call"));
        assert!(!logs_contain(NUMBER));
    }

    #[tokio::test]
    async fn test_failed_call_shows_generic_message() {
        let (controller, placer) = controller();
        placer.respond(Err(PlacementError::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
        )));

        let outcome = controller.submit(Some(NUMBER.to_string())).await;

        assert_eq!(outcome, Ok(AttemptOutcome::Failed));
        let session = controller.snapshot();
        assert_eq!(session.status(), CallStatus::Error);
        assert_eq!(session.error_message(), CALL_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_validation_message_cleared_by_next_submit() {
        let (controller, placer) = controller();
        let _ = controller.submit(None).await;
        placer.respond(Ok(()));

        controller.submit(Some(NUMBER.to_string())).await.unwrap();

        assert!(controller.snapshot().error_message().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_counts_seconds_while_calling() {
        let (controller, placer) = controller();
        let gate = placer.gate();

        let submit = spawn_submit(&controller, NUMBER);
        settle().await;
        assert_eq!(controller.snapshot().status(), CallStatus::Calling);
        assert_eq!(controller.snapshot().elapsed_seconds(), 0);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(controller.snapshot().elapsed_seconds(), 3);
        assert_eq!(controller.view().button_label, "Calling... 3s");

        gate.send(Ok(())).unwrap();
        assert_eq!(submit.await.unwrap(), Ok(AttemptOutcome::Succeeded));

        // Ticker ist gestoppt
        tokio::time::sleep(Duration::from_secs(5)).await;
        let session = controller.snapshot();
        assert_eq!(session.status(), CallStatus::Success);
        assert_eq!(session.elapsed_seconds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stops_on_failure() {
        let (controller, placer) = controller();
        let gate = placer.gate();

        let submit = spawn_submit(&controller, NUMBER);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        gate.send(Err(PlacementError::Status(StatusCode::INTERNAL_SERVER_ERROR)))
            .unwrap();
        assert_eq!(submit.await.unwrap(), Ok(AttemptOutcome::Failed));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(controller.snapshot().elapsed_seconds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_submit_is_rejected() {
        let (controller, placer) = controller();
        let gate = placer.gate();

        let first = spawn_submit(&controller, NUMBER);
        settle().await;

        let second = controller.submit(Some("+441234567890".to_string())).await;
        assert_eq!(second, Err(SessionError::CallInProgress));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        // Ein zweiter Ticker würde doppelt zählen
        assert_eq!(controller.snapshot().elapsed_seconds(), 2);
        assert_eq!(controller.snapshot().phone_number(), Some(NUMBER));

        gate.send(Ok(())).unwrap();
        assert_eq!(first.await.unwrap(), Ok(AttemptOutcome::Succeeded));
        assert_eq!(placer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submits_issue_one_request() {
        let (controller, placer) = controller();
        placer.respond(Ok(()));
        placer.respond(Ok(()));

        let (a, b) = futures::join!(
            controller.submit(Some(NUMBER.to_string())),
            controller.submit(Some(NUMBER.to_string())),
        );

        assert_eq!(a, Ok(AttemptOutcome::Succeeded));
        assert_eq!(b, Err(SessionError::CallInProgress));
        assert_eq!(placer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_from_terminal_state_requires_reset() {
        let (controller, placer) = controller();
        placer.respond(Ok(()));
        controller.submit(Some(NUMBER.to_string())).await.unwrap();

        let again = controller.submit(Some(NUMBER.to_string())).await;

        assert_eq!(again, Err(SessionError::NotIdle));
        assert_eq!(controller.snapshot().status(), CallStatus::Success);
        assert_eq!(placer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_from_every_state() {
        let (controller, placer) = controller();

        // idle mit Validierungsmeldung
        let _ = controller.submit(None).await;
        controller.reset();
        assert_eq!(controller.snapshot(), Session::new());

        // success
        placer.respond(Ok(()));
        controller.submit(Some(NUMBER.to_string())).await.unwrap();
        controller.reset();
        assert_eq!(controller.snapshot(), Session::new());

        // error
        placer.respond(Err(PlacementError::Status(StatusCode::NOT_FOUND)));
        controller.submit(Some(NUMBER.to_string())).await.unwrap();
        controller.reset();
        assert_eq!(controller.snapshot(), Session::new());

        // reset ist idempotent
        let view = controller.reset();
        assert_eq!(view.status, CallStatus::Idle);
        assert_eq!(view.phone_number, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_while_calling_stops_ticker_and_drops_response() {
        let (controller, placer) = controller();
        let gate = placer.gate();

        let submit = spawn_submit(&controller, NUMBER);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(controller.snapshot().elapsed_seconds(), 2);

        controller.reset();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(controller.snapshot(), Session::new());

        gate.send(Ok(())).unwrap();
        assert_eq!(submit.await.unwrap(), Ok(AttemptOutcome::Discarded));
        assert_eq!(controller.snapshot(), Session::new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_does_not_touch_new_attempt() {
        let (controller, placer) = controller();
        let first_gate = placer.gate();
        let second_gate = placer.gate();

        let first = spawn_submit(&controller, NUMBER);
        settle().await;
        controller.reset();

        let second = spawn_submit(&controller, "+441234567890");
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // Alte Response kommt zuerst an
        first_gate.send(Ok(())).unwrap();
        assert_eq!(first.await.unwrap(), Ok(AttemptOutcome::Discarded));

        let session = controller.snapshot();
        assert_eq!(session.status(), CallStatus::Calling);
        assert_eq!(session.phone_number(), Some("+441234567890"));
        assert_eq!(session.elapsed_seconds(), 1);

        second_gate
            .send(Err(PlacementError::Status(StatusCode::INTERNAL_SERVER_ERROR)))
            .unwrap();
        assert_eq!(second.await.unwrap(), Ok(AttemptOutcome::Failed));
        assert_eq!(controller.snapshot().status(), CallStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_attempt_starts_counting_at_zero() {
        let (controller, placer) = controller();
        let gate = placer.gate();

        let first = spawn_submit(&controller, NUMBER);
        tokio::time::sleep(Duration::from_millis(4500)).await;
        gate.send(Ok(())).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(controller.snapshot().elapsed_seconds(), 4);

        controller.reset();
        let gate = placer.gate();
        let second = spawn_submit(&controller, "+441234567890");
        settle().await;
        assert_eq!(controller.snapshot().elapsed_seconds(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.snapshot().elapsed_seconds(), 1);

        gate.send(Ok(())).unwrap();
        second.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_submit_current_uses_stored_number() {
        let (controller, placer) = controller();
        placer.respond(Ok(()));

        controller.set_phone_number(Some(NUMBER.to_string()));
        let outcome = controller.submit_current().await;

        assert_eq!(outcome, Ok(AttemptOutcome::Succeeded));
        assert_eq!(placer.calls(), vec![NUMBER.to_string()]);
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let (controller, placer) = controller();
        let mut events = controller.subscribe();
        placer.respond(Ok(()));

        controller.submit(Some(NUMBER.to_string())).await.unwrap();

        let SessionEvent::Changed(calling) = events.recv().await.unwrap();
        assert_eq!(calling.status, CallStatus::Calling);
        assert_eq!(calling.button_label, "Calling... 0s");

        let SessionEvent::Changed(done) = events.recv().await.unwrap();
        assert_eq!(done.status, CallStatus::Success);
        assert!(done.show_success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_published() {
        let (controller, placer) = controller();
        let gate = placer.gate();
        let mut events = controller.subscribe();

        let submit = spawn_submit(&controller, NUMBER);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        gate.send(Ok(())).unwrap();
        submit.await.unwrap().unwrap();

        let mut elapsed = Vec::new();
        while let Ok(SessionEvent::Changed(view)) = events.try_recv() {
            elapsed.push((view.status, view.elapsed_seconds));
        }
        assert_eq!(
            elapsed,
            vec![
                (CallStatus::Calling, 0),
                (CallStatus::Calling, 1),
                (CallStatus::Calling, 2),
                (CallStatus::Success, 2),
            ]
        );
    }
}
