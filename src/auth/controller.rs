//! Async shell around the state machine.
//!
//! The controller executes the effects [`AuthSession::handle`] returns:
//! network calls and delays run as tasks that feed their outcome back through
//! the event channel, the countdown is started/cancelled, credentials are
//! persisted. After every dispatch the fresh [`AuthSnapshot`] is published on
//! a watch channel, so rendering subscribes to state changes instead of being
//! entangled with transition logic.

use crate::auth::api::AuthBackend;
use crate::auth::countdown::Countdown;
use crate::auth::session::{AuthEvent, AuthSession, AuthSnapshot, Effect, Notice};
use crate::auth::store::CredentialStore;
use crate::auth::AuthConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::warn;

pub struct AuthController<B: AuthBackend> {
    session: AuthSession,
    backend: Arc<B>,
    store: Option<CredentialStore>,
    countdown: Countdown,
    events_tx: mpsc::UnboundedSender<AuthEvent>,
    events_rx: mpsc::UnboundedReceiver<AuthEvent>,
    snapshot_tx: watch::Sender<AuthSnapshot>,
    redirect: Option<String>,
}

impl<B: AuthBackend> AuthController<B> {
    #[must_use]
    pub fn new(config: AuthConfig, backend: B, store: Option<CredentialStore>) -> Self {
        let session = AuthSession::new(config);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(session.snapshot());

        Self {
            session,
            backend: Arc::new(backend),
            store,
            countdown: Countdown::new(),
            events_tx,
            events_rx,
            snapshot_tx,
            redirect: None,
        }
    }

    /// Observe state changes; one snapshot per dispatched event.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.session.snapshot()
    }

    /// Where a successful login asked the client to go.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// The next internally generated event: a request completion, a countdown
    /// tick or a scheduled delay. `None` only after the controller is gone.
    pub async fn next_event(&mut self) -> Option<AuthEvent> {
        self.events_rx.recv().await
    }

    /// Apply one event and execute its effects. Returns the user-facing
    /// notices produced by the transition, in order.
    pub fn dispatch(&mut self, event: AuthEvent) -> Vec<Notice> {
        let effects = self.session.handle(event);

        let mut notices = Vec::new();
        for effect in effects {
            self.run_effect(effect, &mut notices);
        }

        self.snapshot_tx.send_replace(self.session.snapshot());
        notices
    }

    fn run_effect(&mut self, effect: Effect, notices: &mut Vec<Notice>) {
        match effect {
            Effect::Notify(notice) => notices.push(notice),
            Effect::SendCode { request, email } => {
                let backend = Arc::clone(&self.backend);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = backend.send_code(&email).await;
                    let _ = events.send(AuthEvent::SendCodeCompleted { request, result });
                });
            }
            Effect::VerifyCode {
                request,
                email,
                code,
            } => {
                let backend = Arc::clone(&self.backend);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = backend.verify_code(&email, &code).await;
                    let _ = events.send(AuthEvent::VerifyCompleted { request, result });
                });
            }
            Effect::StartCountdown { epoch, seconds } => {
                self.countdown.start(epoch, seconds, self.events_tx.clone());
            }
            Effect::CancelCountdown => self.countdown.cancel(),
            Effect::ScheduleAutoSubmit { code, delay } => {
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = events.send(AuthEvent::AutoSubmitElapsed { code });
                });
            }
            Effect::ScheduleLockoutReturn { delay } => {
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = events.send(AuthEvent::LockoutElapsed);
                });
            }
            Effect::PersistCredential(token) => {
                if let Some(store) = &self.store {
                    if let Err(err) = store.save(&token) {
                        warn!("failed to persist the session credential: {err:#}");
                    }
                }
            }
            Effect::Redirect(url) => self.redirect = Some(url),
        }
    }
}
