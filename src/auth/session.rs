//! Login flow state machine.
//!
//! [`AuthSession::handle`] is an explicit dispatch function: it consumes one
//! [`AuthEvent`], mutates the session and returns the [`Effect`]s the caller
//! must execute. No I/O happens here; rendering is a projection of
//! [`AuthSnapshot`]. Network completions and countdown ticks come back as
//! events carrying the token/epoch that started them, so a response that
//! arrives after the session moved on is dropped.

use crate::auth::api::{ApiError, SendCodeResponse, VerifyCodeResponse};
use crate::auth::countdown::{urgency, Urgency};
use crate::auth::tracker::AttemptTracker;
use crate::auth::validator::{self, ValidationError};
use crate::auth::AuthConfig;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

/// Current stage of the flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    AwaitingEmail,
    AwaitingCode,
}

/// Identifies one send/verify request. A completion is applied only when its
/// token matches the session's current in-flight token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestToken(u64);

/// Identifies one countdown instance, for the same stale-guard purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerEpoch(u64);

impl TimerEpoch {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

/// Everything that can happen to the session.
#[derive(Debug)]
pub enum AuthEvent {
    /// The email form was submitted.
    EmailSubmitted(String),
    /// The verification input changed; carries the raw field content.
    CodeInput(String),
    /// The verification form was submitted explicitly.
    CodeSubmitted(String),
    /// The auto-submit debounce elapsed for `code`.
    AutoSubmitElapsed { code: String },
    /// "Use another address" action.
    BackRequested,
    /// "Send a new code" action.
    ResendRequested,
    /// The delayed forced return after a lockout fired.
    LockoutElapsed,
    SendCodeCompleted {
        request: RequestToken,
        result: Result<SendCodeResponse, ApiError>,
    },
    VerifyCompleted {
        request: RequestToken,
        result: Result<VerifyCodeResponse, ApiError>,
    },
    CountdownTick { epoch: TimerEpoch, remaining: u64 },
    CountdownExpired { epoch: TimerEpoch },
}

/// Side effects the caller must run after a transition.
#[derive(Debug)]
pub enum Effect {
    SendCode {
        request: RequestToken,
        email: String,
    },
    VerifyCode {
        request: RequestToken,
        email: String,
        code: String,
    },
    StartCountdown {
        epoch: TimerEpoch,
        seconds: u64,
    },
    CancelCountdown,
    ScheduleAutoSubmit {
        code: String,
        delay: Duration,
    },
    ScheduleLockoutReturn {
        delay: Duration,
    },
    PersistCredential(SecretString),
    Redirect(String),
    Notify(Notice),
}

/// Severity of a user-facing notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// User-facing outcome of a transition, rendered at the edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Invalid(ValidationError),
    CodeSent { email: String },
    CodeResent,
    SendRefused { message: String },
    CodeRejected {
        message: String,
        attempts: u8,
        max_attempts: u8,
    },
    LockedOut,
    CodeExpired,
    Transport { message: String },
    LoggedIn,
}

impl Notice {
    #[must_use]
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::CodeSent { .. } | Notice::CodeResent | Notice::LoggedIn => NoticeLevel::Success,
            Notice::CodeExpired => NoticeLevel::Warning,
            Notice::Invalid(_)
            | Notice::SendRefused { .. }
            | Notice::CodeRejected { .. }
            | Notice::LockedOut
            | Notice::Transport { .. } => NoticeLevel::Error,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Invalid(reason) => write!(f, "{reason}"),
            Notice::CodeSent { email } => {
                write!(f, "A verification code was sent to {email}.")
            }
            Notice::CodeResent => f.write_str("A new verification code is on its way."),
            Notice::SendRefused { message } => f.write_str(message),
            Notice::CodeRejected {
                message,
                attempts,
                max_attempts,
            } => write!(f, "{message} ({attempts}/{max_attempts})"),
            Notice::LockedOut => {
                f.write_str("Too many failed attempts. Start over with your email address.")
            }
            Notice::CodeExpired => {
                f.write_str("The verification code expired. Request a new one.")
            }
            Notice::Transport { message } => write!(f, "Network error: {message}"),
            Notice::LoggedIn => f.write_str("Signed in."),
        }
    }
}

#[derive(Debug)]
enum PendingRequest {
    SendCode { email: String },
    Verify,
}

/// Read-only projection of the session for rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub step: Step,
    pub email: String,
    pub remaining_secs: Option<u64>,
    pub urgency: Option<Urgency>,
    pub expired: bool,
    pub locked: bool,
    /// A send/verify request is in flight; input controls are disabled.
    pub busy: bool,
    /// Verification succeeded; the flow is over for this session.
    pub finished: bool,
    pub attempts_remaining: u8,
}

/// The single auth session of a program run.
#[derive(Debug)]
pub struct AuthSession {
    config: AuthConfig,
    step: Step,
    email: String,
    remaining_secs: Option<u64>,
    expired: bool,
    locked: bool,
    finished: bool,
    pending_code: String,
    in_flight: Option<(RequestToken, PendingRequest)>,
    tracker: AttemptTracker,
    next_request: u64,
    epoch: u64,
}

impl AuthSession {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let tracker = AttemptTracker::new(config.max_attempts);
        Self {
            config,
            step: Step::AwaitingEmail,
            email: String::new(),
            remaining_secs: None,
            expired: false,
            locked: false,
            finished: false,
            pending_code: String::new(),
            in_flight: None,
            tracker,
            next_request: 0,
            epoch: 0,
        }
    }

    #[must_use]
    pub fn step(&self) -> Step {
        self.step
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn failed_attempts(&self) -> u8 {
        self.tracker.failed()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            step: self.step,
            email: self.email.clone(),
            remaining_secs: self.remaining_secs,
            urgency: self.remaining_secs.map(urgency),
            expired: self.expired,
            locked: self.locked,
            busy: self.in_flight.is_some(),
            finished: self.finished,
            attempts_remaining: self.tracker.remaining(),
        }
    }

    /// Apply one event. Returns the effects the caller must execute.
    pub fn handle(&mut self, event: AuthEvent) -> Vec<Effect> {
        if self.finished {
            debug!(?event, "event after flow completion, ignored");
            return Vec::new();
        }

        match event {
            AuthEvent::EmailSubmitted(raw) => self.on_email_submitted(&raw),
            AuthEvent::CodeInput(raw) => self.on_code_input(&raw),
            AuthEvent::CodeSubmitted(raw) => self.on_code_submitted(&raw),
            AuthEvent::AutoSubmitElapsed { code } => self.on_auto_submit(&code),
            AuthEvent::BackRequested => self.on_back(),
            AuthEvent::ResendRequested => self.on_resend(),
            AuthEvent::LockoutElapsed => self.on_lockout_elapsed(),
            AuthEvent::SendCodeCompleted { request, result } => {
                self.on_send_completed(request, result)
            }
            AuthEvent::VerifyCompleted { request, result } => {
                self.on_verify_completed(request, result)
            }
            AuthEvent::CountdownTick { epoch, remaining } => self.on_tick(epoch, remaining),
            AuthEvent::CountdownExpired { epoch } => self.on_expired(epoch),
        }
    }

    fn on_email_submitted(&mut self, raw: &str) -> Vec<Effect> {
        if self.step != Step::AwaitingEmail || self.in_flight.is_some() {
            return Vec::new();
        }

        match validator::validate_email(raw, &self.config.allowed_domains) {
            Ok(email) => {
                let request = self.next_token();
                let email = email.into_string();
                self.in_flight = Some((
                    request,
                    PendingRequest::SendCode {
                        email: email.clone(),
                    },
                ));
                vec![Effect::SendCode { request, email }]
            }
            Err(reason) => vec![Effect::Notify(Notice::Invalid(reason))],
        }
    }

    fn on_code_input(&mut self, raw: &str) -> Vec<Effect> {
        if self.step != Step::AwaitingCode {
            return Vec::new();
        }

        self.pending_code = validator::normalize_code_input(raw, self.config.code_length);

        if self.can_submit_code()
            && validator::validate_code(&self.pending_code, self.config.code_length).is_ok()
        {
            // Trigger condition is "the field currently holds a full valid
            // code"; the debounce leaves room for a correction, and the echo
            // check in `on_auto_submit` drops the trigger if one happened.
            return vec![Effect::ScheduleAutoSubmit {
                code: self.pending_code.clone(),
                delay: self.config.auto_submit_debounce,
            }];
        }

        Vec::new()
    }

    fn on_auto_submit(&mut self, code: &str) -> Vec<Effect> {
        if code != self.pending_code || !self.can_submit_code() {
            debug!("auto-submit dropped, field changed or submission disabled");
            return Vec::new();
        }

        match validator::validate_code(code, self.config.code_length) {
            Ok(code) => self.submit_code(code.into_string()),
            Err(_) => Vec::new(),
        }
    }

    fn on_code_submitted(&mut self, raw: &str) -> Vec<Effect> {
        if self.step != Step::AwaitingCode || self.in_flight.is_some() || self.locked {
            return Vec::new();
        }
        if self.expired {
            return vec![Effect::Notify(Notice::CodeExpired)];
        }

        match validator::validate_code(raw, self.config.code_length) {
            Ok(code) => self.submit_code(code.into_string()),
            Err(reason) => vec![Effect::Notify(Notice::Invalid(reason))],
        }
    }

    fn submit_code(&mut self, code: String) -> Vec<Effect> {
        let request = self.next_token();
        self.in_flight = Some((request, PendingRequest::Verify));
        vec![Effect::VerifyCode {
            request,
            email: self.email.clone(),
            code,
        }]
    }

    fn on_back(&mut self) -> Vec<Effect> {
        if self.step != Step::AwaitingCode || self.in_flight.is_some() {
            return Vec::new();
        }
        self.reset_to_email()
    }

    fn on_resend(&mut self) -> Vec<Effect> {
        if self.step != Step::AwaitingCode || self.in_flight.is_some() || self.locked {
            return Vec::new();
        }

        let request = self.next_token();
        let email = self.email.clone();
        self.in_flight = Some((
            request,
            PendingRequest::SendCode {
                email: email.clone(),
            },
        ));
        vec![Effect::SendCode { request, email }]
    }

    fn on_lockout_elapsed(&mut self) -> Vec<Effect> {
        if self.step != Step::AwaitingCode || !self.locked {
            return Vec::new();
        }
        self.reset_to_email()
    }

    fn on_send_completed(
        &mut self,
        request: RequestToken,
        result: Result<SendCodeResponse, ApiError>,
    ) -> Vec<Effect> {
        let email = match self.take_in_flight(request) {
            Some(PendingRequest::SendCode { email }) => email,
            Some(_) | None => {
                debug!("stale send-code completion, ignored");
                return Vec::new();
            }
        };

        match result {
            Ok(response) if response.success => {
                let resend = self.step == Step::AwaitingCode;
                self.tracker.reset();
                self.expired = false;
                self.pending_code.clear();
                self.step = Step::AwaitingCode;
                self.email = email.clone();
                self.remaining_secs = Some(self.config.code_validity_secs);
                let epoch = self.next_epoch();

                let notice = if resend {
                    Notice::CodeResent
                } else {
                    Notice::CodeSent { email }
                };
                vec![
                    Effect::StartCountdown {
                        epoch,
                        seconds: self.config.code_validity_secs,
                    },
                    Effect::Notify(notice),
                ]
            }
            Ok(response) => vec![Effect::Notify(Notice::SendRefused {
                message: response.message,
            })],
            Err(error) => vec![Effect::Notify(Notice::Transport {
                message: error.to_string(),
            })],
        }
    }

    fn on_verify_completed(
        &mut self,
        request: RequestToken,
        result: Result<VerifyCodeResponse, ApiError>,
    ) -> Vec<Effect> {
        match self.take_in_flight(request) {
            Some(PendingRequest::Verify) => {}
            Some(_) | None => {
                debug!("stale verify completion, ignored");
                return Vec::new();
            }
        }

        match result {
            Ok(response) if response.success => {
                self.finished = true;
                self.remaining_secs = None;

                let mut effects = vec![Effect::CancelCountdown];
                if let Some(token) = response.session_token {
                    effects.push(Effect::PersistCredential(SecretString::from(token)));
                }
                effects.push(Effect::Notify(Notice::LoggedIn));
                effects.push(Effect::Redirect(
                    response.redirect_url.unwrap_or_else(|| "/".to_string()),
                ));
                effects
            }
            Ok(response) => {
                self.pending_code.clear();
                let attempts = self.tracker.record_failure();

                if self.tracker.is_locked_out() {
                    self.locked = true;
                    vec![
                        Effect::Notify(Notice::LockedOut),
                        Effect::ScheduleLockoutReturn {
                            delay: self.config.lockout_return_delay,
                        },
                    ]
                } else {
                    vec![Effect::Notify(Notice::CodeRejected {
                        message: response.message,
                        attempts,
                        max_attempts: self.config.max_attempts,
                    })]
                }
            }
            // Transport failures are not verification attempts.
            Err(error) => vec![Effect::Notify(Notice::Transport {
                message: error.to_string(),
            })],
        }
    }

    fn on_tick(&mut self, epoch: TimerEpoch, remaining: u64) -> Vec<Effect> {
        if epoch != TimerEpoch(self.epoch) || self.step != Step::AwaitingCode {
            return Vec::new();
        }
        self.remaining_secs = Some(remaining);
        Vec::new()
    }

    fn on_expired(&mut self, epoch: TimerEpoch) -> Vec<Effect> {
        if epoch != TimerEpoch(self.epoch) || self.step != Step::AwaitingCode {
            return Vec::new();
        }
        self.expired = true;
        self.remaining_secs = Some(0);
        vec![Effect::Notify(Notice::CodeExpired)]
    }

    fn reset_to_email(&mut self) -> Vec<Effect> {
        self.step = Step::AwaitingEmail;
        self.email.clear();
        self.remaining_secs = None;
        self.expired = false;
        self.locked = false;
        self.pending_code.clear();
        self.tracker.reset();
        // Invalidate ticks still queued from the countdown being cancelled.
        self.epoch += 1;
        vec![Effect::CancelCountdown]
    }

    fn can_submit_code(&self) -> bool {
        self.step == Step::AwaitingCode
            && !self.expired
            && !self.locked
            && self.in_flight.is_none()
    }

    fn next_token(&mut self) -> RequestToken {
        self.next_request += 1;
        RequestToken(self.next_request)
    }

    fn next_epoch(&mut self) -> TimerEpoch {
        self.epoch += 1;
        TimerEpoch(self.epoch)
    }

    fn take_in_flight(&mut self, request: RequestToken) -> Option<PendingRequest> {
        match &self.in_flight {
            Some((token, _)) if *token == request => self.in_flight.take().map(|(_, p)| p),
            _ => None,
        }
    }
}
