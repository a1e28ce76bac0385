//! Client side of the email one-time-code login flow.
//!
//! The flow is a small state machine ([`session::AuthSession`]) surrounded by
//! collaborators: pure validation, a countdown timer, an attempt tracker, the
//! remote API and a credential store. [`controller::AuthController`] wires
//! them together and executes the machine's effects.

pub mod api;
pub mod controller;
pub mod countdown;
pub mod session;
pub mod store;
pub mod tracker;
pub mod validator;

use std::time::Duration;

/// Domain accepted by default when none is configured.
pub const DEFAULT_ALLOWED_DOMAIN: &str = "taqa.ma";

/// Flow constants, injected into the session instead of read from globals.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Email domains accepted by the validator, lower-case.
    pub allowed_domains: Vec<String>,
    /// Number of digits in a verification code.
    pub code_length: usize,
    /// How long a freshly sent code stays valid.
    pub code_validity_secs: u64,
    /// Failed verifications tolerated before the forced return to the email step.
    pub max_attempts: u8,
    /// Delay between a complete code entry and its automatic submission.
    pub auto_submit_debounce: Duration,
    /// Delay between the lockout notice and the forced return to the email step.
    pub lockout_return_delay: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_domains: vec![DEFAULT_ALLOWED_DOMAIN.to_string()],
            code_length: 6,
            code_validity_secs: 900,
            max_attempts: 3,
            auto_submit_debounce: Duration::from_millis(500),
            lockout_return_delay: Duration::from_secs(3),
        }
    }
}
