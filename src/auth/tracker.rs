//! Failed-verification accounting.

/// Counts rejected verification attempts and decides when the session must be
/// sent back to the email step. Reset whenever a code is freshly sent.
#[derive(Clone, Debug)]
pub struct AttemptTracker {
    failed: u8,
    max_attempts: u8,
}

impl AttemptTracker {
    #[must_use]
    pub fn new(max_attempts: u8) -> Self {
        Self {
            failed: 0,
            max_attempts,
        }
    }

    /// Record one rejection and return the new count. The count saturates at
    /// the configured maximum; callers must check [`Self::is_locked_out`]
    /// before issuing another attempt.
    pub fn record_failure(&mut self) -> u8 {
        self.failed = self.failed.saturating_add(1).min(self.max_attempts);
        self.failed
    }

    pub fn reset(&mut self) {
        self.failed = 0;
    }

    #[must_use]
    pub fn failed(&self) -> u8 {
        self.failed
    }

    #[must_use]
    pub fn remaining(&self) -> u8 {
        self.max_attempts - self.failed
    }

    #[must_use]
    pub fn is_locked_out(&self) -> bool {
        self.failed >= self.max_attempts
    }
}
