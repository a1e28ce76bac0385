//! Code-validity countdown.
//!
//! One countdown may run per session. Ticks and the single expiry
//! notification are delivered as [`AuthEvent`]s over the session's event
//! channel, tagged with the epoch that started them so a late tick from a
//! cancelled countdown is ignored by the state machine.

use crate::auth::session::{AuthEvent, TimerEpoch};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Presentation tier for the remaining time. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Warning,
    Urgent,
}

#[must_use]
pub fn urgency(remaining_secs: u64) -> Urgency {
    if remaining_secs <= 60 {
        Urgency::Urgent
    } else if remaining_secs <= 300 {
        Urgency::Warning
    } else {
        Urgency::Normal
    }
}

/// `mm:ss` rendering of the remaining time.
#[must_use]
pub fn format_remaining(remaining_secs: u64) -> String {
    format!("{:02}:{:02}", remaining_secs / 60, remaining_secs % 60)
}

/// Handle on the single countdown task of a session.
#[derive(Debug, Default)]
pub struct Countdown {
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown of `seconds`, cancelling any countdown already
    /// running. One tick per second carries the decremented remaining value;
    /// after the tick that reaches zero, a single expiry event follows and
    /// the task stops itself.
    pub fn start(&mut self, epoch: TimerEpoch, seconds: u64, events: UnboundedSender<AuthEvent>) {
        self.cancel();

        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick completes immediately.
            ticker.tick().await;

            let mut remaining = seconds;
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;
                if events
                    .send(AuthEvent::CountdownTick { epoch, remaining })
                    .is_err()
                {
                    return;
                }
            }

            let _ = events.send(AuthEvent::CountdownExpired { epoch });
        });

        self.task = Some(task);
    }

    /// Stop future ticks. Idempotent, safe to call when not running.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Countdown {
    // A session torn down mid-countdown must not leave a ticking task behind.
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::{advance, sleep};

    fn epoch(value: u64) -> TimerEpoch {
        TimerEpoch::new(value)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_down_and_expires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        countdown.start(epoch(1), 3, tx);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event);
        }

        assert_eq!(seen.len(), 4);
        for (index, event) in seen.iter().take(3).enumerate() {
            match event {
                AuthEvent::CountdownTick { remaining, .. } => {
                    assert_eq!(*remaining, 2 - index as u64);
                }
                other => panic!("expected tick, got {other:?}"),
            }
        }
        assert!(matches!(seen[3], AuthEvent::CountdownExpired { .. }));
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        countdown.start(epoch(1), 60, tx);

        advance(Duration::from_secs(2)).await;
        sleep(Duration::from_millis(1)).await;

        countdown.cancel();
        countdown.cancel();

        let mut ticks = 0;
        while rx.try_recv().is_ok() {
            ticks += 1;
        }
        assert_eq!(ticks, 2);

        // Nothing fires afterwards.
        advance(Duration::from_secs(120)).await;
        sleep(Duration::from_millis(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_start_is_a_no_op() {
        let mut countdown = Countdown::new();
        countdown.cancel();
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_running_countdown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new();
        countdown.start(epoch(1), 600, tx.clone());

        advance(Duration::from_secs(1)).await;
        sleep(Duration::from_millis(1)).await;

        countdown.start(epoch(2), 5, tx);
        drop(countdown);

        let mut epochs = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AuthEvent::CountdownTick { epoch, .. } = event {
                epochs.push(epoch);
            }
        }
        // The first countdown got one tick out before being replaced; the
        // replacement produced none yet.
        assert_eq!(epochs, vec![TimerEpoch::new(1)]);
    }

    #[test]
    fn urgency_tiers() {
        assert_eq!(urgency(900), Urgency::Normal);
        assert_eq!(urgency(301), Urgency::Normal);
        assert_eq!(urgency(300), Urgency::Warning);
        assert_eq!(urgency(61), Urgency::Warning);
        assert_eq!(urgency(60), Urgency::Urgent);
        assert_eq!(urgency(0), Urgency::Urgent);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_remaining(900), "15:00");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(0), "00:00");
    }
}
