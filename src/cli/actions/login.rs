//! Interactive login action: wires stdin and stdout to the auth controller.
//!
//! The terminal is only a projection of the controller's snapshots; every
//! decision lives in the state machine. Lines typed at the email step are
//! email submissions, lines typed at the code step feed the code field (a
//! complete code auto-submits after the debounce), and `back`, `resend` and
//! `quit` are the escape hatches.

use crate::auth::api::{AuthBackend, HttpBackend};
use crate::auth::controller::AuthController;
use crate::auth::countdown::{format_remaining, Urgency};
use crate::auth::session::{AuthEvent, AuthSnapshot, Notice, NoticeLevel, Step};
use crate::auth::store::CredentialStore;
use crate::auth::validator::{self, ValidationError};
use crate::auth::AuthConfig;
use crate::cli::globals::GlobalArgs;
use anyhow::Result;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;
use tracing::debug;

pub async fn handle(globals: &GlobalArgs) -> Result<()> {
    let backend = HttpBackend::new(&globals.api_url)?;
    let store = CredentialStore::new(&globals.token_file);

    // A still-valid stored session short-circuits the whole flow.
    if let Some(token) = store.load() {
        match backend.status(&token).await {
            Ok(status) if status.authenticated => {
                println!("Already signed in.");
                return Ok(());
            }
            Ok(_) => {
                debug!("stored credential is no longer valid");
                let _ = store.clear();
            }
            Err(err) => debug!("status check failed, continuing with login: {err}"),
        }
    }

    let config = AuthConfig {
        allowed_domains: globals.allowed_domains.clone(),
        ..AuthConfig::default()
    };
    let mut controller = AuthController::new(config, backend, Some(store));
    let mut lines = stdin_lines();

    let mut step = Step::AwaitingEmail;
    prompt(&controller.snapshot());

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let at_email_step = controller.snapshot().step == Step::AwaitingEmail;
                let Some(event) = parse_line(&line, controller.snapshot().step) else { break };
                let notices = controller.dispatch(event);
                render_notices(&notices);
                if at_email_step {
                    suggest_rewrites(&line, &globals.allowed_domains, &notices);
                }
            }
            event = controller.next_event() => {
                let Some(event) = event else { break };
                let is_tick = matches!(event, AuthEvent::CountdownTick { .. });
                render_notices(&controller.dispatch(event));
                if is_tick {
                    render_countdown(&controller.snapshot());
                }
            }
        }

        let snapshot = controller.snapshot();
        if snapshot.finished {
            if let Some(url) = controller.redirect() {
                println!("Continue at {url}");
            }
            return Ok(());
        }
        if snapshot.step != step {
            step = snapshot.step;
            prompt(&snapshot);
        }
    }

    Ok(())
}

/// Feed stdin lines into the async loop from a blocking reader thread.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Map one typed line to an event. `None` means "leave".
fn parse_line(line: &str, step: Step) -> Option<AuthEvent> {
    let input = line.trim();
    match (step, input) {
        (_, "quit" | "exit") => None,
        (Step::AwaitingCode, "back") => Some(AuthEvent::BackRequested),
        (Step::AwaitingCode, "resend") => Some(AuthEvent::ResendRequested),
        (Step::AwaitingEmail, _) => Some(AuthEvent::EmailSubmitted(input.to_string())),
        (Step::AwaitingCode, _) => Some(AuthEvent::CodeInput(input.to_string())),
    }
}

fn prompt(snapshot: &AuthSnapshot) {
    match snapshot.step {
        Step::AwaitingEmail => println!("Enter your email address ('quit' to leave):"),
        Step::AwaitingCode => println!(
            "Enter the code sent to {} ('resend', 'back' or 'quit'):",
            snapshot.email
        ),
    }
}

fn render_notices(notices: &[Notice]) {
    for notice in notices {
        let tag = match notice.level() {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        println!("[{tag}] {notice}");
    }
}

/// When the domain was refused, propose the same mailbox on an allowed one.
fn suggest_rewrites(raw: &str, domains: &[String], notices: &[Notice]) {
    let refused = notices.iter().any(|notice| {
        matches!(
            notice,
            Notice::Invalid(ValidationError::DomainNotAllowed(_))
        )
    });
    if !refused {
        return;
    }

    let alternatives = validator::suggest_alternatives(raw, domains);
    if !alternatives.is_empty() {
        println!("Did you mean: {}?", alternatives.join(", "));
    }
}

fn render_countdown(snapshot: &AuthSnapshot) {
    let Some(remaining) = snapshot.remaining_secs else {
        return;
    };
    let marker = match snapshot.urgency {
        Some(Urgency::Urgent) => "!",
        Some(Urgency::Warning) => "*",
        _ => " ",
    };
    print!("\r{marker} code valid for {} ", format_remaining(remaining));
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_works_at_both_steps() {
        assert!(parse_line("quit", Step::AwaitingEmail).is_none());
        assert!(parse_line(" exit ", Step::AwaitingCode).is_none());
    }

    #[test]
    fn email_step_lines_become_email_submissions() {
        assert!(matches!(
            parse_line("user@taqa.ma", Step::AwaitingEmail),
            Some(AuthEvent::EmailSubmitted(email)) if email == "user@taqa.ma"
        ));
        // `back` has no meaning at the email step; it is just bad input.
        assert!(matches!(
            parse_line("back", Step::AwaitingEmail),
            Some(AuthEvent::EmailSubmitted(_))
        ));
    }

    #[test]
    fn code_step_lines_feed_the_code_field() {
        assert!(matches!(
            parse_line("123456", Step::AwaitingCode),
            Some(AuthEvent::CodeInput(code)) if code == "123456"
        ));
        assert!(matches!(
            parse_line("back", Step::AwaitingCode),
            Some(AuthEvent::BackRequested)
        ));
        assert!(matches!(
            parse_line("resend", Step::AwaitingCode),
            Some(AuthEvent::ResendRequested)
        ));
    }
}
