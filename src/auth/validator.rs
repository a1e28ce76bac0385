//! Pure validation for email addresses and verification codes.
//!
//! Nothing here touches the network; a rejected value never leaves the
//! process. Emails are normalized (trimmed, lower-cased) before any check, so
//! the allow-list comparison is case-insensitive.

use thiserror::Error;

use regex::Regex;

// RFC 5321 length caps.
const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_DOMAIN_LEN: usize = 253;

/// Role and test mailboxes that never belong to a real operator.
const FORBIDDEN_PREFIXES: &[&str] = &["test", "demo", "admin", "root", "noreply", "no-reply"];

/// Validation failures, surfaced inline at the UI boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a value is required")]
    Empty,
    #[error("invalid email format")]
    MalformedFormat,
    #[error("the domain '{0}' is not allowed; use your corporate address")]
    DomainNotAllowed(String),
    #[error("mailboxes starting with '{0}@' are not allowed")]
    ForbiddenPrefix(String),
    #[error("the code must be exactly {0} digits")]
    WrongLength(usize),
}

/// A normalized, allow-listed email address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidEmail(String);

impl ValidEmail {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ValidEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A verification code of the expected length, ASCII digits only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidCode(String);

impl ValidCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

fn format_ok(email_normalized: &str) -> bool {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$")
        .is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Validate an email address against format rules and the domain allow-list.
///
/// The input is trimmed and lower-cased first; the returned [`ValidEmail`]
/// carries the normalized form.
pub fn validate_email(raw: &str, allowed_domains: &[String]) -> Result<ValidEmail, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::Empty);
    }

    if email.len() > MAX_EMAIL_LEN || !format_ok(&email) {
        return Err(ValidationError::MalformedFormat);
    }

    // The regex guarantees exactly one '@' with non-empty parts around it.
    let (local, domain) = email
        .split_once('@')
        .ok_or(ValidationError::MalformedFormat)?;

    if local.len() > MAX_LOCAL_LEN
        || domain.len() > MAX_DOMAIN_LEN
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
    {
        return Err(ValidationError::MalformedFormat);
    }

    if let Some(prefix) = FORBIDDEN_PREFIXES.iter().find(|prefix| local == **prefix) {
        return Err(ValidationError::ForbiddenPrefix((*prefix).to_string()));
    }

    if !allowed_domains
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(domain))
    {
        return Err(ValidationError::DomainNotAllowed(domain.to_string()));
    }

    Ok(ValidEmail(email))
}

/// Validate a verification code: exactly `expected_length` ASCII digits.
pub fn validate_code(raw: &str, expected_length: usize) -> Result<ValidCode, ValidationError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ValidationError::Empty);
    }

    if code.len() != expected_length || !code.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::WrongLength(expected_length));
    }

    Ok(ValidCode(code.to_string()))
}

/// Reduce raw code input to what the field accepts: digits only, truncated.
#[must_use]
pub fn normalize_code_input(raw: &str, max_length: usize) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(max_length)
        .collect()
}

/// Propose `local@<allowed-domain>` rewrites for an address whose domain was
/// refused. Returns nothing when the local part itself is unusable.
#[must_use]
pub fn suggest_alternatives(raw: &str, allowed_domains: &[String]) -> Vec<String> {
    let email = raw.trim().to_lowercase();
    let Some((local, _)) = email.split_once('@') else {
        return Vec::new();
    };

    allowed_domains
        .iter()
        .map(|domain| format!("{local}@{domain}"))
        .filter(|candidate| validate_email(candidate, allowed_domains).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<String> {
        vec!["taqa.ma".to_string()]
    }

    #[test]
    fn accepts_allowed_domain() {
        let email = validate_email("User.Name@TAQA.MA", &domains()).unwrap();
        assert_eq!(email.as_str(), "user.name@taqa.ma");
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(
            validate_email("   ", &domains()),
            Err(ValidationError::Empty)
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in [
            "not-an-email",
            "missing-at.taqa.ma",
            "missing-domain@",
            "@taqa.ma",
            "user@taqa",
            "user name@taqa.ma",
            ".leading@taqa.ma",
            "trailing.@taqa.ma",
            "dou..ble@taqa.ma",
        ] {
            assert_eq!(
                validate_email(raw, &domains()),
                Err(ValidationError::MalformedFormat),
                "expected malformed: {raw}"
            );
        }
    }

    #[test]
    fn rejects_overlong_addresses() {
        let local = "a".repeat(MAX_LOCAL_LEN + 1);
        assert_eq!(
            validate_email(&format!("{local}@taqa.ma"), &domains()),
            Err(ValidationError::MalformedFormat)
        );

        let whole = format!("a@{}.ma", "b".repeat(MAX_EMAIL_LEN));
        assert_eq!(
            validate_email(&whole, &domains()),
            Err(ValidationError::MalformedFormat)
        );
    }

    #[test]
    fn rejects_foreign_domains() {
        for raw in ["user@gmail.com", "user@yahoo.com", "user@taqa.ma.evil.com"] {
            match validate_email(raw, &domains()) {
                Err(ValidationError::DomainNotAllowed(domain)) => {
                    assert!(raw.ends_with(&domain), "wrong domain reported for {raw}");
                }
                other => panic!("expected DomainNotAllowed for {raw}, got {other:?}"),
            }
        }
    }

    #[test]
    fn domain_comparison_is_case_insensitive() {
        assert!(validate_email("user@TaQa.Ma", &domains()).is_ok());
    }

    #[test]
    fn rejects_role_mailboxes() {
        for raw in ["test@taqa.ma", "admin@taqa.ma", "no-reply@taqa.ma"] {
            assert!(
                matches!(
                    validate_email(raw, &domains()),
                    Err(ValidationError::ForbiddenPrefix(_))
                ),
                "expected forbidden prefix: {raw}"
            );
        }
        // Prefix matching is on the whole local part, not a substring.
        assert!(validate_email("testard@taqa.ma", &domains()).is_ok());
    }

    #[test]
    fn accepts_exact_six_digit_codes() {
        assert_eq!(validate_code(" 123456 ", 6).unwrap().as_str(), "123456");
    }

    #[test]
    fn rejects_codes_of_wrong_shape() {
        for raw in ["12345", "1234567", "12345a", "12 456", "abcdef"] {
            assert_eq!(
                validate_code(raw, 6),
                Err(ValidationError::WrongLength(6)),
                "expected wrong length: {raw}"
            );
        }
        assert_eq!(validate_code("", 6), Err(ValidationError::Empty));
    }

    #[test]
    fn normalizes_code_input_to_digits() {
        assert_eq!(normalize_code_input("12-34-56", 6), "123456");
        assert_eq!(normalize_code_input("1234567890", 6), "123456");
        assert_eq!(normalize_code_input("abc", 6), "");
    }

    #[test]
    fn suggests_allowed_domain_rewrites() {
        assert_eq!(
            suggest_alternatives("user@gmail.com", &domains()),
            vec!["user@taqa.ma".to_string()]
        );
        assert!(suggest_alternatives("admin@gmail.com", &domains()).is_empty());
        assert!(suggest_alternatives("no-at-sign", &domains()).is_empty());
    }
}
