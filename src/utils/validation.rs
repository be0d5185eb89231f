//! Format rules for user-supplied credentials.
//!
//! All checks are pure predicates. Request-level validation, which reports
//! every blank field at once, goes through the [`Validate`] trait.

use crate::errors::AuthError;
use regex::Regex;
use std::sync::OnceLock;

pub const PASSWORD_SPECIAL_CHARS: &str = "@#$%^&+=!";
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_NAME_LENGTH: usize = 64;

fn username_regex() -> Option<&'static Regex> {
    static USERNAME_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{2,29}$").ok())
        .as_ref()
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").ok()
        })
        .as_ref()
}

fn name_regex() -> Option<&'static Regex> {
    static NAME_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    NAME_REGEX
        .get_or_init(|| Regex::new(r"^\p{L}+(?:[ '\-]\p{L}+)*$").ok())
        .as_ref()
}

/// A letter followed by 2 to 29 letters, digits or underscores.
pub fn is_username_valid(username: &str) -> bool {
    username_regex().is_some_and(|re| re.is_match(username))
}

/// At least 8 characters with a digit, a lowercase letter, an uppercase
/// letter and one of [`PASSWORD_SPECIAL_CHARS`], and no whitespace.
pub fn is_password_strong(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c))
        && !password.chars().any(char::is_whitespace)
}

pub fn is_email_valid(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && email_regex().is_some_and(|re| re.is_match(email))
}

/// Letters, optionally joined by single spaces, apostrophes or hyphens.
pub fn is_name_valid(name: &str) -> bool {
    name.chars().count() <= MAX_NAME_LENGTH && name_regex().is_some_and(|re| re.is_match(name))
}

/// Shape validation for incoming requests.
pub trait Validate {
    /// Every violated constraint, in field order. Empty when valid.
    fn violations(&self) -> Vec<String>;

    fn validate(&self) -> Result<(), AuthError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Validation(violations))
        }
    }
}

/// One violation per blank field, in the order given.
pub fn require_not_blank(fields: &[(&str, &str)]) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| format!("{} must not be blank", name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_valid() {
        assert!(is_username_valid("a_b2"));
        assert!(is_username_valid("bob1"));
        assert!(is_username_valid("abc"));
        assert!(is_username_valid(&format!("a{}", "b".repeat(29))));
    }

    #[test]
    fn test_username_invalid() {
        assert!(!is_username_valid("ab"));
        assert!(!is_username_valid("2abc"));
        assert!(!is_username_valid("_abc"));
        assert!(!is_username_valid("ab c"));
        assert!(!is_username_valid("abc-d"));
        assert!(!is_username_valid("abc\n"));
        assert!(!is_username_valid(""));
        assert!(!is_username_valid(&format!("a{}", "b".repeat(30))));
    }

    #[test]
    fn test_password_strong() {
        assert!(is_password_strong("Passw0rd!"));
        assert!(is_password_strong("Str0ng!pw"));
        assert!(is_password_strong("aB3#aB3#"));
    }

    #[test]
    fn test_password_weak() {
        assert!(!is_password_strong("password"));
        assert!(!is_password_strong("Pa0!"));
        assert!(!is_password_strong("passw0rd!"));
        assert!(!is_password_strong("PASSW0RD!"));
        assert!(!is_password_strong("Password!"));
        assert!(!is_password_strong("Passw0rd"));
        assert!(!is_password_strong("Passw0rd !"));
        assert!(!is_password_strong("Passw0rd*"));
    }

    #[test]
    fn test_email_format() {
        assert!(is_email_valid("bob@example.com"));
        assert!(is_email_valid("first.last+tag@mail.example.no"));
        assert!(!is_email_valid("bob@"));
        assert!(!is_email_valid("bob.example.com"));
        assert!(!is_email_valid("bob@example"));
        assert!(!is_email_valid("bob @example.com"));
        assert!(!is_email_valid(&format!("{}@example.com", "a".repeat(250))));
    }

    #[test]
    fn test_name_format() {
        assert!(is_name_valid("Bob"));
        assert!(is_name_valid("Lee"));
        assert!(is_name_valid("Jean-Luc"));
        assert!(is_name_valid("O'Brien"));
        assert!(is_name_valid("Ødegård"));
        assert!(is_name_valid("Mary Ann"));
        assert!(!is_name_valid(""));
        assert!(!is_name_valid("Bob1"));
        assert!(!is_name_valid(" Bob"));
        assert!(!is_name_valid("Bob-"));
        assert!(!is_name_valid(&"a".repeat(65)));
    }

    #[test]
    fn test_validators_are_repeatable() {
        for input in ["a_b2", "2abc", "Passw0rd!", "bob@example.com"] {
            assert_eq!(is_username_valid(input), is_username_valid(input));
            assert_eq!(is_password_strong(input), is_password_strong(input));
            assert_eq!(is_email_valid(input), is_email_valid(input));
        }
    }

    #[test]
    fn test_require_not_blank_collects_all() {
        let violations = require_not_blank(&[("username", ""), ("password", "x"), ("email", "  ")]);
        assert_eq!(
            violations,
            vec![
                "username must not be blank".to_string(),
                "email must not be blank".to_string()
            ]
        );
    }
}
