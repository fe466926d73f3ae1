//! Password hashing and password policy enforcement.
//!
//! Hashing uses bcrypt at [`bcrypt::DEFAULT_COST`]. The [`PasswordPolicy`]
//! is applied whenever a password is set: user creation, admin resets and
//! self-service password changes.

use anyhow::anyhow;
use bcrypt::{DEFAULT_COST, hash, verify};

use crate::errors::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::internal_error(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::internal_error(format!("Failed to verify password: {}", e)))
}

const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?`~";

/// Rules a new password must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    /// Returns one message per violated rule. An empty list means the
    /// password is acceptable.
    #[must_use]
    pub fn check(&self, password: &str) -> Vec<String> {
        let mut violations = Vec::new();

        if password.chars().count() < self.min_length {
            violations.push(format!(
                "Password must be at least {} characters long",
                self.min_length
            ));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            violations.push("Password must contain an uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            violations.push("Password must contain a lowercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("Password must contain a digit".to_string());
        }
        if self.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
            violations.push("Password must contain a special character".to_string());
        }

        violations
    }

    /// Like [`PasswordPolicy::check`] but as a 422 error.
    pub fn enforce(&self, password: &str) -> Result<(), AppError> {
        let violations = self.check(password);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::unprocessable(anyhow!("{}", violations.join(", "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_strong_password_passes() {
        assert!(PasswordPolicy::default().check("Str0ng!Pass").is_empty());
    }

    #[test]
    fn test_every_violation_is_reported() {
        let violations = PasswordPolicy::default().check("abc");
        assert_eq!(violations.len(), 4);
        assert!(violations[0].contains("at least 8"));
        assert!(violations.iter().any(|v| v.contains("uppercase")));
        assert!(violations.iter().any(|v| v.contains("digit")));
        assert!(violations.iter().any(|v| v.contains("special")));
    }

    #[test]
    fn test_relaxed_policy() {
        let policy = PasswordPolicy {
            min_length: 4,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        };
        assert!(policy.check("abcd").is_empty());
        assert_eq!(policy.check("abc").len(), 1);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let policy = PasswordPolicy {
            min_length: 4,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        };
        assert_eq!(policy.check("ééé").len(), 1);
    }

    #[test]
    fn test_enforce_returns_unprocessable() {
        let err = PasswordPolicy::default().enforce("password").unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message().contains("uppercase"));
    }
}
