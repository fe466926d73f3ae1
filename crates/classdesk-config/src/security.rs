//! Account lockout and CSRF protection settings.
//!
//! # Environment Variables
//!
//! - `SECURITY_MAX_FAILED_LOGINS`: Failed attempts before an account is locked (default: 5)
//! - `SECURITY_LOCKOUT_MINUTES`: How long a lockout lasts (default: 15)
//! - `CSRF_ENABLED`: Enforce the double-submit CSRF check on mutating requests (default: true)

pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityConfig {
    pub max_failed_logins: i32,
    pub lockout_minutes: i64,
    pub csrf_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            lockout_minutes: 15,
            csrf_enabled: true,
        }
    }
}

impl SecurityConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_failed_logins: std::env::var("SECURITY_MAX_FAILED_LOGINS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i32| *v > 0)
                .unwrap_or(defaults.max_failed_logins),
            lockout_minutes: std::env::var("SECURITY_LOCKOUT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(defaults.lockout_minutes),
            csrf_enabled: std::env::var("CSRF_ENABLED")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.csrf_enabled),
        }
    }
}

/// Parses the boolean spellings accepted in `.env` files.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.max_failed_logins, 5);
        assert_eq!(config.lockout_minutes, 15);
        assert!(config.csrf_enabled);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" OFF "), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
