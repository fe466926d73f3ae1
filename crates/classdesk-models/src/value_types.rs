//! Validated domain primitives.
//!
//! - [`Email`]: trimmed, lowercased, syntactically valid address
//! - [`FeePin`]: 12-digit verification code attached to each student fee

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{
    Database, Decode, Encode, Type,
    postgres::{PgHasArrayType, PgTypeInfo},
};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidateEmail;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueTypeError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),
    #[error("Invalid fee PIN: {0}")]
    InvalidPin(String),
}

/// Implements the Postgres `TEXT` mapping and validating `Deserialize` for
/// a string newtype with `new` and `new_unchecked` constructors.
macro_rules! text_value_type {
    ($name:ident) => {
        impl Type<sqlx::Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Postgres as Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: <sqlx::Postgres as Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as Decode<'r, sqlx::Postgres>>::decode(value)?;
                Ok(Self::new_unchecked(s))
            }
        }

        impl PgHasArrayType for $name {
            fn array_type_info() -> PgTypeInfo {
                <String as PgHasArrayType>::array_type_info()
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(s).map_err(serde::de::Error::custom)
            }
        }

        impl FromStr for $name {
            type Err = ValueTypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// A normalized email address. Emails are unique case-insensitively, so
/// they are stored lowercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[schema(value_type = String, format = "email", example = "user@example.com")]
pub struct Email(String);

impl Email {
    pub fn new(email: impl Into<String>) -> Result<Self, ValueTypeError> {
        let email = email.into().trim().to_lowercase();
        if email.is_empty() {
            return Err(ValueTypeError::InvalidEmail("email cannot be empty".into()));
        }
        if !email.validate_email() {
            return Err(ValueTypeError::InvalidEmail(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        Ok(Self(email))
    }

    /// Wraps a value read back from the database.
    #[inline]
    pub fn new_unchecked(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

text_value_type!(Email);

/// Verification PIN printed on fee receipts and used to look up a
/// student fee without knowing its id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[schema(value_type = String, example = "482913650127")]
pub struct FeePin(String);

impl FeePin {
    pub const LENGTH: usize = 12;

    pub fn new(pin: impl Into<String>) -> Result<Self, ValueTypeError> {
        let pin = pin.into();
        let pin = pin.trim();
        if pin.len() != Self::LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValueTypeError::InvalidPin(format!(
                "expected {} digits",
                Self::LENGTH
            )));
        }
        Ok(Self(pin.to_string()))
    }

    #[inline]
    pub fn new_unchecked(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    /// Generates a random PIN. Uniqueness is enforced by the database.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let pin = (0..Self::LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self(pin)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

text_value_type!(FeePin);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let email = Email::new("  Jane.Doe@School.ORG ").unwrap();
        assert_eq!(email.as_str(), "jane.doe@school.org");
    }

    #[test]
    fn test_invalid_emails() {
        assert!(Email::new("").is_err());
        assert!(Email::new("not-an-email").is_err());
        assert!(Email::new("user@").is_err());
    }

    #[test]
    fn test_email_deserialize_validates() {
        let email: Email = serde_json::from_str(r#""Admin@Example.com""#).unwrap();
        assert_eq!(email.to_string(), "admin@example.com");
        assert!(serde_json::from_str::<Email>(r#""nope""#).is_err());
    }

    #[test]
    fn test_generated_pin_shape() {
        for _ in 0..50 {
            let pin = FeePin::generate();
            assert_eq!(pin.as_str().len(), 12);
            assert!(pin.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_pin_parsing() {
        assert!("123456789012".parse::<FeePin>().is_ok());
        assert!("12345678901".parse::<FeePin>().is_err());
        assert!("12345678901a".parse::<FeePin>().is_err());
    }

    #[test]
    fn test_error_display() {
        let err = ValueTypeError::InvalidPin("expected 12 digits".into());
        assert_eq!(err.to_string(), "Invalid fee PIN: expected 12 digits");
    }
}
