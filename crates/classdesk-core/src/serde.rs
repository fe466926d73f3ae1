//! Query-string friendly deserializers.
//!
//! HTML forms and most HTTP clients send empty strings for unset filters
//! (`?classroom_id=&is_active=`). These helpers map empty values to `None`.
//!
//! [`deserialize_nullable`] is for JSON update bodies instead, where an
//! explicit `null` clears a column and a missing key leaves it alone.

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

pub fn deserialize_optional_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

pub fn deserialize_optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref() {
        None | Some("") => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid boolean value: {}",
            other
        ))),
    }
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

/// Maps a missing key to `None` and an explicit `null` to `Some(None)`.
/// Pair it with `#[serde(default)]`.
pub fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Filters {
        #[serde(default, deserialize_with = "deserialize_optional_uuid")]
        classroom_id: Option<Uuid>,
        #[serde(default, deserialize_with = "deserialize_optional_bool")]
        is_active: Option<bool>,
        #[serde(default, deserialize_with = "deserialize_optional_string")]
        search: Option<String>,
    }

    #[test]
    fn test_empty_values_are_none() {
        let f: Filters =
            serde_json::from_str(r#"{"classroom_id":"","is_active":"","search":"  "}"#).unwrap();
        assert!(f.classroom_id.is_none());
        assert!(f.is_active.is_none());
        assert!(f.search.is_none());
    }

    #[test]
    fn test_values_are_parsed() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"classroom_id":"{}","is_active":"false","search":" ada "}}"#,
            id
        );
        let f: Filters = serde_json::from_str(&json).unwrap();
        assert_eq!(f.classroom_id, Some(id));
        assert_eq!(f.is_active, Some(false));
        assert_eq!(f.search.as_deref(), Some("ada"));
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        assert!(serde_json::from_str::<Filters>(r#"{"is_active":"maybe"}"#).is_err());
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_nullable")]
        room: Option<Option<String>>,
    }

    #[test]
    fn test_null_is_distinct_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.room, None);

        let cleared: Patch = serde_json::from_str(r#"{"room":null}"#).unwrap();
        assert_eq!(cleared.room, Some(None));

        let set: Patch = serde_json::from_str(r#"{"room":"Lab 2"}"#).unwrap();
        assert_eq!(set.room, Some(Some("Lab 2".to_string())));
    }
}
