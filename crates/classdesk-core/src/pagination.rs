//! Pagination utilities for API responses.
//!
//! This module provides types and utilities for implementing pagination
//! in API endpoints. It supports both offset-based and page-based pagination.
//!
//! # Pagination Strategies
//!
//! ## Offset-based pagination
//!
//! Uses `limit` and `offset` parameters:
//! - `limit`: Maximum number of items to return (1-100, default: 10)
//! - `offset`: Number of items to skip from the beginning
//!
//! ## Page-based pagination
//!
//! Uses `limit` and `page` parameters:
//! - `limit`: Items per page (1-100, default: 10)
//! - `page`: Page number (1-indexed, default: 1)
//!
//! When `page` is provided, it takes precedence over `offset`.
//!
//! # Example
//!
//! ```ignore
//! use classdesk_core::pagination::{Paginated, PaginationParams};
//!
//! async fn list_students(
//!     Query(params): Query<PaginationParams>,
//! ) -> Result<Json<Paginated<Student>>, AppError> {
//!     let students = fetch_students(params.limit(), params.offset()).await?;
//!     let total = count_students().await?;
//!
//!     Ok(Json(Paginated::new(students, total, &params)))
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Deserializes an optional string into an optional i64.
///
/// Handles the case where query parameters may be empty strings,
/// which should be treated as `None`.
fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Metadata about a paginated response.
///
/// This struct is included in paginated API responses to provide
/// information about the total number of items and current position.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "data": [...],
///   "meta": {
///     "total": 100,
///     "limit": 10,
///     "offset": 20,
///     "page": 3,
///     "has_more": true
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Total number of items across all pages
    pub total: i64,
    /// Maximum items per page (the limit that was applied)
    pub limit: i64,
    /// Number of items skipped (only present if offset-based pagination was used)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Current page number (only present if page-based pagination was used)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Whether there are more items after this page
    pub has_more: bool,
}

/// Query parameters for pagination.
///
/// Supports both offset-based and page-based pagination:
///
/// - **Offset-based**: Use `limit` and `offset`
/// - **Page-based**: Use `limit` and `page`
///
/// When `page` is provided, it takes precedence over `offset`.
///
/// # Limits
///
/// - `limit` is clamped to the range [1, 100]
/// - `offset` is clamped to a minimum of 0
/// - `page` is clamped to a minimum of 1
///
/// # Example
///
/// ```ignore
/// // GET /api/users?limit=20&page=3
/// let params = PaginationParams {
///     limit: Some(20),
///     offset: None,
///     page: Some(3),
/// };
///
/// assert_eq!(params.limit(), 20);
/// assert_eq!(params.offset(), 40); // (page - 1) * limit
/// ```
#[derive(Debug, Clone, Hash, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Maximum number of items to return (1-100, default: 10)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub limit: Option<i64>,
    /// Number of items to skip (default: 0, ignored if `page` is set)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub offset: Option<i64>,
    /// Page number (1-indexed, default: 1)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub page: Option<i64>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: Some(10),
            offset: Some(0),
            page: Some(1),
        }
    }
}

impl PaginationParams {
    /// Returns the effective limit, clamped to [1, 100].
    ///
    /// Defaults to 10 if not specified.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    /// Returns the effective offset.
    ///
    /// If `page` is set, calculates the offset from the page number.
    /// Otherwise, returns the explicit offset or 0.
    ///
    /// The offset is always clamped to a minimum of 0 and saturates instead
    /// of overflowing on huge page numbers.
    #[must_use]
    pub fn offset(&self) -> i64 {
        // If page is provided, calculate offset from page
        if let Some(page) = self.page {
            let page = page.max(1);
            let limit = self.limit();
            (page - 1).saturating_mul(limit)
        } else {
            self.offset.unwrap_or(0).max(0)
        }
    }

    /// Returns the page number if provided, clamped to a minimum of 1.
    #[must_use]
    pub fn page(&self) -> Option<i64> {
        self.page.map(|p| p.max(1))
    }
}

impl PaginationMeta {
    /// Builds metadata for a page fetched with `params` out of `total` rows.
    #[must_use]
    pub fn from_params(total: i64, params: &PaginationParams) -> Self {
        let limit = params.limit();
        let offset = params.offset();
        let page = params.page();

        Self {
            total,
            limit,
            offset: if page.is_some() { None } else { Some(offset) },
            page,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}

/// A page of items together with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, params: &PaginationParams) -> Self {
        Self {
            data,
            meta: PaginationMeta::from_params(total, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<i64>, offset: Option<i64>, page: Option<i64>) -> PaginationParams {
        PaginationParams {
            limit,
            offset,
            page,
        }
    }

    #[test]
    fn test_pagination_params_default() {
        let params = PaginationParams::default();
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_huge_page_saturates() {
        let params = params(Some(100), None, Some(i64::MAX));
        assert_eq!(params.offset(), i64::MAX);

        let page = Paginated::<u8>::new(vec![], 5, &params);
        assert!(!page.meta.has_more);
    }

    #[test]
    fn test_huge_offset_has_no_more() {
        let page = Paginated::<u8>::new(vec![], 5, &params(None, Some(i64::MAX), None));
        assert_eq!(page.meta.offset, Some(i64::MAX));
        assert!(!page.meta.has_more);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(params(Some(0), None, None).limit(), 1);
        assert_eq!(params(Some(-10), None, None).limit(), 1);
        assert_eq!(params(Some(150), None, None).limit(), 100);
        assert_eq!(params(None, None, None).limit(), 10);
    }

    #[test]
    fn test_negative_offset_is_clamped() {
        assert_eq!(params(Some(10), Some(-5), None).offset(), 0);
    }

    #[test]
    fn test_page_takes_precedence_over_offset() {
        let p = params(Some(20), Some(7), Some(3));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.page(), Some(3));
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let p = params(Some(20), None, Some(0));
        assert_eq!(p.offset(), 0);
        assert_eq!(p.page(), Some(1));
    }

    #[test]
    fn test_meta_from_offset_params() {
        let meta = PaginationMeta::from_params(45, &params(Some(20), Some(20), None));
        assert_eq!(meta.offset, Some(20));
        assert_eq!(meta.page, None);
        assert!(meta.has_more);

        let last = PaginationMeta::from_params(45, &params(Some(20), Some(40), None));
        assert!(!last.has_more);
    }

    #[test]
    fn test_meta_from_page_params() {
        let meta = PaginationMeta::from_params(30, &params(Some(10), None, Some(3)));
        assert_eq!(meta.page, Some(3));
        assert_eq!(meta.offset, None);
        assert!(!meta.has_more);
    }

    #[test]
    fn test_meta_serialize_skips_missing_fields() {
        let meta = PaginationMeta::from_params(100, &params(Some(20), None, Some(2)));
        let serialized = serde_json::to_string(&meta).unwrap();
        assert!(serialized.contains(r#""total":100"#));
        assert!(serialized.contains(r#""page":2"#));
        assert!(!serialized.contains("offset"));
    }

    #[test]
    fn test_params_deserialize_empty_strings() {
        let json = r#"{"limit":"","offset":"","page":""}"#;
        let p: PaginationParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.limit(), 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.page(), None);
    }

    #[test]
    fn test_params_deserialize_string_numbers() {
        let json = r#"{"limit":"25","page":"2"}"#;
        let p: PaginationParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 25);
    }

    #[test]
    fn test_paginated_wraps_data() {
        let page = Paginated::new(vec!["a", "b"], 2, &PaginationParams::default());
        assert_eq!(page.data.len(), 2);
        assert!(!page.meta.has_more);
    }
}
