// =============================================================================
// API ENVELOPE & SHARED RESPONSES
// =============================================================================
// Every endpoint answers with the same envelope:
//
//   { "success": true,  "message": "...", "data": { ... } }
//   { "success": false, "message": "Product not found" }
//
// `message` and `data` are omitted when empty.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying only data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Successful response carrying a message and data
    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Successful response carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Failure envelope, used by the error layer and middleware
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

// =============================================================================
// PAGINATION
// =============================================================================

/// `?page=2&limit=20` query parameters
///
/// Missing values fall back to the per-endpoint default limit.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    /// Resolve to `(page, limit)`; page is at least 1, limit is 1..=100.
    pub fn resolve(&self, default_limit: u32) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, 100);
        (i64::from(page), i64::from(limit))
    }
}

/// Pagination metadata returned next to list payloads
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            page,
            pages,
            total,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

/// Offset of the first row on `page`
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).max(0) * limit
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

/// `GET /api/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Process uptime in seconds
    pub uptime: f64,
    pub database: String,
}

/// `GET /ready`
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
    /// `None` when no cache is configured
    pub cache: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let p = Pagination::new(3, 10, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.pages, 0);
        assert!(!p.has_next);
    }

    #[test]
    fn test_page_params_clamp() {
        let params = PageParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.resolve(12), (1, 100));
        assert_eq!(PageParams::default().resolve(12), (1, 12));
        assert_eq!(page_offset(3, 12), 24);
    }

    #[test]
    fn test_envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::message("Cart cleared")).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "message": "Cart cleared"}));

        let body = serde_json::to_value(ApiResponse::ok(serde_json::json!({"n": 1}))).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": {"n": 1}}));
    }
}
