//! The uniform response envelope wrapped around every API payload.
//!
//! Business failures come back as `success: false` with an `error` block,
//! sometimes under a 2xx status, so callers branch on `success` rather than
//! on the HTTP status alone.

use serde::Deserialize;

use super::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub meta: Option<ApiMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMeta {
    pub timestamp: Option<String>,
    pub franchise_id: Option<i32>,
    pub franchise_name: Option<String>,
    pub request_id: Option<String>,
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl ApiErrorBody {
    fn details_text(&self) -> Option<String> {
        match &self.details {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, turning `success: false` into `ApiError::Business`
    /// carrying the server's message (or `fallback` when none was sent).
    pub fn into_data(self, fallback: &str) -> Result<T, ApiError> {
        if self.success {
            if let Some(data) = self.data {
                return Ok(data);
            }
        }
        let error = self.error.unwrap_or_default();
        let details = error.details_text();
        Err(ApiError::Business {
            code: error.code,
            message: error
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
            details,
        })
    }

    /// Like `into_data` for endpoints that return no payload.
    pub fn into_ack(self, fallback: &str) -> Result<(), ApiError> {
        if self.success {
            return Ok(());
        }
        let error = self.error.unwrap_or_default();
        let details = error.details_text();
        Err(ApiError::Business {
            code: error.code,
            message: error
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
            details,
        })
    }
}
