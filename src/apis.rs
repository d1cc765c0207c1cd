//! Shared API plumbing: business rejection payloads and pagination.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Business-logic rejection, carried to the client as a flat
/// `{error, data, message}` payload with HTTP 200.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{error}: {message}")]
pub struct ApiError {
    pub error: String,
    pub data: String,
    pub message: String,
}

impl ApiError {
    pub fn new(
        error: impl Into<String>,
        data: impl Into<String>,
        message: impl Into<String>,
    ) -> ApiError {
        ApiError {
            error: error.into(),
            data: data.into(),
            message: message.into(),
        }
    }

    /// Input value the handler cannot accept; `data` names the field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> ApiError {
        ApiError::new("value:invalid", field, message)
    }

    /// Referenced resource does not exist; `data` names it.
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> ApiError {
        ApiError::new("value:notfound", resource, message)
    }

    pub fn permission(message: impl Into<String>) -> ApiError {
        ApiError::new("permission:forbidden", "permission", message)
    }

    pub fn body(&self) -> Value {
        serde_json::json!({
            "error": self.error,
            "data": self.data,
            "message": self.message,
        })
    }
}

/// Pagination window over a counted result set. An empty set or an index
/// past the last page yields a zero-row window while keeping the requested
/// index, so clients can render the page they asked for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub item_count: u64,
    pub page_index: u64,
    pub page_size: u64,
    pub page_count: u64,
    pub offset: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    pub fn new(item_count: u64, page_index: u64) -> Page {
        Page::with_size(item_count, page_index, 10)
    }

    pub fn with_size(item_count: u64, page_index: u64, page_size: u64) -> Page {
        let page_size = page_size.max(1);
        let page_index = page_index.max(1);
        let page_count = item_count / page_size + u64::from(item_count % page_size > 0);
        let (offset, limit) = if item_count == 0 || page_index > page_count {
            (0, 0)
        } else {
            (page_size * (page_index - 1), page_size)
        };
        Page {
            item_count,
            page_index,
            page_size,
            page_count,
            offset,
            limit,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }
}

/// Parse a page number; anything that is not a number, or is below one,
/// falls back to the first page.
pub fn page_index_of(s: &str) -> u64 {
    match s.trim().parse::<i64>() {
        Ok(n) if n >= 1 => n as u64,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn a_hundred_items_paginate_into_ten_pages() {
        let p = Page::new(100, 1);
        assert_eq!(p.page_count, 10);
        assert_eq!(p.offset, 0);
        assert_eq!(p.limit, 10);
        assert!(p.has_next);
        assert!(!p.has_previous);
    }

    #[test]
    fn the_last_partial_page_starts_at_its_offset() {
        let p = Page::new(91, 10);
        assert_eq!(p.page_count, 10);
        assert_eq!(p.offset, 90);
        assert_eq!(p.limit, 10);
        assert!(!p.has_next);
        assert!(p.has_previous);

        let p = Page::new(90, 9);
        assert_eq!(p.page_count, 9);
        assert_eq!(p.offset, 80);
    }

    #[test]
    fn empty_and_past_end_windows_keep_the_requested_index() {
        let p = Page::new(0, 2);
        assert_eq!(p.page_index, 2);
        assert_eq!((p.offset, p.limit), (0, 0));
        assert_eq!(p.page_count, 0);
        assert!(!p.has_next);

        let p = Page::new(10, 99);
        assert_eq!(p.page_index, 99);
        assert_eq!((p.offset, p.limit), (0, 0));
    }

    #[test]
    fn page_indexes_parse_leniently() {
        assert_eq!(page_index_of("2"), 2);
        assert_eq!(page_index_of(" 7 "), 7);
        assert_eq!(page_index_of("0"), 1);
        assert_eq!(page_index_of("-3"), 1);
        assert_eq!(page_index_of("abc"), 1);
        assert_eq!(page_index_of(""), 1);
    }

    #[test]
    fn rejection_constructors_fill_the_payload_fields() {
        let e = ApiError::invalid("email", "Invalid email.");
        assert_eq!(e.error, "value:invalid");
        assert_eq!(e.data, "email");

        let e = ApiError::not_found("blog", "Blog not found.");
        assert_eq!(e.error, "value:notfound");

        let e = ApiError::permission("");
        assert_eq!(e.error, "permission:forbidden");
        assert_eq!(e.data, "permission");
        assert_eq!(
            e.body(),
            serde_json::json!({"error": "permission:forbidden", "data": "permission", "message": ""})
        );
    }
}
