//! Shared pagination utilities
//!
//! Converts client page parameters into a store [`PageRequest`] and a store
//! [`ListResult`] back into response metadata.
//!
//! # Examples
//!
//! ```rust,ignore
//! use reqaudit_server::features::shared::pagination::{PaginationParams, PaginationMetadata};
//!
//! let params = PaginationParams::new(Some(2), Some(20));
//! let request = params.page_request(Sort::desc("spec.accessTime"));
//!
//! // After fetching data...
//! let metadata = PaginationMetadata::from_result(&result);
//! ```

use serde::{Deserialize, Serialize};

use crate::store::{ListResult, PageRequest, Sort};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Common pagination request parameters
///
/// Defaults to page 1 with 20 items per page.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,

    /// Items per page. Defaults to 20, clamped to 1-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

impl PaginationParams {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self { page, per_page }
    }

    /// Get the page number (1-indexed), defaulting to 1
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(DEFAULT_PAGE).max(1)
    }

    /// Get items per page, defaulting to 20 and clamped to 1-100
    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Validate pagination parameters
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(page) = self.page {
            if page < 1 {
                return Err("Page must be greater than 0");
            }
        }
        if let Some(per_page) = self.per_page {
            if !(1..=MAX_PER_PAGE).contains(&per_page) {
                return Err("Per page must be between 1 and 100");
            }
        }
        Ok(())
    }

    /// Store page request for these parameters
    pub fn page_request(&self, sort: Sort) -> PageRequest {
        // both values are clamped positive above
        PageRequest::new(self.page() as u64, self.per_page() as u64, sort)
    }
}

/// Pagination metadata for response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMetadata {
    /// Current page number (1-indexed)
    pub page: u64,

    /// Items per page
    pub per_page: u64,

    /// Total number of items
    pub total: u64,

    /// Total number of pages
    pub pages: u64,

    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMetadata {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        let pages = if per_page == 0 { 0 } else { total.div_ceil(per_page) };

        Self {
            page,
            per_page,
            total,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }

    pub fn from_result<T>(result: &ListResult<T>) -> Self {
        Self::new(result.page, result.size, result.total)
    }
}
