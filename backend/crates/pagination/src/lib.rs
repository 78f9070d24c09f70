//! Page-number pagination primitives shared by listing endpoints.
//!
//! Listing endpoints accept a 1-based `page` and a positive `size`, and reply
//! with an envelope carrying the requested slice plus the total page count.
//! [`PageRequest`] validates the inputs once at the adapter boundary so
//! repositories can trust the offset/limit maths.

use serde::Serialize;
use thiserror::Error;

/// Validation failures for pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageRequestError {
    /// Either `page` or `size` was zero or negative.
    #[error("\"page\" and \"size\" must be positive numbers")]
    NotPositive,
}

/// Validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    size: i64,
}

impl PageRequest {
    /// Validate and construct a page request.
    ///
    /// # Errors
    /// Returns [`PageRequestError::NotPositive`] when `page` or `size` is not
    /// strictly positive.
    pub fn new(page: i64, size: i64) -> Result<Self, PageRequestError> {
        if page < 1 || size < 1 {
            return Err(PageRequestError::NotPositive);
        }
        Ok(Self { page, size })
    }

    /// Requested page number (1-based).
    #[must_use]
    pub fn page(&self) -> i64 {
        self.page
    }

    /// Requested page size.
    #[must_use]
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Row offset for the underlying query.
    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.size
    }

    /// Row limit for the underlying query.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.size
    }

    /// Number of pages needed to cover `total` rows at this page size.
    #[must_use]
    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            return 0;
        }
        (total + self.size - 1) / self.size
    }
}

/// Response envelope pairing a page of items with the total page count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on the requested page.
    pub list: Vec<T>,
    /// Total number of pages for the filtered result set.
    pub total_pages: i64,
}

impl<T> Page<T> {
    /// Build an envelope from a loaded slice and the filtered row count.
    pub fn new(list: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            list,
            total_pages: request.total_pages(total),
        }
    }
}
