//! Page-based pagination helpers

use serde::Serialize;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// A single page of query results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Total number of matching rows
    pub total: i64,
    /// Number of pages for the requested size, never less than 1
    pub total_page: i64,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub size: u32,
    /// Rows on this page
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Builds a page, deriving `total_page` from `total` and `size`
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, page: u32, size: u32) -> Self {
        let size_i64 = i64::from(size.max(1));
        let total_page = ((total + size_i64 - 1) / size_i64).max(1);

        Self {
            total,
            total_page,
            page,
            size,
            items,
        }
    }
}

/// Returns the row offset for a 1-based page
#[must_use]
pub fn offset(page: u32, size: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(size)
}
