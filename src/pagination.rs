//! This modules defines the common functionality for paging data.

use serde::{Deserialize, Serialize};

/// The config for pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Resolve the requested page and page size, filling in defaults and
    /// clamping values to the allowed range.
    pub fn resolve(&self, page: Option<u64>, page_size: Option<u64>) -> Page {
        let page = page.unwrap_or(self.default_page).max(1);
        let page_size = page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);

        Page { page, page_size }
    }
}

/// A page number and size after defaults and limits have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// The 1-based page number.
    pub page: u64,
    /// The number of items per page.
    pub page_size: u64,
}

impl Page {
    /// The number of rows to skip to get to this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of items plus the information needed to fetch the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// The 1-based page number.
    pub page: u64,
    /// The number of items per page.
    pub page_size: u64,
    /// The number of items across all pages.
    pub total_count: u64,
    /// The number of pages.
    pub total_pages: u64,
}

impl<T> PagedResponse<T> {
    /// Wrap the items of `page`.
    pub fn new(items: Vec<T>, page: Page, total_count: u64) -> Self {
        Self {
            items,
            page: page.page,
            page_size: page.page_size,
            total_count,
            total_pages: total_count.div_ceil(page.page_size),
        }
    }
}
