//! Domain models for the storefront.
//!
//! These are the validated types handlers work with and the shapes the JSON
//! API returns. Database row types live next to their queries in `db`.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

use serde::{Deserialize, Serialize};

pub use session::{CurrentUser, Impersonator, keys as session_keys};
pub use user::User;

/// Default page size for customer-facing listings.
pub const DEFAULT_PER_PAGE: u32 = 24;
/// Largest page size a client may request.
pub const MAX_PER_PAGE: u32 = 100;

/// Query-string pagination (`?page=2&per_page=24`).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Normalised 1-based pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    /// Apply defaults and clamp to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn from_params(params: PageParams, default_per_page: u32) -> Self {
        Self {
            page: params.page.unwrap_or(1).max(1),
            per_page: params
                .per_page
                .unwrap_or(default_per_page)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.per_page)
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        crate::db::page_offset(self.page, self.per_page)
    }
}

/// A page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Self {
        let seen = page.offset().saturating_add(i64::try_from(items.len()).unwrap_or(i64::MAX));
        Self {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
            has_more: seen < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let page = Page::from_params(PageParams::default(), DEFAULT_PER_PAGE);
        assert_eq!(page, Page { page: 1, per_page: 24 });
    }

    #[test]
    fn test_page_clamps() {
        let page = Page::from_params(
            PageParams {
                page: Some(0),
                per_page: Some(500),
            },
            DEFAULT_PER_PAGE,
        );
        assert_eq!(page, Page { page: 1, per_page: 100 });

        let page = Page::from_params(
            PageParams {
                page: Some(2),
                per_page: Some(0),
            },
            DEFAULT_PER_PAGE,
        );
        assert_eq!(page.per_page, 1);
    }

    #[test]
    fn test_paginated_has_more() {
        let page = Page { page: 1, per_page: 2 };
        assert!(Paginated::new(vec![1, 2], page, 5).has_more);

        let last = Page { page: 3, per_page: 2 };
        assert!(!Paginated::new(vec![5], last, 5).has_more);
    }
}
