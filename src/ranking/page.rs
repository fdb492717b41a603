//! Rank to page arithmetic shared by comment listing and the write paths.
//!
//! A rank is the 1-based count of comments at or before a comment in sort-key
//! order. Pages are 0-based, matching the `page` query parameter of listings.

use serde::Serialize;

use crate::error::AppError;

/// Upper bound on the page size a client may ask for.
pub const MAX_PAGE_SIZE: i64 = 100;

/// 0-based page containing the comment at `rank`.
pub fn page_number_of(rank: i64, page_size: i64) -> i64 {
    let page_size = page_size.max(1);
    (rank.max(1) - 1) / page_size
}

/// Number of pages needed for `total` rows.
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    let page_size = page_size.max(1);
    (total.max(0) + page_size - 1) / page_size
}

/// Offset/limit window of a listing request. Only built through [`PageRequest::new`],
/// so `offset()` cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: i64,
    size: i64,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Result<Self, AppError> {
        if page < 0 {
            return Err(AppError::BadRequest("page must not be negative".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(AppError::BadRequest(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if page.checked_mul(size).is_none() {
            return Err(AppError::BadRequest(format!("page {page} is out of range")));
        }
        Ok(Self { page, size })
    }

    pub fn offset(&self) -> i64 {
        self.page * self.size
    }

    pub fn limit(&self) -> i64 {
        self.size
    }
}

/// One page of a listing plus the totals a client needs to render a pager.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: i64) -> Self {
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_pages(total_elements, request.size),
        }
    }
}
