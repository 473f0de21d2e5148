use crate::error::{ApiError, ApiResult};

/// A page of an owner's listing, resolved against the current row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub current_page: i64,
    pub total_pages: i64,
    pub page_size: i64,
    pub offset: i64,
}

/// Resolve the requested page against `total` rows.
///
/// `page` is clamped into `[1, total_pages]` and `page_size` is clamped to
/// `max_page_size`. There is always at least one page, even when empty.
pub fn resolve(page: i64, page_size: i64, max_page_size: i64, total: i64) -> ApiResult<Window> {
    if page_size <= 0 {
        return Err(ApiError::BadRequest(
            "page_size must be a positive integer".to_owned(),
        ));
    }

    let page_size = page_size.min(max_page_size.max(1));
    let total_pages = ((total.max(0) + page_size - 1) / page_size).max(1);
    let current_page = page.clamp(1, total_pages);

    Ok(Window {
        current_page,
        total_pages,
        page_size,
        offset: (current_page - 1) * page_size,
    })
}
