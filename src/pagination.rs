use serde::Deserialize;

use crate::extract::empty_string_as_none;

const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` query. Pages are 1-indexed; paging only applies when both
/// values are present, otherwise the full list is returned.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub per_page: Option<i64>,
}

/// Resolved `LIMIT`/`OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn window(&self) -> Option<Window> {
        let (page, per_page) = (self.page?, self.per_page?);
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        // An offset past i64 lies beyond any result set.
        let offset = per_page.checked_mul(page - 1).unwrap_or(i64::MAX);
        Some(Window {
            limit: per_page,
            offset,
        })
    }
}

impl Window {
    /// Applies the window to an already ordered in-memory list.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}
