//! Response envelopes shared by list endpoints

use serde::{Deserialize, Serialize};

use crate::db::{PageRequest, PageSlice};
use crate::server::AppState;

/// Offset pagination envelope
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(slice: PageSlice<T>, request: PageRequest) -> Self {
        let size = u64::from(request.page_size);
        Self {
            data: slice.items,
            page: request.page,
            page_size: request.page_size,
            total: slice.total,
            total_pages: slice.total.div_ceil(size),
        }
    }
}

/// `page` and `page_size` (or `pageSize`) query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
}

impl PageParams {
    /// Clamp against the configured default and maximum page size
    pub fn resolve(&self, state: &AppState) -> PageRequest {
        PageRequest::new(
            self.page,
            self.page_size,
            state.settings.default_page_size,
            state.settings.max_page_size,
        )
    }
}
