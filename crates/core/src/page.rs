//! Paginated list envelope shared by list endpoints.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page,
            page_size,
            total_pages: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}
