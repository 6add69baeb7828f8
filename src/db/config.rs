use crate::pager::DEFAULT_BUFFER_CAPACITY;
use crate::storage::DEFAULT_PAGE_SIZE;

/// Open-time knobs. Both are fixed for the lifetime of the handle; the page
/// size additionally must match the file it opens.
#[derive(Debug, Clone)]
pub struct Config {
    pub page_size: usize,
    pub buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}
