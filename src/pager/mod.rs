use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::storage::{DiskManager, PageId};

pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Write-through LRU page cache over the disk manager.
///
/// The pool owns its cached buffers; callers always receive copies, so an
/// eviction can never invalidate a page a caller is still holding.
pub struct BufferPool {
    disk: DiskManager,
    cache: LruCache<PageId, Vec<u8>>,
}

impl BufferPool {
    pub fn new(disk: DiskManager, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            GraphError::InvalidArgument("buffer capacity must be at least 1".into())
        })?;
        Ok(Self {
            disk,
            cache: LruCache::new(capacity),
        })
    }

    pub fn page_size(&self) -> usize {
        self.disk.page_size()
    }

    pub fn page_count(&self) -> u32 {
        self.disk.page_count()
    }

    pub fn get_page(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        if let Some(data) = self.cache.get(&page_id) {
            return Ok(data.clone());
        }
        let data = self.disk.read_page(page_id)?;
        self.cache.push(page_id, data.clone());
        debug!(page_id, "page loaded into buffer pool");
        Ok(data)
    }

    /// Write-through: the page hits disk first, then the cache entry is
    /// updated (or inserted) and marked most recently used.
    pub fn write_page(&mut self, page_id: PageId, data: Vec<u8>) -> Result<()> {
        self.disk.write_page(page_id, &data)?;
        self.cache.push(page_id, data);
        Ok(())
    }

    pub fn allocate_page(&mut self) -> Result<PageId> {
        self.disk.allocate_page()
    }

    /// Drops all cached entries; disk holds the durable copy.
    pub fn close(mut self) -> Result<()> {
        self.cache.clear();
        self.disk.sync_and_close()
    }

    #[cfg(test)]
    fn cached_page_ids(&self) -> Vec<PageId> {
        self.cache.iter().map(|(&id, _)| id).collect()
    }
}
