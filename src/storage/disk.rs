use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{GraphError, Result};

pub type PageId = u32;

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const MIN_PAGE_SIZE: usize = 64;

const MAGIC: &[u8; 4] = b"GDB\0";
const PAGE_SIZE_OFFSET: usize = 4;
const PAGE_COUNT_OFFSET: usize = 8;

/// Page-granular file I/O. Page 0 is the header; records live on pages >= 1.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    page_size: usize,
    page_count: u32,
}

impl DiskManager {
    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        if page_size < MIN_PAGE_SIZE {
            return Err(GraphError::InvalidArgument(format!(
                "page size {page_size} is below the minimum of {MIN_PAGE_SIZE}"
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut disk = Self {
            file,
            page_size,
            page_count: 0,
        };

        if file_len == 0 {
            disk.page_count = 1;
            disk.write_header()?;
            info!(path = %path.display(), page_size, "initialized new database file");
        } else {
            if file_len % page_size as u64 != 0 {
                return Err(GraphError::InvalidArgument(format!(
                    "file length {file_len} is not a multiple of page size {page_size}"
                )));
            }
            disk.page_count = (file_len / page_size as u64) as u32;
            disk.verify_header()?;
            debug!(path = %path.display(), pages = disk.page_count, "opened existing database file");
        }

        Ok(disk)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn read_page(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        if page_id >= self.page_count {
            return Err(GraphError::InvalidArgument(format!(
                "page {page_id} is out of range (page count {})",
                self.page_count
            )));
        }
        let mut data = vec![0u8; self.page_size];
        self.file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        self.file.read_exact(&mut data)?;
        Ok(data)
    }

    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if page_id >= self.page_count {
            return Err(GraphError::InvalidArgument(format!(
                "page {page_id} is out of range (page count {})",
                self.page_count
            )));
        }
        if data.len() != self.page_size {
            return Err(GraphError::InvalidArgument(format!(
                "page write of {} bytes does not match page size {}",
                data.len(),
                self.page_size
            )));
        }
        self.file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Zero-fills a fresh page at the end of the file and records the new
    /// count in the header before returning the page id.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = self.page_count;
        let zeroes = vec![0u8; self.page_size];
        self.file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        self.file.write_all(&zeroes)?;
        self.page_count += 1;

        self.file
            .seek(SeekFrom::Start(PAGE_COUNT_OFFSET as u64))?;
        self.file.write_all(&self.page_count.to_le_bytes())?;

        debug!(page_id, "allocated page");
        Ok(page_id)
    }

    pub fn sync_and_close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn offset_of(&self, page_id: PageId) -> u64 {
        u64::from(page_id) * self.page_size as u64
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = vec![0u8; self.page_size];
        header[..MAGIC.len()].copy_from_slice(MAGIC);
        header[PAGE_SIZE_OFFSET..PAGE_SIZE_OFFSET + 4]
            .copy_from_slice(&(self.page_size as u32).to_le_bytes());
        header[PAGE_COUNT_OFFSET..PAGE_COUNT_OFFSET + 4]
            .copy_from_slice(&self.page_count.to_le_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        Ok(())
    }

    fn verify_header(&mut self) -> Result<()> {
        let header = self.read_page(0)?;
        if &header[..MAGIC.len()] != MAGIC {
            return Err(GraphError::Malformed(
                "file does not start with the GDB magic".into(),
            ));
        }
        let stored_page_size = u32::from_le_bytes(
            header[PAGE_SIZE_OFFSET..PAGE_SIZE_OFFSET + 4]
                .try_into()
                .expect("slice is 4 bytes"),
        );
        if stored_page_size as usize != self.page_size {
            return Err(GraphError::Malformed(format!(
                "header page size {stored_page_size} does not match configured {}",
                self.page_size
            )));
        }
        Ok(())
    }
}
