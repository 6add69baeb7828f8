use tracing::debug;

use crate::error::{GraphError, Result};
use crate::model::{Edge, Node};
use crate::pager::BufferPool;
use crate::storage::disk::PageId;
use crate::storage::ser::{deserialize_edge, deserialize_node, serialize_edge, serialize_node};

/// Page-level record storage. Every write serializes into a freshly
/// allocated page (append-only); updates never reuse the previous page.
pub struct RecordStore {
    pool: BufferPool,
}

impl RecordStore {
    pub fn new(pool: BufferPool) -> Self {
        Self { pool }
    }

    pub fn page_size(&self) -> usize {
        self.pool.page_size()
    }

    pub fn page_count(&self) -> u32 {
        self.pool.page_count()
    }

    pub fn write_node(&mut self, node: &Node) -> Result<PageId> {
        self.write_record(serialize_node(node)?)
    }

    pub fn write_edge(&mut self, edge: &Edge) -> Result<PageId> {
        self.write_record(serialize_edge(edge)?)
    }

    pub fn read_node(&mut self, page_id: PageId) -> Result<Node> {
        let page = self.pool.get_page(page_id)?;
        deserialize_node(&page)
    }

    pub fn read_edge(&mut self, page_id: PageId) -> Result<Edge> {
        let page = self.pool.get_page(page_id)?;
        deserialize_edge(&page)
    }

    pub(crate) fn raw_page(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        self.pool.get_page(page_id)
    }

    pub fn close(self) -> Result<()> {
        self.pool.close()
    }

    fn write_record(&mut self, mut data: Vec<u8>) -> Result<PageId> {
        let page_size = self.pool.page_size();
        if data.len() > page_size {
            return Err(GraphError::RecordTooLarge {
                size: data.len(),
                page_size,
            });
        }
        let page_id = self.pool.allocate_page()?;
        data.resize(page_size, 0);
        self.pool.write_page(page_id, data)?;
        debug!(page_id, "record written");
        Ok(page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Property, PropertyValue};
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    const PAGE_SIZE: usize = 128;

    fn store() -> (NamedTempFile, RecordStore) {
        let tmp = NamedTempFile::new().expect("temp file");
        let disk = DiskManager::open(tmp.path(), PAGE_SIZE).expect("open disk");
        let pool = BufferPool::new(disk, 4).expect("buffer pool");
        (tmp, RecordStore::new(pool))
    }

    /// A node whose serialized form is exactly `total` bytes long.
    fn node_of_serialized_len(total: usize) -> Node {
        // Fixed framing: version + id + active + label count + label length
        // + property count = 22 bytes; the label fills the rest.
        let label_len = total - 22;
        Node {
            id: 1,
            labels: vec!["x".repeat(label_len)],
            properties: Vec::new(),
            active: true,
        }
    }

    #[test]
    fn node_write_read_round_trip() {
        let (_tmp, mut store) = store();
        let node = Node {
            id: 1,
            labels: vec!["Person".into()],
            properties: vec![Property::new("name", PropertyValue::String("A".into()))],
            active: true,
        };
        let page_id = store.write_node(&node).expect("write");
        assert_eq!(store.read_node(page_id).expect("read"), node);
    }

    #[test]
    fn every_write_allocates_a_fresh_page() {
        let (_tmp, mut store) = store();
        let mut node = Node::new();
        node.id = 1;
        node.active = true;
        let first = store.write_node(&node).expect("write");
        let second = store.write_node(&node).expect("write");
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn record_of_exactly_page_size_fits() {
        let (_tmp, mut store) = store();
        let node = node_of_serialized_len(PAGE_SIZE);
        let page_id = store.write_node(&node).expect("write");
        assert_eq!(store.read_node(page_id).expect("read"), node);
    }

    #[test]
    fn record_one_byte_over_page_size_is_rejected() {
        let (_tmp, mut store) = store();
        let node = node_of_serialized_len(PAGE_SIZE + 1);
        assert!(matches!(
            store.write_node(&node),
            Err(GraphError::RecordTooLarge { size, page_size })
                if size == PAGE_SIZE + 1 && page_size == PAGE_SIZE
        ));
    }
}
