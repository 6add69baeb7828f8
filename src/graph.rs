use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::index::IndexManager;
use crate::model::{Edge, EdgeId, Node, NodeId, Property};
use crate::storage::{decode_edge, decode_node, PageId, RecordStore};

/// Graph-level CRUD: id assignment, record writes, and index maintenance.
///
/// Ids for nodes and edges are assigned from independent counters starting
/// at 1 and are never reused, not even across reopen.
pub struct GraphStore {
    records: RecordStore,
    index: IndexManager,
    next_node_id: NodeId,
    next_edge_id: EdgeId,
    label_index: HashMap<String, Vec<NodeId>>,
}

impl GraphStore {
    pub fn new(records: RecordStore) -> Self {
        Self {
            records,
            index: IndexManager::new(),
            next_node_id: 1,
            next_edge_id: 1,
            label_index: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId> {
        node.id = self.next_node_id;
        self.next_node_id += 1;
        node.active = true;

        let page_id = self.records.write_node(&node)?;
        self.index.insert_node(node.id, page_id)?;
        for label in &node.labels {
            let bucket = self.label_index.entry(label.clone()).or_default();
            if !bucket.contains(&node.id) {
                bucket.push(node.id);
            }
        }

        info!(node_id = node.id, labels = ?node.labels, "node added");
        Ok(node.id)
    }

    pub fn add_edge(&mut self, mut edge: Edge) -> Result<EdgeId> {
        self.check_assigned(edge.source)?;
        self.check_assigned(edge.target)?;

        edge.id = self.next_edge_id;
        self.next_edge_id += 1;
        edge.active = true;

        let page_id = self.records.write_edge(&edge)?;
        self.index.insert_edge(edge.id, page_id)?;

        info!(
            edge_id = edge.id,
            edge_type = %edge.type_name,
            source = edge.source,
            target = edge.target,
            "edge added"
        );
        Ok(edge.id)
    }

    pub fn get_node(&mut self, node_id: NodeId) -> Result<Node> {
        let page_id = self.index.search_node(node_id)?;
        let node = self.records.read_node(page_id)?;
        if !node.active {
            return Err(GraphError::NotActive {
                entity: "node",
                id: node_id,
            });
        }
        Ok(node)
    }

    pub fn get_edge(&mut self, edge_id: EdgeId) -> Result<Edge> {
        let page_id = self.index.search_edge(edge_id)?;
        let edge = self.records.read_edge(page_id)?;
        if !edge.active {
            return Err(GraphError::NotActive {
                entity: "edge",
                id: edge_id,
            });
        }
        Ok(edge)
    }

    /// Merges the patch into the node's properties (last write wins), writes
    /// the merged record to a fresh page, and repoints the index.
    pub fn update_node(&mut self, node_id: NodeId, patch: &[Property]) -> Result<()> {
        let mut node = self.get_node(node_id)?;
        merge_properties(&mut node.properties, patch);

        let page_id = self.records.write_node(&node)?;
        self.index.delete_node(node_id)?;
        self.index.insert_node(node_id, page_id)?;

        debug!(node_id, "node updated");
        Ok(())
    }

    pub fn update_edge(&mut self, edge_id: EdgeId, patch: &[Property]) -> Result<()> {
        let mut edge = self.get_edge(edge_id)?;
        merge_properties(&mut edge.properties, patch);

        let page_id = self.records.write_edge(&edge)?;
        self.index.delete_edge(edge_id)?;
        self.index.insert_edge(edge_id, page_id)?;

        debug!(edge_id, "edge updated");
        Ok(())
    }

    /// Writes an inactive record for the node and unlinks it from the
    /// primary and label indexes. The inactive record only matters to the
    /// open-time scan, which uses it to keep the id retired.
    pub fn delete_node(&mut self, node_id: NodeId) -> Result<()> {
        let mut node = self.get_node(node_id)?;
        node.active = false;

        self.records.write_node(&node)?;
        self.index.delete_node(node_id)?;
        for label in &node.labels {
            let emptied = match self.label_index.get_mut(label) {
                Some(bucket) => {
                    bucket.retain(|&id| id != node_id);
                    bucket.is_empty()
                }
                None => false,
            };
            if emptied {
                self.label_index.remove(label);
            }
        }

        info!(node_id, "node deleted");
        Ok(())
    }

    pub fn delete_edge(&mut self, edge_id: EdgeId) -> Result<()> {
        let mut edge = self.get_edge(edge_id)?;
        edge.active = false;

        self.records.write_edge(&edge)?;
        self.index.delete_edge(edge_id)?;

        info!(edge_id, "edge deleted");
        Ok(())
    }

    pub fn nodes_with_label(&self, label: &str) -> Vec<NodeId> {
        self.label_index.get(label).cloned().unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.label_index.keys().cloned().collect();
        labels.sort_unstable();
        labels
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids = self.index.node_ids();
        ids.sort_unstable();
        ids
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        let mut ids = self.index.edge_ids();
        ids.sort_unstable();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.index.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.index.edge_count()
    }

    pub fn page_size(&self) -> usize {
        self.records.page_size()
    }

    pub fn page_count(&self) -> u32 {
        self.records.page_count()
    }

    pub fn close(self) -> Result<()> {
        self.records.close()
    }

    /// Rebuilds the in-memory indexes by scanning every record page.
    ///
    /// Writes are append-only, so the newest serialization of an id always
    /// lives on the highest page; scanning in ascending page order and
    /// letting later records shadow earlier ones reconstructs the current
    /// state. Inactive survivors keep their ids retired but are not indexed.
    pub(crate) fn rebuild(&mut self) -> Result<()> {
        let page_count = self.records.page_count();
        if page_count <= 1 {
            return Ok(());
        }

        let mut latest_nodes: HashMap<NodeId, (PageId, Node)> = HashMap::new();
        let mut latest_edges: HashMap<EdgeId, (PageId, Edge)> = HashMap::new();

        for page_id in 1..page_count {
            let page = self.records.raw_page(page_id)?;
            if page[0] == 0 {
                // Allocated but never written.
                continue;
            }
            // A page is taken as a node record when node decoding consumes
            // it up to zero padding; edge decoding is tried second.
            if let Some(node) = decode_padded(&page, decode_node) {
                latest_nodes.insert(node.id, (page_id, node));
            } else if let Some(edge) = decode_padded(&page, decode_edge) {
                latest_edges.insert(edge.id, (page_id, edge));
            } else {
                return Err(GraphError::Malformed(format!(
                    "page {page_id} holds no decodable record"
                )));
            }
        }

        let mut node_ids: Vec<NodeId> = latest_nodes.keys().copied().collect();
        node_ids.sort_unstable();
        for node_id in node_ids {
            let (page_id, node) = &latest_nodes[&node_id];
            self.next_node_id = self.next_node_id.max(node_id + 1);
            if !node.active {
                continue;
            }
            self.index.insert_node(node_id, *page_id)?;
            for label in &node.labels {
                let bucket = self.label_index.entry(label.clone()).or_default();
                if !bucket.contains(&node_id) {
                    bucket.push(node_id);
                }
            }
        }

        let mut edge_ids: Vec<EdgeId> = latest_edges.keys().copied().collect();
        edge_ids.sort_unstable();
        for edge_id in edge_ids {
            let (page_id, edge) = &latest_edges[&edge_id];
            self.next_edge_id = self.next_edge_id.max(edge_id + 1);
            if !edge.active {
                continue;
            }
            self.index.insert_edge(edge_id, *page_id)?;
        }

        info!(
            nodes = self.index.node_count(),
            edges = self.index.edge_count(),
            pages = page_count,
            "rebuilt indexes from file scan"
        );
        Ok(())
    }

    fn check_assigned(&self, node_id: NodeId) -> Result<()> {
        if node_id < 1 || node_id >= self.next_node_id {
            return Err(GraphError::InvalidArgument(format!(
                "edge endpoint {node_id} refers to a node id that was never assigned"
            )));
        }
        Ok(())
    }
}

/// Last write wins per key; keys absent from the patch are preserved and
/// duplicate keys in the existing sequence collapse to one entry.
pub(crate) fn merge_properties(existing: &mut Vec<Property>, patch: &[Property]) {
    let mut merged: Vec<Property> = Vec::with_capacity(existing.len() + patch.len());
    for property in existing.drain(..).chain(patch.iter().cloned()) {
        match merged.iter_mut().find(|p| p.key == property.key) {
            Some(slot) => slot.value = property.value,
            None => merged.push(property),
        }
    }
    *existing = merged;
}

fn decode_padded<T>(page: &[u8], decode: impl Fn(&[u8]) -> Result<(T, usize)>) -> Option<T> {
    match decode(page) {
        Ok((value, used)) if page[used..].iter().all(|&b| b == 0) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyValue;
    use crate::pager::BufferPool;
    use crate::storage::DiskManager;
    use tempfile::NamedTempFile;

    fn graph() -> (NamedTempFile, GraphStore) {
        let tmp = NamedTempFile::new().expect("temp file");
        let disk = DiskManager::open(tmp.path(), 256).expect("open disk");
        let pool = BufferPool::new(disk, 8).expect("buffer pool");
        (tmp, GraphStore::new(RecordStore::new(pool)))
    }

    fn person(name: &str) -> Node {
        Node {
            id: 0,
            labels: vec!["Person".into()],
            properties: vec![Property::new("name", PropertyValue::String(name.into()))],
            active: false,
        }
    }

    #[test]
    fn node_ids_are_monotonic_from_one() {
        let (_tmp, mut graph) = graph();
        assert_eq!(graph.add_node(person("a")).expect("add"), 1);
        assert_eq!(graph.add_node(person("b")).expect("add"), 2);
        assert_eq!(graph.add_node(person("c")).expect("add"), 3);
    }

    #[test]
    fn added_node_is_active_and_readable() {
        let (_tmp, mut graph) = graph();
        let id = graph.add_node(person("a")).expect("add");
        let node = graph.get_node(id).expect("get");
        assert!(node.active);
        assert_eq!(node.labels, vec!["Person".to_string()]);
    }

    #[test]
    fn update_merges_and_preserves_other_keys() {
        let (_tmp, mut graph) = graph();
        let mut node = person("alice");
        node.properties
            .push(Property::new("age", PropertyValue::Int(30)));
        let id = graph.add_node(node).expect("add");

        graph
            .update_node(id, &[Property::new("age", PropertyValue::Int(31))])
            .expect("update");

        let node = graph.get_node(id).expect("get");
        assert_eq!(
            node.property("name"),
            Some(&PropertyValue::String("alice".into()))
        );
        assert_eq!(node.property("age"), Some(&PropertyValue::Int(31)));
        assert_eq!(node.properties.len(), 2);
    }

    #[test]
    fn update_is_idempotent() {
        let (_tmp, mut graph) = graph();
        let id = graph.add_node(person("a")).expect("add");
        let patch = [Property::new("age", PropertyValue::Int(40))];
        graph.update_node(id, &patch).expect("first update");
        let after_first = graph.get_node(id).expect("get");
        graph.update_node(id, &patch).expect("second update");
        let after_second = graph.get_node(id).expect("get");
        assert_eq!(after_first.properties, after_second.properties);
        assert!(after_second.active);
    }

    #[test]
    fn deleted_node_is_unreachable() {
        let (_tmp, mut graph) = graph();
        let id = graph.add_node(person("a")).expect("add");
        graph.delete_node(id).expect("delete");

        assert!(matches!(
            graph.get_node(id),
            Err(GraphError::NotFound { entity: "node", id: 1 })
        ));
        assert!(graph.nodes_with_label("Person").is_empty());
    }

    #[test]
    fn delete_drops_empty_label_bucket() {
        let (_tmp, mut graph) = graph();
        let id = graph.add_node(person("a")).expect("add");
        graph.delete_node(id).expect("delete");
        assert!(graph.labels().is_empty());
    }

    #[test]
    fn edge_endpoints_must_be_assigned() {
        let (_tmp, mut graph) = graph();
        let a = graph.add_node(person("a")).expect("add");
        assert!(matches!(
            graph.add_edge(Edge::new(a, 99, "KNOWS")),
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[test]
    fn edge_survives_deleted_endpoint() {
        let (_tmp, mut graph) = graph();
        let a = graph.add_node(person("a")).expect("add a");
        let b = graph.add_node(person("b")).expect("add b");
        let e = graph.add_edge(Edge::new(a, b, "KNOWS")).expect("add edge");

        graph.delete_node(b).expect("delete b");
        let edge = graph.get_edge(e).expect("edge still visible");
        assert_eq!(edge.target, b);
    }

    #[test]
    fn self_loop_is_allowed() {
        let (_tmp, mut graph) = graph();
        let a = graph.add_node(person("a")).expect("add");
        let e = graph.add_edge(Edge::new(a, a, "SELF")).expect("add edge");
        let edge = graph.get_edge(e).expect("get");
        assert_eq!((edge.source, edge.target), (a, a));
    }

    #[test]
    fn merge_collapses_duplicate_keys() {
        let mut existing = vec![
            Property::new("k", PropertyValue::Int(1)),
            Property::new("k", PropertyValue::Int(2)),
            Property::new("other", PropertyValue::Bool(true)),
        ];
        merge_properties(&mut existing, &[Property::new("k", PropertyValue::Int(3))]);
        assert_eq!(
            existing,
            vec![
                Property::new("k", PropertyValue::Int(3)),
                Property::new("other", PropertyValue::Bool(true)),
            ]
        );
    }

    #[test]
    fn rebuild_restores_state_from_pages() {
        let tmp = NamedTempFile::new().expect("temp file");
        {
            let disk = DiskManager::open(tmp.path(), 256).expect("open disk");
            let pool = BufferPool::new(disk, 8).expect("buffer pool");
            let mut graph = GraphStore::new(RecordStore::new(pool));
            let a = graph.add_node(person("a")).expect("add a");
            let b = graph.add_node(person("b")).expect("add b");
            graph.add_edge(Edge::new(a, b, "KNOWS")).expect("add edge");
            graph
                .update_node(a, &[Property::new("age", PropertyValue::Int(9))])
                .expect("update");
            graph.delete_node(b).expect("delete b");
            graph.close().expect("close");
        }

        let disk = DiskManager::open(tmp.path(), 256).expect("reopen disk");
        let pool = BufferPool::new(disk, 8).expect("buffer pool");
        let mut graph = GraphStore::new(RecordStore::new(pool));
        graph.rebuild().expect("rebuild");

        let a = graph.get_node(1).expect("node a survives");
        assert_eq!(a.property("age"), Some(&PropertyValue::Int(9)));
        assert!(matches!(
            graph.get_node(2),
            Err(GraphError::NotFound { entity: "node", id: 2 })
        ));
        assert_eq!(graph.nodes_with_label("Person"), vec![1]);
        let edge = graph.get_edge(1).expect("edge survives");
        assert_eq!((edge.source, edge.target), (1, 2));

        // Id sequences continue instead of restarting.
        assert_eq!(graph.add_node(person("c")).expect("add c"), 3);
    }
}
