use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::model::{EdgeId, NodeId};
use crate::storage::PageId;

/// Primary in-memory indexes mapping entity ids to the page holding their
/// most recent serialization. Rebuilt from a file scan at open time.
#[derive(Debug, Default)]
pub struct IndexManager {
    node_index: HashMap<NodeId, PageId>,
    edge_index: HashMap<EdgeId, PageId>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, node_id: NodeId, page_id: PageId) -> Result<()> {
        if self.node_index.contains_key(&node_id) {
            return Err(GraphError::DuplicateId {
                entity: "node",
                id: node_id,
            });
        }
        self.node_index.insert(node_id, page_id);
        Ok(())
    }

    pub fn insert_edge(&mut self, edge_id: EdgeId, page_id: PageId) -> Result<()> {
        if self.edge_index.contains_key(&edge_id) {
            return Err(GraphError::DuplicateId {
                entity: "edge",
                id: edge_id,
            });
        }
        self.edge_index.insert(edge_id, page_id);
        Ok(())
    }

    pub fn search_node(&self, node_id: NodeId) -> Result<PageId> {
        self.node_index
            .get(&node_id)
            .copied()
            .ok_or(GraphError::NotFound {
                entity: "node",
                id: node_id,
            })
    }

    pub fn search_edge(&self, edge_id: EdgeId) -> Result<PageId> {
        self.edge_index
            .get(&edge_id)
            .copied()
            .ok_or(GraphError::NotFound {
                entity: "edge",
                id: edge_id,
            })
    }

    pub fn delete_node(&mut self, node_id: NodeId) -> Result<()> {
        self.node_index
            .remove(&node_id)
            .map(|_| ())
            .ok_or(GraphError::NotFound {
                entity: "node",
                id: node_id,
            })
    }

    pub fn delete_edge(&mut self, edge_id: EdgeId) -> Result<()> {
        self.edge_index
            .remove(&edge_id)
            .map(|_| ())
            .ok_or(GraphError::NotFound {
                entity: "edge",
                id: edge_id,
            })
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.node_index.keys().copied().collect()
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edge_index.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }
}
