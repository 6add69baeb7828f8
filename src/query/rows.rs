use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Edge, EdgeId, Node, NodeId, PropertyValue};

/// One result row: a map keyed by RETURN identifier. Rows produced by this
/// engine carry exactly one entry each.
pub type Row = BTreeMap<String, ResultCell>;

/// The value shape of a returned entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultCell {
    Node {
        id: NodeId,
        labels: Vec<String>,
        properties: BTreeMap<String, PropertyValue>,
    },
    Edge {
        id: EdgeId,
        #[serde(rename = "type")]
        edge_type: String,
        source: NodeId,
        target: NodeId,
        properties: BTreeMap<String, PropertyValue>,
    },
}

impl ResultCell {
    pub fn from_node(node: &Node) -> Self {
        ResultCell::Node {
            id: node.id,
            labels: node.labels.clone(),
            properties: collapse(&node.properties),
        }
    }

    pub fn from_edge(edge: &Edge) -> Self {
        ResultCell::Edge {
            id: edge.id,
            edge_type: edge.type_name.clone(),
            source: edge.source,
            target: edge.target,
            properties: collapse(&edge.properties),
        }
    }
}

pub(crate) fn row(identifier: &str, cell: ResultCell) -> Row {
    let mut row = Row::new();
    row.insert(identifier.to_string(), cell);
    row
}

/// Collapses the ordered property sequence into a map, last write winning.
fn collapse(properties: &[crate::model::Property]) -> BTreeMap<String, PropertyValue> {
    properties
        .iter()
        .map(|p| (p.key.clone(), p.value.clone()))
        .collect()
}
