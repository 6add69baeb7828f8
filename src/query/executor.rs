use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::graph::{merge_properties, GraphStore};
use crate::model::{Edge, EdgeId, Node, NodeId, Property, PropertyValue};
use crate::query::ast::{AstKind, AstNode, TAG_BOOL, TAG_INT, TAG_STRING};
use crate::query::rows::{row, ResultCell, Row};
use crate::txn::{TransactionOp, TxId, TxnManager};

/// A query variable is bound to either a list of nodes or a list of edges.
#[derive(Debug, Clone)]
pub enum Binding {
    Nodes(Vec<Node>),
    Edges(Vec<Edge>),
}

impl Binding {
    fn kind(&self) -> &'static str {
        match self {
            Binding::Nodes(_) => "nodes",
            Binding::Edges(_) => "edges",
        }
    }
}

/// Executes parsed queries clause by clause against the graph store,
/// maintaining a per-transaction variable environment.
pub struct Executor {
    env: HashMap<TxId, HashMap<String, Binding>>,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            env: HashMap::new(),
        }
    }

    /// Runs the clauses of a query in source order. The transaction's
    /// environment is dropped when the query finishes, error or not.
    pub fn execute(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        query: &AstNode,
    ) -> Result<Vec<Row>> {
        if query.kind != AstKind::Query {
            return Err(GraphError::InvalidArgument(
                "executor expects a query root node".into(),
            ));
        }
        self.env.insert(tx_id, HashMap::new());
        let result = self.run_clauses(graph, txns, tx_id, query);
        self.env.remove(&tx_id);
        result
    }

    fn run_clauses(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        query: &AstNode,
    ) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for clause in &query.children {
            match clause.kind {
                AstKind::Create => self.exec_create(graph, txns, tx_id, clause)?,
                AstKind::Match => self.exec_match(graph, tx_id, clause)?,
                AstKind::Where => self.exec_where(tx_id, clause)?,
                AstKind::Set => self.exec_set(graph, txns, tx_id, clause)?,
                AstKind::Delete => self.exec_delete(graph, txns, tx_id, clause)?,
                AstKind::Return => rows = self.exec_return(tx_id, clause)?,
                other => {
                    return Err(GraphError::InvalidArgument(format!(
                        "unsupported clause {other:?}"
                    )))
                }
            }
        }
        debug!(tx_id, rows = rows.len(), "query executed");
        Ok(rows)
    }

    fn exec_create(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        clause: &AstNode,
    ) -> Result<()> {
        for pattern in &clause.children {
            match pattern.children.len() {
                1 => {
                    self.create_node(graph, txns, tx_id, &pattern.children[0])?;
                }
                3 => self.create_relationship(graph, txns, tx_id, pattern)?,
                _ => {
                    return Err(GraphError::InvalidArgument(
                        "malformed CREATE pattern".into(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Builds and stores a node from a pattern element, binding the pattern
    /// variable (if named) to the stored node.
    fn create_node(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        ast: &AstNode,
    ) -> Result<NodeId> {
        let node = node_from_ast(ast)?;
        let node_id = graph.add_node(node)?;
        txns.record(tx_id, TransactionOp::AddNode { node_id })?;

        if !ast.value.is_empty() {
            let stored = graph.get_node(node_id)?;
            self.append_node(tx_id, &ast.value, stored)?;
        }
        info!(tx_id, node_id, "node created");
        Ok(node_id)
    }

    fn create_relationship(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        pattern: &AstNode,
    ) -> Result<()> {
        let source = self.resolve_endpoint(graph, txns, tx_id, &pattern.children[0])?;
        let target = self.resolve_endpoint(graph, txns, tx_id, &pattern.children[2])?;

        let rel = &pattern.children[1];
        let type_name = rel
            .child_of_kind(AstKind::Type)
            .map(|t| t.value.clone())
            .ok_or_else(|| {
                GraphError::InvalidArgument("relationship type is required in CREATE".into())
            })?;

        let edge = Edge {
            id: 0,
            type_name,
            source,
            target,
            properties: properties_from_ast(rel)?,
            active: false,
        };
        let edge_id = graph.add_edge(edge)?;
        txns.record(tx_id, TransactionOp::AddEdge { edge_id })?;

        if !rel.value.is_empty() {
            let stored = graph.get_edge(edge_id)?;
            self.append_edge(tx_id, &rel.value, stored)?;
        }
        info!(tx_id, edge_id, source, target, "relationship created");
        Ok(())
    }

    /// An endpoint reuses the node its variable is bound to when that
    /// binding holds exactly one node; anything else creates a fresh node.
    fn resolve_endpoint(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        ast: &AstNode,
    ) -> Result<NodeId> {
        if !ast.value.is_empty() {
            if let Some(Binding::Nodes(nodes)) = self.bindings(tx_id)?.get(&ast.value) {
                if nodes.len() == 1 {
                    return Ok(nodes[0].id);
                }
            }
        }
        self.create_node(graph, txns, tx_id, ast)
    }

    fn exec_match(&mut self, graph: &mut GraphStore, tx_id: TxId, clause: &AstNode) -> Result<()> {
        if clause.children.len() != 1 {
            return Err(GraphError::InvalidArgument(
                "MATCH supports a single pattern per clause".into(),
            ));
        }
        let pattern = &clause.children[0];
        match pattern.children.len() {
            1 => self.match_nodes(graph, tx_id, &pattern.children[0]),
            3 => self.match_relationships(graph, tx_id, pattern),
            _ => Err(GraphError::InvalidArgument("malformed MATCH pattern".into())),
        }
    }

    fn match_nodes(&mut self, graph: &mut GraphStore, tx_id: TxId, ast: &AstNode) -> Result<()> {
        let label = ast
            .child_of_kind(AstKind::Label)
            .map(|l| l.value.clone())
            .ok_or_else(|| GraphError::InvalidArgument("MATCH requires a label".into()))?;

        let mut nodes = Vec::new();
        for node_id in graph.nodes_with_label(&label) {
            nodes.push(graph.get_node(node_id)?);
        }
        debug!(tx_id, label = %label, matched = nodes.len(), "matched nodes");

        if !ast.value.is_empty() {
            self.bindings(tx_id)?
                .insert(ast.value.clone(), Binding::Nodes(nodes));
        }
        Ok(())
    }

    /// Matches edges by type over a full scan of the edge index. Endpoint
    /// variables, when named, are bound to lists parallel to the edge list;
    /// an edge whose needed endpoint no longer resolves is dropped from all
    /// three bindings to keep them aligned.
    fn match_relationships(
        &mut self,
        graph: &mut GraphStore,
        tx_id: TxId,
        pattern: &AstNode,
    ) -> Result<()> {
        let source_var = pattern.children[0].value.clone();
        let rel = &pattern.children[1];
        let target_var = pattern.children[2].value.clone();

        let type_name = rel
            .child_of_kind(AstKind::Type)
            .map(|t| t.value.clone())
            .ok_or_else(|| {
                GraphError::InvalidArgument("MATCH relationship requires a type".into())
            })?;

        let mut edges = Vec::new();
        let mut sources = Vec::new();
        let mut targets = Vec::new();
        for edge_id in graph.edge_ids() {
            let edge = graph.get_edge(edge_id)?;
            if edge.type_name != type_name {
                continue;
            }
            let source_node = if source_var.is_empty() {
                None
            } else {
                match graph.get_node(edge.source) {
                    Ok(node) => Some(node),
                    Err(GraphError::NotFound { .. }) | Err(GraphError::NotActive { .. }) => {
                        continue
                    }
                    Err(err) => return Err(err),
                }
            };
            let target_node = if target_var.is_empty() {
                None
            } else {
                match graph.get_node(edge.target) {
                    Ok(node) => Some(node),
                    Err(GraphError::NotFound { .. }) | Err(GraphError::NotActive { .. }) => {
                        continue
                    }
                    Err(err) => return Err(err),
                }
            };

            edges.push(edge);
            if let Some(node) = source_node {
                sources.push(node);
            }
            if let Some(node) = target_node {
                targets.push(node);
            }
        }
        debug!(tx_id, edge_type = %type_name, matched = edges.len(), "matched relationships");

        let bindings = self.bindings(tx_id)?;
        if !source_var.is_empty() {
            bindings.insert(source_var, Binding::Nodes(sources));
        }
        if !target_var.is_empty() {
            bindings.insert(target_var, Binding::Nodes(targets));
        }
        if !rel.value.is_empty() {
            bindings.insert(rel.value.clone(), Binding::Edges(edges));
        }
        Ok(())
    }

    fn exec_where(&mut self, tx_id: TxId, clause: &AstNode) -> Result<()> {
        let expr = clause
            .children
            .first()
            .filter(|e| e.kind == AstKind::Expression && e.children.len() == 3)
            .ok_or_else(|| GraphError::InvalidArgument("malformed WHERE expression".into()))?;

        let var = &expr.children[0].value;
        let key = &expr.children[1].value;
        let expected = literal_value(&expr.children[2])?;

        let binding = self
            .bindings(tx_id)?
            .get_mut(var)
            .ok_or_else(|| unbound(var))?;
        match binding {
            Binding::Nodes(nodes) => {
                nodes.retain(|n| n.properties.iter().any(|p| &p.key == key && p.value == expected))
            }
            Binding::Edges(edges) => {
                edges.retain(|e| e.properties.iter().any(|p| &p.key == key && p.value == expected))
            }
        }
        Ok(())
    }

    fn exec_set(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        clause: &AstNode,
    ) -> Result<()> {
        for assignment in &clause.children {
            if assignment.kind != AstKind::Property || assignment.children.len() != 3 {
                return Err(GraphError::InvalidArgument(
                    "malformed SET assignment".into(),
                ));
            }
            let var = &assignment.children[0].value;
            let key = assignment.children[1].value.clone();
            let value = literal_value(&assignment.children[2])?;
            let patch = [Property::new(key, value)];

            let binding = self
                .bindings(tx_id)?
                .get_mut(var)
                .ok_or_else(|| unbound(var))?;
            // Collect ids first: the graph store is updated per entity, then
            // the bound copies are patched so later clauses see new values.
            match binding {
                Binding::Nodes(nodes) => {
                    let ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
                    for node in nodes.iter_mut() {
                        merge_properties(&mut node.properties, &patch);
                    }
                    for node_id in ids {
                        graph.update_node(node_id, &patch)?;
                        txns.record(
                            tx_id,
                            TransactionOp::UpdateNode {
                                node_id,
                                patch: patch.to_vec(),
                            },
                        )?;
                    }
                }
                Binding::Edges(edges) => {
                    let ids: Vec<EdgeId> = edges.iter().map(|e| e.id).collect();
                    for edge in edges.iter_mut() {
                        merge_properties(&mut edge.properties, &patch);
                    }
                    for edge_id in ids {
                        graph.update_edge(edge_id, &patch)?;
                        txns.record(
                            tx_id,
                            TransactionOp::UpdateEdge {
                                edge_id,
                                patch: patch.to_vec(),
                            },
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn exec_delete(
        &mut self,
        graph: &mut GraphStore,
        txns: &mut TxnManager,
        tx_id: TxId,
        clause: &AstNode,
    ) -> Result<()> {
        for identifier in &clause.children {
            let var = &identifier.value;
            let binding = self
                .bindings(tx_id)?
                .remove(var)
                .ok_or_else(|| unbound(var))?;
            match binding {
                Binding::Nodes(nodes) => {
                    for node in nodes {
                        graph.delete_node(node.id)?;
                        txns.record(tx_id, TransactionOp::DeleteNode { node_id: node.id })?;
                    }
                }
                Binding::Edges(edges) => {
                    for edge in edges {
                        graph.delete_edge(edge.id)?;
                        txns.record(tx_id, TransactionOp::DeleteEdge { edge_id: edge.id })?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Collects rows in binding order, deduplicated by entity kind and id
    /// across the whole RETURN list.
    fn exec_return(&mut self, tx_id: TxId, clause: &AstNode) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut seen: HashSet<(&'static str, i64)> = HashSet::new();

        for identifier in &clause.children {
            let var = &identifier.value;
            let binding = self.bindings(tx_id)?.get(var).ok_or_else(|| unbound(var))?;
            match binding {
                Binding::Nodes(nodes) => {
                    for node in nodes {
                        if seen.insert(("node", node.id)) {
                            rows.push(row(var, ResultCell::from_node(node)));
                        }
                    }
                }
                Binding::Edges(edges) => {
                    for edge in edges {
                        if seen.insert(("edge", edge.id)) {
                            rows.push(row(var, ResultCell::from_edge(edge)));
                        }
                    }
                }
            }
        }
        Ok(rows)
    }

    fn bindings(&mut self, tx_id: TxId) -> Result<&mut HashMap<String, Binding>> {
        self.env
            .get_mut(&tx_id)
            .ok_or(GraphError::UnknownTransaction(tx_id))
    }

    fn append_node(&mut self, tx_id: TxId, var: &str, node: Node) -> Result<()> {
        match self
            .bindings(tx_id)?
            .entry(var.to_string())
            .or_insert_with(|| Binding::Nodes(Vec::new()))
        {
            Binding::Nodes(nodes) => {
                nodes.push(node);
                Ok(())
            }
            other => Err(GraphError::Type(format!(
                "variable '{var}' is already bound to {}",
                other.kind()
            ))),
        }
    }

    fn append_edge(&mut self, tx_id: TxId, var: &str, edge: Edge) -> Result<()> {
        match self
            .bindings(tx_id)?
            .entry(var.to_string())
            .or_insert_with(|| Binding::Edges(Vec::new()))
        {
            Binding::Edges(edges) => {
                edges.push(edge);
                Ok(())
            }
            other => Err(GraphError::Type(format!(
                "variable '{var}' is already bound to {}",
                other.kind()
            ))),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

fn unbound(var: &str) -> GraphError {
    GraphError::InvalidArgument(format!("variable '{var}' is not bound"))
}

/// Builds an unstored node from a pattern element: labels from `Label`
/// children, properties from `Property` children.
fn node_from_ast(ast: &AstNode) -> Result<Node> {
    if ast.kind != AstKind::Node {
        return Err(GraphError::InvalidArgument(
            "expected a node pattern element".into(),
        ));
    }
    Ok(Node {
        id: 0,
        labels: ast
            .children
            .iter()
            .filter(|c| c.kind == AstKind::Label)
            .map(|c| c.value.clone())
            .collect(),
        properties: properties_from_ast(ast)?,
        active: false,
    })
}

fn properties_from_ast(ast: &AstNode) -> Result<Vec<Property>> {
    ast.children
        .iter()
        .filter(|c| c.kind == AstKind::Property)
        .map(|property| {
            if property.children.len() != 2 {
                return Err(GraphError::InvalidArgument(
                    "malformed property in pattern".into(),
                ));
            }
            let key = property.children[0].value.clone();
            let value = literal_value(&property.children[1])?;
            Ok(Property::new(key, value))
        })
        .collect()
}

/// Recovers a typed value from a literal node and its type-tag child.
fn literal_value(literal: &AstNode) -> Result<PropertyValue> {
    let tag = literal
        .children
        .first()
        .map(|c| c.value.as_str())
        .ok_or_else(|| GraphError::InvalidArgument("literal without a type tag".into()))?;
    match tag {
        TAG_INT => literal
            .value
            .parse::<i64>()
            .map(PropertyValue::Int)
            .map_err(|_| GraphError::Type(format!("invalid integer literal '{}'", literal.value))),
        TAG_STRING => Ok(PropertyValue::String(literal.value.clone())),
        TAG_BOOL => Ok(PropertyValue::Bool(
            literal.value.eq_ignore_ascii_case("true"),
        )),
        other => Err(GraphError::Type(format!(
            "unsupported property type '{other}'"
        ))),
    }
}
