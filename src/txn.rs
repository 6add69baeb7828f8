use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::model::{EdgeId, NodeId, Property};

pub type TxId = i64;

/// One applied mutation, as observed after the graph store succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOp {
    AddNode { node_id: NodeId },
    AddEdge { edge_id: EdgeId },
    UpdateNode { node_id: NodeId, patch: Vec<Property> },
    UpdateEdge { edge_id: EdgeId, patch: Vec<Property> },
    DeleteNode { node_id: NodeId },
    DeleteEdge { edge_id: EdgeId },
}

/// In-memory redo log. Operations are recorded after they are applied and
/// the log is cleared on commit; there is no recovery path over it.
#[derive(Debug, Default)]
pub struct Wal {
    operations: Vec<TransactionOp>,
}

impl Wal {
    pub fn log(&mut self, op: TransactionOp) {
        self.operations.push(op);
    }

    pub fn commit(&mut self, _tx_id: TxId) {
        self.operations.clear();
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Hands out transaction ids and tracks per-transaction operation lists.
/// Rollback is not offered; a failed query leaves its applied operations in
/// place.
pub struct TxnManager {
    next_tx_id: TxId,
    operations: HashMap<TxId, Vec<TransactionOp>>,
    wal: Wal,
}

impl TxnManager {
    pub fn new() -> Self {
        Self {
            next_tx_id: 1,
            operations: HashMap::new(),
            wal: Wal::default(),
        }
    }

    pub fn begin(&mut self) -> TxId {
        let tx_id = self.next_tx_id;
        self.next_tx_id += 1;
        self.operations.insert(tx_id, Vec::new());
        debug!(tx_id, "transaction started");
        tx_id
    }

    pub fn record(&mut self, tx_id: TxId, op: TransactionOp) -> Result<()> {
        let ops = self
            .operations
            .get_mut(&tx_id)
            .ok_or(GraphError::UnknownTransaction(tx_id))?;
        ops.push(op.clone());
        self.wal.log(op);
        Ok(())
    }

    pub fn commit(&mut self, tx_id: TxId) -> Result<()> {
        let ops = self
            .operations
            .remove(&tx_id)
            .ok_or(GraphError::UnknownTransaction(tx_id))?;
        self.wal.commit(tx_id);
        info!(tx_id, operations = ops.len(), "transaction committed");
        Ok(())
    }

    #[cfg(test)]
    fn pending(&self, tx_id: TxId) -> Option<&[TransactionOp]> {
        self.operations.get(&tx_id).map(Vec::as_slice)
    }
}

impl Default for TxnManager {
    fn default() -> Self {
        Self::new()
    }
}
