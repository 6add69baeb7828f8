use std::path::{Path, PathBuf};

use tracing::info;

use crate::db::config::Config;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::model::{Edge, Node};
use crate::pager::BufferPool;
use crate::query::executor::Executor;
use crate::query::lexer::tokenize;
use crate::query::parser::Parser;
use crate::query::rows::Row;
use crate::storage::{DiskManager, RecordStore};
use crate::txn::TxnManager;

/// An open graph database: one file, one writer, no internal locking.
/// Embedders sharing a handle across threads must serialize access
/// externally.
pub struct KiteDB {
    path: PathBuf,
    graph: GraphStore,
    txns: TxnManager,
    executor: Executor,
}

impl KiteDB {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let disk = DiskManager::open(path, config.page_size)?;
        let pool = BufferPool::new(disk, config.buffer_capacity)?;
        let mut graph = GraphStore::new(RecordStore::new(pool));
        graph.rebuild()?;

        info!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "database opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            graph,
            txns: TxnManager::new(),
            executor: Executor::new(),
        })
    }

    /// Runs one query inside one transaction: parse, begin, execute,
    /// commit. An execution error propagates before commit; operations it
    /// already applied are kept (there is no rollback path).
    pub fn execute_query(&mut self, text: &str) -> Result<Vec<Row>> {
        let tokens = tokenize(text)?;
        let query = Parser::new(tokens).parse()?;

        let tx_id = self.txns.begin();
        let rows = self
            .executor
            .execute(&mut self.graph, &mut self.txns, tx_id, &query)?;
        self.txns.commit(tx_id)?;
        Ok(rows)
    }

    /// Flushes and closes the underlying file. Call exactly once; dropping
    /// the handle without closing leaves the flush to the OS.
    pub fn close(self) -> Result<()> {
        info!(path = %self.path.display(), "database closed");
        self.graph.close()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.graph.page_size()
    }

    pub fn page_count(&self) -> u32 {
        self.graph.page_count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn labels(&self) -> Vec<String> {
        self.graph.labels()
    }

    /// All active nodes in id order. Intended for administrative surfaces;
    /// queries should go through MATCH.
    pub fn all_nodes(&mut self) -> Result<Vec<Node>> {
        self.graph
            .node_ids()
            .into_iter()
            .map(|id| self.graph.get_node(id))
            .collect()
    }

    pub fn all_edges(&mut self) -> Result<Vec<Edge>> {
        self.graph
            .edge_ids()
            .into_iter()
            .map(|id| self.graph.get_edge(id))
            .collect()
    }
}
