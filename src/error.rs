use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{entity} {id} is not active")]
    NotActive { entity: &'static str, id: i64 },
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("record size {size} exceeds page size {page_size}")]
    RecordTooLarge { size: usize, page_size: usize },
    #[error("{entity} {id} already present in index")]
    DuplicateId { entity: &'static str, id: i64 },
    #[error("transaction {0} not found")]
    UnknownTransaction(i64),
}
