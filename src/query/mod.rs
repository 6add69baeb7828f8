//! The query pipeline: text is tokenized, parsed into a generic syntax
//! tree, and executed clause by clause against the graph store.

pub mod ast;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod rows;

pub use ast::{AstKind, AstNode};
pub use executor::{Binding, Executor};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::Parser;
pub use rows::{ResultCell, Row};
