//! # Syntax Trees
//!
//! Source positions ([`TextRange`], [`LineCol`]) and the concrete syntax tree
//! ([`CstNode`]) the parser builds. Subtrees are shared through [`Arc`] so
//! memoized results can be replayed without copying.
//!
//! [`Arc`]: std::sync::Arc

mod cst;
mod text;

pub use cst::{CstNode, ERROR_NODE, NodeKind};
pub use text::{LineCol, SourceLocation, TextRange, TextSize};
