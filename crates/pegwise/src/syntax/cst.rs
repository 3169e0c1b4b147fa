use super::text::{LineCol, SourceLocation, TextRange, TextSize};
use crate::lexer::Token;
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::sync::Arc;

/// Name given to error nodes produced by recovery.
pub const ERROR_NODE: &str = "#error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum NodeKind {
    Rule,
    Token,
    /// Input skipped by error recovery
    Error,
}

/// Concrete syntax tree node.
///
/// Rule nodes are built bottom-up when a rule succeeds. Token nodes are
/// leaves carrying the token text in `value`. Error nodes hold the tokens
/// skipped during recovery and the error message in `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CstNode {
    pub name: CompactString,
    pub kind: NodeKind,
    pub children: Vec<Arc<CstNode>>,
    pub range: TextRange,
    pub location: SourceLocation,
    pub value: Option<CompactString>,
}

impl CstNode {
    /// Leaf node for a consumed token.
    #[must_use]
    pub fn token(token: &Token) -> Self {
        Self {
            name: token.name.clone(),
            kind: NodeKind::Token,
            children: Vec::new(),
            range: token.range,
            location: SourceLocation::new(token.start, token.end),
            value: Some(token.text.clone()),
        }
    }

    /// Rule node spanning its children.
    ///
    /// A rule that matched nothing gets an empty range at `at`.
    #[must_use]
    pub fn rule(
        name: impl Into<CompactString>,
        children: Vec<Arc<Self>>,
        at: (TextSize, LineCol),
    ) -> Self {
        let (range, location) = span_of(&children, at);
        Self {
            name: name.into(),
            kind: NodeKind::Rule,
            children,
            range,
            location,
            value: None,
        }
    }

    /// Error node wrapping skipped material.
    #[must_use]
    pub fn error(
        message: impl Into<CompactString>,
        children: Vec<Arc<Self>>,
        at: (TextSize, LineCol),
    ) -> Self {
        let (range, location) = span_of(&children, at);
        Self {
            name: CompactString::const_new(ERROR_NODE),
            kind: NodeKind::Error,
            children,
            range,
            location,
            value: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_token(&self) -> bool {
        self.kind == NodeKind::Token
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == NodeKind::Error
    }

    /// Token text for leaves, message for error nodes.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// All nodes in pre-order, starting with `self`.
    pub fn descendants(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev().map(Arc::as_ref));
            Some(node)
        })
    }

    /// Token leaves in source order.
    pub fn tokens(&self) -> impl Iterator<Item = &Self> {
        self.descendants().filter(|node| node.is_token())
    }

    /// Nodes named `name`, in pre-order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> {
        self.descendants().filter(move |node| node.name == name)
    }

    /// Error nodes produced by recovery.
    pub fn errors(&self) -> impl Iterator<Item = &Self> {
        self.descendants().filter(|node| node.is_error())
    }

    /// Names of the direct children.
    #[must_use]
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }

    /// Indented outline of the tree, one node per line.
    #[must_use]
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = match (&self.kind, &self.value) {
            (NodeKind::Token, Some(text)) => {
                writeln!(out, "{indent}{}@{} {:?}", self.name, self.range, text.as_str())
            }
            (NodeKind::Error, Some(message)) => {
                writeln!(out, "{indent}{}@{} {message}", self.name, self.range)
            }
            _ => writeln!(out, "{indent}{}@{}", self.name, self.range),
        };
        for child in &self.children {
            child.write_pretty(out, depth + 1);
        }
    }
}

impl fmt::Display for CstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty())
    }
}

fn span_of(children: &[Arc<CstNode>], at: (TextSize, LineCol)) -> (TextRange, SourceLocation) {
    match (children.first(), children.last()) {
        (Some(first), Some(last)) => (
            first.range.cover(last.range),
            SourceLocation::new(first.location.start, last.location.end),
        ),
        _ => (TextRange::empty(at.0), SourceLocation::point(at.1)),
    }
}
