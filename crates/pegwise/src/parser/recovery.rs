//! Error recovery inside repetitions.
//!
//! When an iteration fails after consuming input, the parser skips tokens up
//! to and including the next synchronization token, wraps them in an error
//! node and lets the repetition continue.

use super::runtime::Parser;
use super::state::FurthestFailure;
use crate::lexer::{LexicalGoal, Scan, Token, TokenKindId};
use crate::syntax::{CstNode, TextRange, TextSize};
use compact_str::CompactString;
use std::sync::Arc;

/// Token name given to characters no definition matches.
pub const UNRECOGNIZED_TOKEN: &str = "#unrecognized";

impl Parser {
    /// Skip to the next synchronization token and emit an error node
    /// reporting `failure`, the furthest failure of the failed iteration.
    ///
    /// Returns `false` when nothing could be skipped or the error budget is
    /// exhausted; the caller then ends the repetition normally.
    pub(super) fn recover(&mut self, failure: &FurthestFailure) -> bool {
        if self.recoveries.len() >= self.config().max_errors {
            return false;
        }

        let error = self.error_from(failure);
        let start = self.state;
        let mut skipped = Vec::new();

        loop {
            match self.scan(LexicalGoal::DEFAULT) {
                Scan::Token(entry) => {
                    let sync = self.config().is_sync_token(&entry.token.name);
                    skipped.push(self.commit(entry.token, entry.next));
                    if sync {
                        break;
                    }
                }
                Scan::Unrecognized { cursor, found } => {
                    let mut text = [0; 4];
                    let text = found.encode_utf8(&mut text);
                    let next = cursor.advance(text);
                    let token = Token {
                        name: CompactString::const_new(UNRECOGNIZED_TOKEN),
                        kind: TokenKindId(u16::MAX),
                        text: CompactString::from(&*text),
                        range: TextRange::from_offsets(cursor.offset, next.offset),
                        start: cursor.position(),
                        end: next.position(),
                        has_line_break_before: false,
                        index: 0,
                    };
                    skipped.push(self.commit(token, next));
                }
                Scan::Eof { .. } => break,
            }
        }

        if skipped.is_empty() {
            return false;
        }

        let node = CstNode::error(
            error.to_string(),
            skipped,
            (TextSize::of(start.offset), start.position()),
        );
        log::debug!("recovered from `{error}` by skipping {}", node.range);
        self.recoveries.push((node.range, error));
        self.push_child(Arc::new(node));
        true
    }
}
