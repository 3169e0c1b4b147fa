use crate::error::ParseError;
use crate::lexer::{LexCursor, Token, TokenKindId};
use crate::syntax::{CstNode, LineCol, TextRange};
use ahash::RandomState;
use lru::LruCache;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of the parser position; the unit of backtracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParserState {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
    /// Kind of the last consumed significant token
    pub prev_token: Option<TokenKindId>,
    pub template_depth: u32,
    /// Number of tokens committed so far
    pub token_index: usize,
}

impl ParserState {
    pub const START: Self = Self {
        offset: 0,
        line: 1,
        column: 0,
        prev_token: None,
        template_depth: 0,
        token_index: 0,
    };

    #[must_use]
    pub const fn cursor(&self) -> LexCursor {
        LexCursor {
            offset: self.offset,
            line: self.line,
            column: self.column,
            template_depth: self.template_depth,
        }
    }

    #[must_use]
    pub const fn position(&self) -> LineCol {
        LineCol::new(self.line, self.column)
    }

    /// State after committing `token`, with the lexer positioned at `next`.
    #[must_use]
    pub const fn after(&self, token: &Token, next: LexCursor) -> Self {
        Self {
            offset: next.offset,
            line: next.line,
            column: next.column,
            prev_token: Some(token.kind),
            template_depth: next.template_depth,
            token_index: self.token_index + 1,
        }
    }
}

impl Default for ParserState {
    fn default() -> Self {
        Self::START
    }
}

/// Key of a memoized rule result.
///
/// The previous token and template depth are part of the key because they
/// change which tokens the lexer produces at the same offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub rule: &'static str,
    pub offset: usize,
    pub prev_token: Option<TokenKindId>,
    pub template_depth: u32,
}

impl MemoKey {
    #[must_use]
    pub const fn new(rule: &'static str, state: &ParserState) -> Self {
        Self {
            rule,
            offset: state.offset,
            prev_token: state.prev_token,
            template_depth: state.template_depth,
        }
    }
}

/// What the lexer found where the furthest failure happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Found {
    #[default]
    Nothing,
    Token {
        name: String,
        text: String,
        range: TextRange,
    },
    Unrecognized(char),
    Eof,
}

/// Furthest position at which a token was expected but not found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FurthestFailure {
    pub offset: Option<usize>,
    pub position: LineCol,
    pub expected: SmallVec<[&'static str; 8]>,
    pub found: Found,
    /// Rules open when the failure was first recorded
    pub rule_path: Vec<&'static str>,
}

impl FurthestFailure {
    /// Fold in a failure recorded later: a further offset replaces this one,
    /// the same offset adds its expected tokens.
    pub fn merge(&mut self, later: &Self) {
        let Some(offset) = later.offset else {
            return;
        };
        match self.offset {
            Some(current) if offset < current => {}
            Some(current) if offset == current => {
                for name in &later.expected {
                    if !self.expected.contains(name) {
                        self.expected.push(name);
                    }
                }
            }
            _ => *self = later.clone(),
        }
    }

    /// The same failure with the first `depth` rules of its path removed.
    #[must_use]
    pub fn relative_to(mut self, depth: usize) -> Self {
        let depth = depth.min(self.rule_path.len());
        self.rule_path.drain(..depth);
        self
    }

    /// The same failure seen from below `stack`.
    #[must_use]
    pub fn rooted_at(&self, stack: impl IntoIterator<Item = &'static str>) -> Self {
        let mut rooted = self.clone();
        if rooted.offset.is_some() {
            rooted.rule_path = stack.into_iter().chain(self.rule_path.iter().copied()).collect();
        }
        rooted
    }
}

/// Side effects of one rule attempt that a replay has to reproduce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attempt {
    /// Furthest offset any token was committed at, even on paths later abandoned
    pub reached: usize,
    /// Furthest failure inside the rule, with the rule path starting at the rule
    pub failure: FurthestFailure,
    /// Errors recovered from inside the rule
    pub recoveries: Arc<[(TextRange, ParseError)]>,
}

/// Memoized outcome of a rule
#[derive(Debug, Clone)]
pub enum Memo {
    Success {
        end: ParserState,
        node: Arc<CstNode>,
        /// Tokens the rule committed, replayed into the token stream
        tokens: Arc<[Token]>,
        attempt: Attempt,
    },
    Failure(Attempt),
}

/// Bounded packrat cache.
///
/// Least recently used entries are evicted once `capacity` is reached;
/// eviction only costs a re-parse, never a different result.
#[derive(Debug)]
pub struct PackratCache {
    entries: LruCache<MemoKey, Memo, RandomState>,
    hits: usize,
    misses: usize,
    evictions: usize,
}

impl PackratCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::with_hasher(capacity, RandomState::new()),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn get(&mut self, key: &MemoKey) -> Option<Memo> {
        let found = self.entries.get(key).cloned();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, key: MemoKey, memo: Memo) {
        if let Some((evicted, _)) = self.entries.push(key, memo)
            && evicted != key
        {
            self.evictions += 1;
        }
    }

    /// Drop all entries and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    pub fn resize(&mut self, capacity: usize) {
        self.entries
            .resize(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn hits(&self) -> usize {
        self.hits
    }

    #[must_use]
    pub const fn misses(&self) -> usize {
        self.misses
    }

    #[must_use]
    pub const fn evictions(&self) -> usize {
        self.evictions
    }
}

/// Counters collected during one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParseStats {
    /// Tokens consumed, counting re-consumption after backtracking
    pub tokens_consumed: usize,
    pub nodes_created: usize,
    pub backtracks: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_evictions: usize,
    pub errors_recovered: usize,
    pub parse_time: Duration,
}
