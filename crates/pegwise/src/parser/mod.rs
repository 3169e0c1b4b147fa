//! # Parser Runtime
//!
//! Grammars are plain Rust functions generic over the [`Combinators`] trait.
//! The same rule functions run in two modes:
//!
//! - against input, through [`Parser`], which backtracks, memoizes rule
//!   results and builds a [`CstNode`](crate::syntax::CstNode) tree;
//! - in recording mode, through
//!   [`RuleRecorder`](crate::grammar::RuleRecorder), which reconstructs the
//!   grammar's structure for static validation.
//!
//! ## Writing rules
//!
//! ```rust
//! use pegwise::lexer::TokenDefinition;
//! use pegwise::parser::{Combinators, Parsed, Parser, ParserOptions};
//!
//! fn sum<P: Combinators>(p: &mut P) -> Parsed {
//!     p.consume("Number")?;
//!     p.many(|p| {
//!         p.or(&[&|p| p.consume("Plus"), &|p| p.consume("Minus")])?;
//!         p.consume("Number")
//!     })
//! }
//!
//! let options = ParserOptions::new(vec![
//!     TokenDefinition::regex("Whitespace", r"\s+").skipped(),
//!     TokenDefinition::regex("Number", "[0-9]+"),
//!     TokenDefinition::literal("Plus", "+"),
//!     TokenDefinition::literal("Minus", "-"),
//! ]);
//! let mut parser = Parser::new("1 + 2 - 3", options).unwrap();
//! let output = parser.parse_rule("Sum", sum).unwrap();
//! assert_eq!(output.tokens.len(), 5);
//! ```
//!
//! Every combinator returns [`Parsed`]. A [`Halt::Mismatch`] is rolled back
//! by the nearest enclosing `or`/`option`/`many`; a [`Halt::Fatal`] aborts
//! the whole parse.

mod config;
mod recovery;
mod runtime;
mod state;

pub use config::ParserConfig;
pub use recovery::UNRECOGNIZED_TOKEN;
pub use runtime::Parser;
pub use state::{
    Attempt, Found, FurthestFailure, Memo, MemoKey, PackratCache, ParseStats, ParserState,
};

use crate::error::ParseError;
use crate::lexer::{LexicalGoal, Token, TokenDefinition};
use crate::syntax::CstNode;
use std::sync::Arc;

/// Why a combinator did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Local failure; the enclosing choice or repetition backtracks.
    Mismatch,
    /// Non-recoverable condition; the parse stops.
    Fatal(Box<ParseError>),
}

impl From<ParseError> for Halt {
    fn from(error: ParseError) -> Self {
        Self::Fatal(Box::new(error))
    }
}

/// Result of every combinator and rule function.
pub type Parsed = Result<(), Halt>;

/// A rule: a function over some combinator implementation.
pub type RuleFn<P> = fn(&mut P) -> Parsed;

/// One alternative of [`Combinators::or`].
pub type Alt<'a, P> = &'a dyn Fn(&mut P) -> Parsed;

/// The combinator surface shared by the parser and the rule recorder.
pub trait Combinators: Sized {
    /// Consume a token produced in the [default goal](LexicalGoal::DEFAULT).
    fn consume(&mut self, token: &'static str) -> Parsed {
        self.consume_in(token, LexicalGoal::DEFAULT)
    }

    /// Consume a token produced under `goal`.
    fn consume_in(&mut self, token: &'static str, goal: LexicalGoal) -> Parsed;

    /// Invoke another rule. Rule results are memoized per position.
    fn subrule(&mut self, name: &'static str, rule: RuleFn<Self>) -> Parsed;

    /// Ordered choice: the first alternative that matches wins.
    fn or(&mut self, alternatives: &[Alt<'_, Self>]) -> Parsed;

    /// Zero or more repetitions; never fails on a mismatch.
    fn many<F>(&mut self, body: F) -> Parsed
    where
        F: FnMut(&mut Self) -> Parsed;

    /// One or more repetitions.
    fn at_least_one<F>(&mut self, body: F) -> Parsed
    where
        F: FnMut(&mut Self) -> Parsed;

    /// Zero or one occurrence; never fails on a mismatch.
    fn option<F>(&mut self, body: F) -> Parsed
    where
        F: FnOnce(&mut Self) -> Parsed;

    /// Negative lookahead on a single token; consumes nothing.
    fn not_followed_by(&mut self, token: &'static str, goal: LexicalGoal) -> Parsed;

    /// Fails when a line terminator precedes the next token; consumes nothing.
    fn no_line_break(&mut self) -> Parsed;

    /// True while rules are being recorded for validation rather than parsed.
    fn is_recording(&self) -> bool {
        false
    }
}

/// A grammar packaged as a type.
pub trait Grammar {
    /// Name of the entry rule.
    const ENTRY: &'static str;

    fn token_definitions() -> Vec<TokenDefinition>;

    fn entry<P: Combinators>(p: &mut P) -> Parsed;
}

/// Observer of the final token stream of a successful parse.
pub trait TokenConsumer {
    fn accept(&mut self, token: &Token);
}

impl<F: FnMut(&Token)> TokenConsumer for F {
    fn accept(&mut self, token: &Token) {
        self(token);
    }
}

/// Construction input for a [`Parser`].
#[derive(Default)]
pub struct ParserOptions {
    pub token_definitions: Vec<TokenDefinition>,
    pub token_consumer: Option<Box<dyn TokenConsumer>>,
}

impl ParserOptions {
    #[must_use]
    pub fn new(token_definitions: Vec<TokenDefinition>) -> Self {
        Self {
            token_definitions,
            token_consumer: None,
        }
    }

    #[must_use]
    pub fn with_token_consumer(mut self, consumer: impl TokenConsumer + 'static) -> Self {
        self.token_consumer = Some(Box::new(consumer));
        self
    }
}

impl std::fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserOptions")
            .field("token_definitions", &self.token_definitions)
            .field("token_consumer", &self.token_consumer.is_some())
            .finish()
    }
}

/// Result of a successful parse.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub root: Arc<CstNode>,
    /// Tokens in the order they were committed, including ones skipped by recovery.
    pub tokens: Vec<Token>,
    /// Errors recovered from, one per fragment.
    pub errors: Vec<ParseError>,
    /// Error nodes produced by recovery.
    pub fragments: Vec<Arc<CstNode>>,
    pub stats: ParseStats,
}

impl ParseOutput {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
