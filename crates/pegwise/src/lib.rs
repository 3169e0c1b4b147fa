//! # Pegwise
//!
//! A backtracking PEG parsing runtime for hand-written grammars, with a
//! static validator that checks those same grammars without running them.
//!
//! ## Overview
//!
//! - **Context-sensitive lexing**: tokens are read on demand in the lexical
//!   goal the current rule asks for, with line-start, previous-token and
//!   template-nesting constraints
//! - **Combinator runtime**: ordered choice, repetition and optional parts
//!   with full backtracking and packrat memoization
//! - **Runtime safety**: left recursion, non-progressing loops and runaway
//!   recursion are detected and reported instead of hanging
//! - **Static validation**: left recursion and ordered-choice conflicts are
//!   found by expanding the grammar itself
//!
//! ## Quick Start
//!
//! Grammars are ordinary functions generic over [`Combinators`], so one
//! definition both parses and validates:
//!
//! ```rust
//! use pegwise::{Combinators, Grammar, Parsed, Parser, TokenDefinition};
//!
//! struct Sum;
//!
//! impl Grammar for Sum {
//!     const ENTRY: &'static str = "Sum";
//!
//!     fn token_definitions() -> Vec<TokenDefinition> {
//!         vec![
//!             TokenDefinition::regex("Whitespace", r"\s+").skipped(),
//!             TokenDefinition::regex("Number", "[0-9]+"),
//!             TokenDefinition::literal("Plus", "+"),
//!             TokenDefinition::literal("Minus", "-"),
//!         ]
//!     }
//!
//!     fn entry<P: Combinators>(p: &mut P) -> Parsed {
//!         p.subrule("Number", number)?;
//!         p.many(|p| {
//!             p.or(&[&|p| p.consume("Plus"), &|p| p.consume("Minus")])?;
//!             p.subrule("Number", number)
//!         })
//!     }
//! }
//!
//! fn number<P: Combinators>(p: &mut P) -> Parsed {
//!     p.consume("Number")
//! }
//!
//! let mut parser = Parser::for_grammar::<Sum>("1 + 2 - 3").unwrap();
//! let output = parser.validate_grammar::<Sum>().unwrap().parse::<Sum>().unwrap();
//!
//! let texts: Vec<_> = output.tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, ["1", "+", "2", "-", "3"]);
//! assert_eq!(output.root.child_names(), ["Number", "Plus", "Number", "Minus", "Number"]);
//! ```
//!
//! ## Modules
//!
//! - [`lexer`] - Token definitions and the on-demand lexer
//! - [`parser`] - Combinator trait, parser runtime and packrat cache
//! - [`grammar`] - Rule recording, grammar analysis and validation
//! - [`syntax`] - Concrete syntax tree and text positions
//! - [`error`] - Error types and diagnostics helpers

pub mod error;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod syntax;

pub use error::{LexerError, ParseError};
pub use grammar::{AnalyzerConfig, FindingKind, ValidationError, Validator};
pub use lexer::{LexerBuilder, LexicalGoal, Token, TokenDefinition};
pub use parser::{Combinators, Grammar, ParseOutput, Parsed, Parser, ParserConfig, ParserOptions};
pub use syntax::{CstNode, TextRange, TextSize};
