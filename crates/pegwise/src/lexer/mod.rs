//! # Lexer
//!
//! On-demand, context-sensitive tokenization.
//!
//! Token definitions are declared with [`TokenDefinition`] (or the fluent
//! [`LexerBuilder`]) and compiled into a [`Lexer`]. The parser never
//! tokenizes the whole input up front: it asks for one token at a time with
//! [`Lexer::read_token_at`], passing the [`LexicalGoal`] the grammar expects
//! at that point, the previous significant token and the template depth.
//!
//! ```rust
//! use pegwise::lexer::{LexerBuilder, Pattern};
//!
//! let lexer = LexerBuilder::new()
//!     .skip("Whitespace", Pattern::regex(r"\s+"))
//!     .token("Number", Pattern::regex("[0-9]+"))
//!     .token("Plus", Pattern::literal("+"))
//!     .build()
//!     .unwrap();
//!
//! let (tokens, _) = lexer.tokenize("1 + 2");
//! let names: Vec<_> = tokens.iter().map(|t| t.name.as_str()).collect();
//! assert_eq!(names, ["Number", "Plus", "Number"]);
//! ```

mod definition;
mod engine;
mod token;

pub use definition::{LexerBuilder, LexicalGoal, Pattern, TemplateEffect, TokenDefinition};
pub use engine::Lexer;
pub use token::{LexCursor, Scan, Token, TokenCacheEntry, TokenKindId, contains_line_terminator};
