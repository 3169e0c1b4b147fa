//! # Grammar Validation
//!
//! Static checks over a grammar's rule functions, run without any input.
//!
//! 1. [`RuleRecorder`] runs each rule once in recording mode and produces a
//!    [`CollectedGrammar`]: one [`RuleNode`] tree per rule.
//! 2. [`GrammarAnalyzer`] expands rules into [`Path`]s of tokens, depth-first
//!    (First-K) and breadth-first (level by level), and finds left recursion
//!    with both.
//! 3. [`ConflictDetector`] compares the branches of every ordered choice.
//!
//! [`Validator`] runs the whole pipeline and reports every [`Finding`] at once.
//!
//! ```rust
//! use pegwise::grammar::{FindingKind, RuleRecorder, Validator};
//! use pegwise::lexer::TokenDefinition;
//! use pegwise::parser::{Combinators, Parsed};
//!
//! fn statement<P: Combinators>(p: &mut P) -> Parsed {
//!     p.or(&[
//!         &|p| p.consume("Ident"),
//!         &|p| {
//!             p.consume("Ident")?;
//!             p.consume("Semi")
//!         },
//!     ])
//! }
//!
//! let tokens = vec![
//!     TokenDefinition::regex("Ident", "[a-z]+"),
//!     TokenDefinition::literal("Semi", ";"),
//! ];
//! let grammar = RuleRecorder::collect("Statement", statement, tokens);
//! let error = Validator::default().validate_collected(&grammar).unwrap_err();
//! assert_eq!(error.findings[0].kind, FindingKind::PrefixConflict);
//! ```

mod analyzer;
mod collector;
mod config;
mod conflict;
mod path;
mod rule;
mod validate;

pub use analyzer::{
    AnalysisError, AnalyzerStats, CacheStats, Expansion, GrammarAnalyzer, RecursionCycle,
};
pub use collector::RuleRecorder;
pub use config::AnalyzerConfig;
pub use conflict::ConflictDetector;
pub use path::{Path, PathSet, Symbol, product};
pub use rule::{CollectedGrammar, RuleNode};
pub use validate::{
    Finding, FindingKind, Findings, Severity, ValidationError, ValidationReport, ValidationStats,
    Validator,
};
