//! # Error Types
//!
//! Errors produced while building lexers and while parsing.
//!
//! - [`ParseError`]: syntax errors and the fatal runtime conditions the parser
//!   detects (left recursion, non-progressing loops, recursion limit)
//! - [`LexerError`]: problems in token definitions, reported when a
//!   [`Lexer`](crate::lexer::Lexer) is built
//!
//! Grammar validation reports through
//! [`ValidationError`](crate::grammar::ValidationError) instead.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with [`miette`]
//! for rich error reporting with source code snippets and suggestions.

pub mod diagnostics;

use crate::syntax::{LineCol, TextRange};
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseError {
    #[error("syntax error at {position}: expected {expected}, found {found}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::syntax)))]
    Syntax {
        #[cfg_attr(feature = "diagnostics", label("unexpected {found}"))]
        span: TextRange,
        position: LineCol,
        expected: ExpectedTokens,
        found: String,
        rule_path: RulePath,
        #[cfg_attr(feature = "diagnostics", help)]
        suggestion: Option<String>,
    },

    #[error("unexpected end of input at {position}: expected {expected}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::unexpected_eof)))]
    UnexpectedEof {
        #[cfg_attr(feature = "diagnostics", label("input ends here"))]
        span: TextRange,
        position: LineCol,
        expected: ExpectedTokens,
        rule_path: RulePath,
        #[cfg_attr(feature = "diagnostics", help)]
        suggestion: Option<String>,
    },

    #[error("left recursion in rule `{rule}` at {position}: {cycle}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(parser::left_recursion),
            help("rewrite the rule as a repetition: `A := B (op B)*`")
        )
    )]
    LeftRecursion {
        #[cfg_attr(feature = "diagnostics", label("rule re-entered here"))]
        span: TextRange,
        position: LineCol,
        rule: String,
        cycle: RulePath,
    },

    #[error(
        "infinite loop in rule `{rule}` at {position}: repetition body succeeded without consuming input after {attempts} attempt(s)"
    )]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(parser::infinite_loop),
            help("a repeated body must consume at least one token; check its optional parts")
        )
    )]
    InfiniteLoop {
        #[cfg_attr(feature = "diagnostics", label("loop does not advance"))]
        span: TextRange,
        position: LineCol,
        rule: String,
        attempts: usize,
        suspects: Vec<String>,
    },

    #[error("rule nesting deeper than {depth} in `{rule}` at {position}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::recursion_limit)))]
    RecursionLimit {
        #[cfg_attr(feature = "diagnostics", label)]
        span: TextRange,
        position: LineCol,
        rule: String,
        depth: usize,
    },

    #[error("{message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::custom)))]
    Custom {
        #[cfg_attr(feature = "diagnostics", label)]
        span: TextRange,
        message: String,
    },
}

impl ParseError {
    /// Error raised by grammar code, e.g. a semantic check.
    #[must_use]
    pub fn custom(span: TextRange, message: impl Into<String>) -> Self {
        Self::Custom {
            span,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn span(&self) -> TextRange {
        match self {
            Self::Syntax { span, .. }
            | Self::UnexpectedEof { span, .. }
            | Self::LeftRecursion { span, .. }
            | Self::InfiniteLoop { span, .. }
            | Self::RecursionLimit { span, .. }
            | Self::Custom { span, .. } => *span,
        }
    }

    /// Expected token names for syntax errors.
    #[must_use]
    pub fn expected(&self) -> Option<&[String]> {
        match self {
            Self::Syntax { expected, .. } | Self::UnexpectedEof { expected, .. } => Some(&expected.0),
            _ => None,
        }
    }

    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Syntax { suggestion, .. } | Self::UnexpectedEof { suggestion, .. } => {
                suggestion.as_deref()
            }
            _ => None,
        }
    }

    /// Whether the error points at a defect in the grammar rather than the input.
    #[must_use]
    pub const fn is_grammar_defect(&self) -> bool {
        matches!(
            self,
            Self::LeftRecursion { .. } | Self::InfiniteLoop { .. } | Self::RecursionLimit { .. }
        )
    }
}

/// Token names a syntax error expected; displays as `a, b, or c`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpectedTokens(pub Vec<String>);

impl std::ops::Deref for ExpectedTokens {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for ExpectedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_expected_list(&self.0))
    }
}

/// Chain of rule names; displays as `A -> B -> C`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RulePath(pub Vec<String>);

impl std::ops::Deref for RulePath {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for RulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

/// Formats `["a", "b", "c"]` as `a, b, or c`.
#[must_use]
pub fn format_expected_list(expected: &[String]) -> String {
    match expected {
        [] => "nothing".to_string(),
        [one] => one.clone(),
        [a, b] => format!("{a} or {b}"),
        [rest @ .., last] => format!("{}, or {last}", rest.join(", ")),
    }
}

/// Problem found in a token definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("token definition `{definition}`: {kind}")]
#[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::definition)))]
pub struct LexerError {
    pub definition: String,
    #[source]
    pub kind: LexerErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexerErrorKind {
    #[error("token names must be non-empty and must not contain ','")]
    InvalidName,

    #[error("pattern matches nothing")]
    EmptyPattern,

    #[error("invalid regular expression: {reason}")]
    InvalidPattern { reason: String },

    #[error("invalid lookahead expression: {reason}")]
    InvalidLookahead { reason: String },

    #[error("references unknown token `{name}`")]
    UnknownReference { name: String },

    #[error("too many distinct token names")]
    TooManyKinds,
}

impl LexerError {
    #[must_use]
    pub fn new(definition: impl Into<String>, kind: LexerErrorKind) -> Self {
        Self {
            definition: definition.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_expected_list() {
        let list = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        assert_eq!(format_expected_list(&[]), "nothing");
        assert_eq!(format_expected_list(&list(&["a"])), "a");
        assert_eq!(format_expected_list(&list(&["a", "b"])), "a or b");
        assert_eq!(format_expected_list(&list(&["a", "b", "c"])), "a, b, or c");
    }

    #[test]
    fn test_parse_error_syntax_display() {
        let err = ParseError::Syntax {
            span: TextRange::from_offsets(4, 5),
            position: LineCol::new(1, 4),
            expected: ExpectedTokens(vec!["Number".into(), "'('".into()]),
            found: "'+'".into(),
            rule_path: RulePath(vec!["Sum".into()]),
            suggestion: None,
        };
        assert_eq!(
            err.to_string(),
            "syntax error at 1:4: expected Number or '(', found '+'"
        );
        assert_eq!(err.expected().map(<[String]>::len), Some(2));
        assert!(!err.is_grammar_defect());
    }

    #[test]
    fn test_parse_error_left_recursion_display() {
        let err = ParseError::LeftRecursion {
            span: TextRange::default(),
            position: LineCol::START,
            rule: "Expr".into(),
            cycle: RulePath(vec!["Expr".into(), "Term".into(), "Expr".into()]),
        };
        assert!(err.to_string().contains("Expr -> Term -> Expr"));
        assert!(err.is_grammar_defect());
    }

    #[test]
    fn test_parse_error_custom() {
        let err = ParseError::custom(TextRange::from_offsets(0, 3), "duplicate label");
        assert_eq!(err.to_string(), "duplicate label");
        assert_eq!(err.span(), TextRange::from_offsets(0, 3));
        assert!(err.suggestion().is_none());
    }

    #[test]
    fn test_lexer_error_display() {
        let err = LexerError::new(
            "Number",
            LexerErrorKind::UnknownReference {
                name: "Dot".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "token definition `Number`: references unknown token `Dot`"
        );
    }
}
