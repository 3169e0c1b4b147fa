//! # Diagnostic Utilities
//!
//! Suggestions and context rendering for syntax errors:
//! - "Did you mean?" suggestions for misspelled keywords and operators
//! - hints for missing closing delimiters and statement terminators
//! - error messages with the surrounding source line

use crate::error::ParseError;
use crate::syntax::TextRange;
use std::fmt::Write;

/// Pick the most similar candidate to `actual`, if any is similar enough.
///
/// # Example
///
/// ```rust
/// use pegwise::error::diagnostics::did_you_mean;
///
/// let expected = vec!["function".to_string(), "return".to_string()];
/// assert_eq!(did_you_mean("fucntion", &expected).as_deref(), Some("function"));
/// ```
#[must_use]
pub fn did_you_mean(actual: &str, expected: &[String]) -> Option<String> {
    let actual_lower = actual.to_lowercase();
    let threshold = 0.6;

    expected
        .iter()
        .map(|candidate| {
            let similarity = string_similarity(&actual_lower, &candidate.to_lowercase());
            (candidate, similarity)
        })
        .filter(|(candidate, similarity)| *similarity >= threshold && candidate.as_str() != actual)
        .fold(None, |best: Option<(&String, f64)>, (candidate, similarity)| match best {
            Some((_, best_sim)) if best_sim >= similarity => best,
            _ => Some((candidate, similarity)),
        })
        .map(|(suggestion, _)| suggestion.clone())
}

/// Suggestion for a syntax error.
///
/// `expected` holds the literal texts of the expected tokens (where they
/// have one), `found` the offending token text or `None` at end of input.
#[must_use]
pub fn suggest_fix(expected: &[String], found: Option<&str>) -> Option<String> {
    const CLOSERS: [(&str, &str); 4] = [
        ("}", "missing closing brace '}'"),
        (")", "missing closing parenthesis ')'"),
        ("]", "missing closing bracket ']'"),
        (";", "missing semicolon ';'"),
    ];

    for (closer, hint) in CLOSERS {
        if expected.iter().any(|e| e == closer) && found != Some(closer) {
            return Some(hint.to_string());
        }
    }

    let found = found?;
    if !found.chars().any(char::is_alphanumeric) {
        return None;
    }
    did_you_mean(found, expected).map(|s| format!("did you mean '{s}'?"))
}

/// Extract `context_chars` characters of source on each side of `span`.
///
/// Returns `(before, span_text, after)`, or `None` if the span is outside
/// the source or not on character boundaries.
#[must_use]
pub fn extract_context(
    source: &str,
    span: TextRange,
    context_chars: usize,
) -> Option<(String, String, String)> {
    let start = span.start().to_usize();
    let end = span.end().to_usize();
    let text = source.get(start..end)?;

    let before: String = {
        let head = source.get(..start)?;
        let skip = head.chars().count().saturating_sub(context_chars);
        head.chars().skip(skip).collect()
    };
    let after: String = source.get(end..)?.chars().take(context_chars).collect();

    Some((before, text.to_string(), after))
}

/// Render an error with the source line it points at and a caret marker.
#[must_use]
pub fn format_error_with_context(error: &ParseError, source: &str) -> String {
    let span = error.span();
    let start = span.start().to_usize().min(source.len());
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[start..].find('\n').map_or(source.len(), |i| start + i);
    let line = &source[line_start..line_end];

    let mut out = String::new();
    let _ = writeln!(out, "error: {error}");
    let _ = writeln!(out, "  | {line}");
    let column = source[line_start..start].chars().count();
    let width = span.slice(source).chars().count().max(1);
    let _ = write!(out, "  | {}{}", " ".repeat(column), "^".repeat(width));
    if let Some(suggestion) = error.suggestion() {
        let _ = write!(out, "\n  = help: {suggestion}");
    }
    out
}

fn string_similarity(s1: &str, s2: &str) -> f64 {
    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein_distance(s1, s2);
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let b: Vec<char> = s2.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in s1.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
