use crate::syntax::{LineCol, TextRange};
use compact_str::CompactString;
use memchr::memchr3;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense id of a token name; definitions sharing a name share the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TokenKindId(pub u16);

/// A significant token produced by the lexer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Token {
    pub name: CompactString,
    pub kind: TokenKindId,
    pub text: CompactString,
    pub range: TextRange,
    pub start: LineCol,
    pub end: LineCol,
    /// A line terminator occurs between the previous significant token and this one.
    pub has_line_break_before: bool,
    /// Position in the committed token stream; set when the parser consumes the token.
    pub index: usize,
}

impl Token {
    #[must_use]
    pub fn line(&self) -> u32 {
        self.start.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.start.column
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})@{}", self.name, self.text.as_str(), self.start)
    }
}

/// Lexing position: everything [`Lexer::read_token_at`](super::Lexer::read_token_at)
/// needs besides the goal and previous token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LexCursor {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
    pub template_depth: u32,
}

impl LexCursor {
    pub const START: Self = Self {
        offset: 0,
        line: 1,
        column: 0,
        template_depth: 0,
    };

    #[must_use]
    pub const fn position(self) -> LineCol {
        LineCol::new(self.line, self.column)
    }

    /// Cursor after `text`, which starts at this cursor.
    #[must_use]
    pub fn advance(self, text: &str) -> Self {
        let mut next = self;
        next.offset += text.len();
        if memchr3(b'\n', b'\r', 0xE2, text.as_bytes()).is_none() {
            next.column += count_u32(text.chars().count());
            return next;
        }
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    next.line += 1;
                    next.column = 0;
                }
                '\n' | '\u{2028}' | '\u{2029}' => {
                    next.line += 1;
                    next.column = 0;
                }
                _ => next.column += 1,
            }
        }
        next
    }
}

impl Default for LexCursor {
    fn default() -> Self {
        Self::START
    }
}

/// A token together with the cursor directly after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCacheEntry {
    pub token: Token,
    pub next: LexCursor,
}

/// Outcome of reading one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    Token(TokenCacheEntry),
    /// Only trivia remains; `cursor` is past it.
    Eof { cursor: LexCursor },
    /// No definition matches at `cursor` (after trivia).
    Unrecognized { cursor: LexCursor, found: char },
}

impl Scan {
    #[must_use]
    pub fn into_token(self) -> Option<TokenCacheEntry> {
        match self {
            Self::Token(entry) => Some(entry),
            Self::Eof { .. } | Self::Unrecognized { .. } => None,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Token(entry) => Some(&entry.token),
            Self::Eof { .. } | Self::Unrecognized { .. } => None,
        }
    }

    /// Byte offset where the scanned item starts.
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            Self::Token(entry) => entry.token.range.start().to_usize(),
            Self::Eof { cursor } | Self::Unrecognized { cursor, .. } => cursor.offset,
        }
    }

    #[must_use]
    pub fn position(&self) -> LineCol {
        match self {
            Self::Token(entry) => entry.token.start,
            Self::Eof { cursor } | Self::Unrecognized { cursor, .. } => cursor.position(),
        }
    }
}

/// True when `text` contains a line terminator.
#[must_use]
pub fn contains_line_terminator(text: &str) -> bool {
    memchr3(b'\n', b'\r', 0xE2, text.as_bytes()).is_some()
        && text.contains(['\n', '\r', '\u{2028}', '\u{2029}'])
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_single_line() {
        let next = LexCursor::START.advance("héllo");
        assert_eq!(next.offset, 6);
        assert_eq!(next.position(), LineCol::new(1, 5));
    }

    #[test]
    fn test_advance_line_terminators() {
        let next = LexCursor::START.advance("a\r\nb\nc\rd\u{2028}ef");
        assert_eq!(next.line, 5);
        assert_eq!(next.column, 2);
    }

    #[test]
    fn test_contains_line_terminator() {
        assert!(contains_line_terminator("  \n"));
        assert!(contains_line_terminator("\u{2029}"));
        assert!(!contains_line_terminator("  \t"));
        assert!(!contains_line_terminator("€"));
    }
}
