//! Context-sensitive lexer.
//!
//! The lexer is queried one token at a time: the parser asks for the token at
//! a cursor under a lexical goal, and only the definitions available in that
//! context compete for the match.

use super::definition::{LexicalGoal, Pattern, TemplateEffect, TokenDefinition};
use super::token::{LexCursor, Scan, Token, TokenCacheEntry, TokenKindId, contains_line_terminator};
use crate::error::{LexerError, LexerErrorKind};
use crate::syntax::TextRange;
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use regex::Regex;
use smallvec::SmallVec;

#[derive(Debug)]
enum Matcher {
    Literal(CompactString),
    Regex(Regex),
}

#[derive(Debug)]
struct CompiledDefinition {
    kind: TokenKindId,
    definition: TokenDefinition,
    matcher: Matcher,
    not_followed_by: Option<Regex>,
    only_after: Option<SmallVec<[TokenKindId; 4]>>,
    not_after: SmallVec<[TokenKindId; 4]>,
}

/// Context the lexer needs to decide which definitions apply at a position.
#[derive(Debug, Clone, Copy)]
struct LexContext {
    goal: LexicalGoal,
    prev: Option<TokenKindId>,
    at_line_start: bool,
    template_depth: u32,
}

/// A compiled set of token definitions.
#[derive(Debug)]
pub struct Lexer {
    rules: Vec<CompiledDefinition>,
    kind_names: Vec<CompactString>,
    kinds: HashMap<CompactString, TokenKindId, RandomState>,
}

impl Lexer {
    /// Compile token definitions.
    ///
    /// # Errors
    ///
    /// Returns a [`LexerError`] for an invalid name or regular expression, an
    /// empty literal, or an `only_after`/`not_after` reference to a token name
    /// that no definition declares.
    pub fn new(definitions: Vec<TokenDefinition>) -> Result<Self, LexerError> {
        let mut kinds: HashMap<CompactString, TokenKindId, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut kind_names = Vec::new();

        for def in &definitions {
            if def.name.is_empty() || def.name.contains(',') {
                return Err(LexerError::new(def.name.as_str(), LexerErrorKind::InvalidName));
            }
            if !kinds.contains_key(&def.name) {
                let id = u16::try_from(kind_names.len())
                    .map_err(|_| LexerError::new(def.name.as_str(), LexerErrorKind::TooManyKinds))?;
                kinds.insert(def.name.clone(), TokenKindId(id));
                kind_names.push(def.name.clone());
            }
        }

        let resolve = |def: &TokenDefinition, name: &CompactString| {
            kinds.get(name).copied().ok_or_else(|| {
                LexerError::new(
                    def.name.as_str(),
                    LexerErrorKind::UnknownReference {
                        name: name.to_string(),
                    },
                )
            })
        };

        let mut rules = Vec::with_capacity(definitions.len());
        for def in definitions {
            let matcher = match &def.pattern {
                Pattern::Literal(text) if text.is_empty() => {
                    return Err(LexerError::new(def.name.as_str(), LexerErrorKind::EmptyPattern));
                }
                Pattern::Literal(text) => Matcher::Literal(text.clone()),
                Pattern::Regex(source) => Matcher::Regex(anchored(source).map_err(|e| {
                    LexerError::new(
                        def.name.as_str(),
                        LexerErrorKind::InvalidPattern {
                            reason: e.to_string(),
                        },
                    )
                })?),
            };
            let not_followed_by = def
                .not_followed_by
                .as_deref()
                .map(anchored)
                .transpose()
                .map_err(|e| {
                    LexerError::new(
                        def.name.as_str(),
                        LexerErrorKind::InvalidLookahead {
                            reason: e.to_string(),
                        },
                    )
                })?;
            let only_after = def
                .only_after
                .as_ref()
                .map(|names| names.iter().map(|n| resolve(&def, n)).collect())
                .transpose()?;
            let not_after = def
                .not_after
                .iter()
                .map(|n| resolve(&def, n))
                .collect::<Result<_, _>>()?;

            rules.push(CompiledDefinition {
                kind: kinds[&def.name],
                definition: def,
                matcher,
                not_followed_by,
                only_after,
                not_after,
            });
        }

        Ok(Self {
            rules,
            kind_names,
            kinds,
        })
    }

    /// Kind id for a token name.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<TokenKindId> {
        self.kinds.get(name).copied()
    }

    #[must_use]
    pub fn kind_name(&self, kind: TokenKindId) -> Option<&str> {
        self.kind_names.get(usize::from(kind.0)).map(CompactString::as_str)
    }

    /// Definitions in their declaration order.
    pub fn definitions(&self) -> impl Iterator<Item = &TokenDefinition> {
        self.rules.iter().map(|rule| &rule.definition)
    }

    /// Human readable name of a token for diagnostics, e.g. `'}'` or `Identifier`.
    #[must_use]
    pub fn display_name(&self, name: &str) -> String {
        self.rules
            .iter()
            .find(|rule| rule.definition.name == name)
            .map_or_else(|| name.to_string(), |rule| rule.definition.display_name())
    }

    /// Literal text of a token, if every definition of it is literal.
    #[must_use]
    pub fn literal_text(&self, name: &str) -> Option<&str> {
        let mut defs = self.rules.iter().filter(|rule| rule.definition.name == name);
        let first = defs.next()?.definition.pattern.as_literal()?;
        defs.all(|rule| rule.definition.pattern.as_literal() == Some(first))
            .then_some(first)
    }

    /// Read the next significant token at `cursor`.
    ///
    /// Skipped definitions are consumed first; a line terminator inside them
    /// marks the token with `has_line_break_before`. Template continuation and
    /// close tokens are only produced at template depth greater than zero.
    #[must_use]
    pub fn read_token_at(
        &self,
        source: &str,
        cursor: LexCursor,
        goal: LexicalGoal,
        prev: Option<TokenKindId>,
    ) -> Scan {
        let mut cursor = cursor;
        let mut line_break = false;

        loop {
            let Some(rest) = source.get(cursor.offset..) else {
                return Scan::Eof { cursor };
            };
            let Some(found) = rest.chars().next() else {
                return Scan::Eof { cursor };
            };

            let ctx = LexContext {
                goal,
                prev,
                at_line_start: line_break || cursor.offset == 0,
                template_depth: cursor.template_depth,
            };
            let Some((index, len)) = self.longest_match(rest, &ctx) else {
                return Scan::Unrecognized { cursor, found };
            };

            let rule = &self.rules[index];
            let text = &rest[..len];
            let mut next = cursor.advance(text);

            if rule.definition.skip {
                line_break |= contains_line_terminator(text);
                cursor = next;
                continue;
            }

            match rule.definition.template {
                TemplateEffect::Open => next.template_depth += 1,
                TemplateEffect::Close => next.template_depth -= 1,
                TemplateEffect::None | TemplateEffect::Continue => {}
            }

            let token = Token {
                name: rule.definition.name.clone(),
                kind: rule.kind,
                text: CompactString::from(text),
                range: TextRange::from_offsets(cursor.offset, next.offset),
                start: cursor.position(),
                end: next.position(),
                has_line_break_before: line_break,
                index: 0,
            };
            return Scan::Token(TokenCacheEntry { token, next });
        }
    }

    /// Tokenize the whole input in the default goal.
    ///
    /// Stops at the first unrecognized character; the returned offset is
    /// where lexing stopped (`source.len()` when everything was consumed).
    #[must_use]
    pub fn tokenize(&self, source: &str) -> (Vec<Token>, usize) {
        let mut tokens = Vec::new();
        let mut cursor = LexCursor::START;
        let mut prev = None;

        loop {
            match self.read_token_at(source, cursor, LexicalGoal::DEFAULT, prev) {
                Scan::Token(TokenCacheEntry { mut token, next }) => {
                    token.index = tokens.len();
                    prev = Some(token.kind);
                    tokens.push(token);
                    cursor = next;
                }
                Scan::Eof { .. } => return (tokens, source.len()),
                Scan::Unrecognized { cursor, .. } => return (tokens, cursor.offset),
            }
        }
    }

    /// Index and length of the winning definition at the start of `rest`.
    fn longest_match(&self, rest: &str, ctx: &LexContext) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.is_available(ctx) {
                continue;
            }
            let Some(len) = rule.match_len(rest) else {
                continue;
            };
            best = match best {
                None => Some((index, len)),
                Some((best_index, best_len)) => {
                    let wins = len > best_len
                        || (len == best_len
                            && rule.definition.keyword
                            && !self.rules[best_index].definition.keyword);
                    if wins { Some((index, len)) } else { best }
                }
            };
        }

        best
    }
}

impl CompiledDefinition {
    fn is_available(&self, ctx: &LexContext) -> bool {
        let def = &self.definition;
        if !def.available_in(ctx.goal) {
            return false;
        }
        if def.only_at_line_start && !ctx.at_line_start {
            return false;
        }
        if matches!(def.template, TemplateEffect::Continue | TemplateEffect::Close)
            && ctx.template_depth == 0
        {
            return false;
        }
        if let Some(allowed) = &self.only_after
            && !ctx.prev.is_some_and(|prev| allowed.contains(&prev))
        {
            return false;
        }
        !ctx.prev.is_some_and(|prev| self.not_after.contains(&prev))
    }

    fn match_len(&self, rest: &str) -> Option<usize> {
        let len = match &self.matcher {
            Matcher::Literal(text) => rest.starts_with(text.as_str()).then_some(text.len())?,
            Matcher::Regex(regex) => regex.find(rest)?.end(),
        };
        if len == 0 {
            return None;
        }

        let after = &rest[len..];
        if self.definition.keyword && after.chars().next().is_some_and(is_identifier_char) {
            return None;
        }
        if let Some(lookahead) = &self.not_followed_by
            && lookahead.is_match(after)
        {
            return None;
        }
        Some(len)
    }
}

fn anchored(source: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\A(?:{source})"))
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
