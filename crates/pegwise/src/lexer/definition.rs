//! Token definitions: the declarative input of the [`Lexer`](super::Lexer).

use compact_str::CompactString;
use smallvec::SmallVec;
use std::fmt;

/// Lexical goal selecting which token definitions are available.
///
/// Goals separate token sets that would otherwise overlap, such as a regular
/// expression literal versus a division operator, or a template continuation
/// versus a closing brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LexicalGoal(pub &'static str);

impl LexicalGoal {
    pub const DEFAULT: Self = Self("Default");

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl Default for LexicalGoal {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for LexicalGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// What a token matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Exact text
    Literal(CompactString),
    /// Regular expression, implicitly anchored at the current offset
    Regex(CompactString),
}

impl Pattern {
    #[must_use]
    pub fn literal(text: impl Into<CompactString>) -> Self {
        Self::Literal(text.into())
    }

    #[must_use]
    pub fn regex(source: impl Into<CompactString>) -> Self {
        Self::Regex(source.into())
    }

    /// The literal text, if this is a literal pattern.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            Self::Regex(_) => None,
        }
    }
}

/// Effect a token has on template nesting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateEffect {
    #[default]
    None,
    /// Opens a template substitution (depth + 1)
    Open,
    /// Continues a template between substitutions; only valid at depth > 0
    Continue,
    /// Closes a template (depth - 1); only valid at depth > 0
    Close,
}

/// A single token definition.
///
/// Definitions are tried in order; the longest match wins, ties prefer
/// keywords and then the earlier definition. Several definitions may share a
/// name, in which case they produce the same token kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDefinition {
    pub name: CompactString,
    pub pattern: Pattern,
    /// Keyword tokens win length ties and must end on a word boundary.
    pub keyword: bool,
    /// Skipped tokens (whitespace, comments) never reach the parser.
    pub skip: bool,
    /// `None` makes the token available in every goal.
    pub goals: Option<SmallVec<[LexicalGoal; 2]>>,
    pub only_at_line_start: bool,
    /// When set, the previous significant token must be one of these.
    pub only_after: Option<SmallVec<[CompactString; 4]>>,
    /// The previous significant token must not be one of these.
    pub not_after: SmallVec<[CompactString; 4]>,
    /// Regex that must not match directly after the token.
    pub not_followed_by: Option<CompactString>,
    pub template: TemplateEffect,
}

impl TokenDefinition {
    #[must_use]
    pub fn new(name: impl Into<CompactString>, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            keyword: false,
            skip: false,
            goals: None,
            only_at_line_start: false,
            only_after: None,
            not_after: SmallVec::new(),
            not_followed_by: None,
            template: TemplateEffect::None,
        }
    }

    /// Literal token, e.g. `TokenDefinition::literal("Plus", "+")`.
    #[must_use]
    pub fn literal(name: impl Into<CompactString>, text: impl Into<CompactString>) -> Self {
        Self::new(name, Pattern::literal(text))
    }

    #[must_use]
    pub fn regex(name: impl Into<CompactString>, source: impl Into<CompactString>) -> Self {
        Self::new(name, Pattern::regex(source))
    }

    /// Keyword token matching its literal text.
    #[must_use]
    pub fn keyword(name: impl Into<CompactString>, text: impl Into<CompactString>) -> Self {
        let mut def = Self::literal(name, text);
        def.keyword = true;
        def
    }

    /// Trivia token that is consumed silently.
    #[must_use]
    pub fn skip(name: impl Into<CompactString>, pattern: Pattern) -> Self {
        let mut def = Self::new(name, pattern);
        def.skip = true;
        def
    }

    /// Marks the definition as skipped trivia.
    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    #[must_use]
    pub fn in_goals(mut self, goals: &[LexicalGoal]) -> Self {
        self.goals = Some(goals.iter().copied().collect());
        self
    }

    #[must_use]
    pub fn at_line_start(mut self) -> Self {
        self.only_at_line_start = true;
        self
    }

    #[must_use]
    pub fn only_after(mut self, names: &[&str]) -> Self {
        self.only_after = Some(names.iter().map(|n| CompactString::from(*n)).collect());
        self
    }

    #[must_use]
    pub fn not_after(mut self, names: &[&str]) -> Self {
        self.not_after = names.iter().map(|n| CompactString::from(*n)).collect();
        self
    }

    #[must_use]
    pub fn not_followed_by(mut self, regex: impl Into<CompactString>) -> Self {
        self.not_followed_by = Some(regex.into());
        self
    }

    #[must_use]
    pub fn template(mut self, effect: TemplateEffect) -> Self {
        self.template = effect;
        self
    }

    /// Whether the token may be produced while lexing in `goal`.
    #[must_use]
    pub fn available_in(&self, goal: LexicalGoal) -> bool {
        self.goals.as_ref().is_none_or(|goals| goals.contains(&goal))
    }

    /// Name used in diagnostics: the quoted literal when there is one.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.pattern {
            Pattern::Literal(text) if !self.keyword => format!("'{text}'"),
            _ => self.name.to_string(),
        }
    }
}

/// Fluent construction of a token definition list.
#[derive(Debug, Default, Clone)]
pub struct LexerBuilder {
    definitions: Vec<TokenDefinition>,
}

impl LexerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(mut self, name: &str, pattern: Pattern) -> Self {
        self.definitions.push(TokenDefinition::new(name, pattern));
        self
    }

    #[must_use]
    pub fn keyword(mut self, name: &str, text: &str) -> Self {
        self.definitions.push(TokenDefinition::keyword(name, text));
        self
    }

    #[must_use]
    pub fn skip(mut self, name: &str, pattern: Pattern) -> Self {
        self.definitions.push(TokenDefinition::skip(name, pattern));
        self
    }

    /// Adds a fully configured definition.
    #[must_use]
    pub fn definition(mut self, definition: TokenDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    #[must_use]
    pub fn definitions(self) -> Vec<TokenDefinition> {
        self.definitions
    }

    /// Compiles the definitions into a [`Lexer`](super::Lexer).
    ///
    /// # Errors
    ///
    /// See [`Lexer::new`](super::Lexer::new).
    pub fn build(self) -> Result<super::Lexer, crate::error::LexerError> {
        super::Lexer::new(self.definitions)
    }
}
