//! Real-mode implementation of the combinators.

use super::config::ParserConfig;
use super::state::{
    Attempt, Found, FurthestFailure, Memo, MemoKey, PackratCache, ParseStats, ParserState,
};
use super::{Alt, Combinators, Grammar, Halt, ParseOutput, Parsed, ParserOptions, RuleFn, TokenConsumer};
use crate::error::diagnostics::suggest_fix;
use crate::error::{ExpectedTokens, LexerError, ParseError, RulePath};
use crate::grammar::{RuleRecorder, ValidationError, ValidationReport, Validator};
use crate::lexer::{LexicalGoal, Lexer, Scan, Token, TokenCacheEntry, TokenKindId};
use crate::syntax::{CstNode, TextRange, TextSize};
use ahash::RandomState;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;

/// Pseudo token name expected when input remains after the entry rule.
const END_OF_INPUT: &str = "end of input";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScanKey {
    offset: usize,
    goal: LexicalGoal,
    prev_token: Option<TokenKindId>,
    template_depth: u32,
}

/// Children collected for a rule that is being parsed.
#[derive(Debug)]
struct Frame {
    children: Vec<Arc<CstNode>>,
}

/// Backtracking point: parser state plus the number of children of the
/// innermost open frame and of recovered errors.
#[derive(Debug, Clone, Copy)]
pub(super) struct Mark {
    pub(super) state: ParserState,
    children: usize,
    recoveries: usize,
}

/// Backtracking parser over an on-demand lexer.
///
/// A `Parser` owns its source text and all mutable parse state. Rule
/// functions are executed through the [`Combinators`] implementation below.
pub struct Parser {
    source: String,
    lexer: Lexer,
    config: ParserConfig,
    pub(super) state: ParserState,
    root_children: Vec<Arc<CstNode>>,
    frames: Vec<Frame>,
    memo: PackratCache,
    scans: HashMap<ScanKey, Scan, RandomState>,
    active: HashSet<(&'static str, usize), RandomState>,
    rule_stack: Vec<(&'static str, usize)>,
    pub(super) tokens: Vec<Token>,
    furthest: FurthestFailure,
    high_water: usize,
    pub(super) stats: ParseStats,
    pub(super) recoveries: Vec<(TextRange, ParseError)>,
    token_consumer: Option<Box<dyn TokenConsumer>>,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("source_len", &self.source.len())
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// Create a parser for `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`LexerError`] if the token definitions do not compile.
    pub fn new(source: impl Into<String>, options: ParserOptions) -> Result<Self, LexerError> {
        let lexer = Lexer::new(options.token_definitions)?;
        let config = ParserConfig::default();
        Ok(Self {
            source: source.into(),
            lexer,
            memo: PackratCache::new(config.max_memo_size),
            config,
            state: ParserState::START,
            root_children: Vec::new(),
            frames: Vec::new(),
            scans: HashMap::with_hasher(RandomState::new()),
            active: HashSet::with_hasher(RandomState::new()),
            rule_stack: Vec::new(),
            tokens: Vec::new(),
            furthest: FurthestFailure::default(),
            high_water: 0,
            stats: ParseStats::default(),
            recoveries: Vec::new(),
            token_consumer: options.token_consumer,
        })
    }

    /// Create a parser using the token definitions of grammar `G`.
    ///
    /// # Errors
    ///
    /// Returns a [`LexerError`] if the token definitions do not compile.
    pub fn for_grammar<G: Grammar>(source: impl Into<String>) -> Result<Self, LexerError> {
        Self::new(source, ParserOptions::new(G::token_definitions()))
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.memo.resize(config.max_memo_size);
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    #[must_use]
    pub const fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Enable or disable packrat memoization.
    pub fn cache(&mut self, enable: bool) -> &mut Self {
        self.config.enable_memoization = enable;
        self
    }

    /// Log rule entry and exit; with `show_path` every line carries the full rule path.
    pub fn debug(&mut self, show_path: bool) -> &mut Self {
        self.config.debug = true;
        self.config.show_path = show_path;
        self
    }

    /// Enable or disable error recovery.
    pub fn error_handler(&mut self, enable: bool) -> &mut Self {
        self.config.error_recovery = enable;
        self
    }

    /// Statically validate the grammar reachable from `entry`.
    ///
    /// Validation records the rules with a separate [`RuleRecorder`] and
    /// never touches the parse state.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every finding.
    pub fn validate(
        &mut self,
        entry: &'static str,
        rule: RuleFn<RuleRecorder>,
    ) -> Result<&mut Self, ValidationError> {
        let definitions = self.lexer.definitions().cloned().collect();
        let grammar = RuleRecorder::collect(entry, rule, definitions);
        let report = Validator::new(self.config.analyzer.clone()).validate_collected(&grammar)?;
        log_report(&report);
        Ok(self)
    }

    /// [`validate`](Self::validate) for a [`Grammar`] type.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every finding.
    pub fn validate_grammar<G: Grammar>(&mut self) -> Result<&mut Self, ValidationError> {
        self.validate(G::ENTRY, G::entry::<RuleRecorder>)
    }

    /// Parse the whole input with grammar `G`.
    ///
    /// # Errors
    ///
    /// See [`parse_rule`](Self::parse_rule).
    pub fn parse<G: Grammar>(&mut self) -> Result<ParseOutput, ParseError> {
        self.parse_rule(G::ENTRY, G::entry::<Self>)
    }

    /// Parse the whole input starting at rule `name`.
    ///
    /// # Errors
    ///
    /// Returns a syntax error if the rule does not match or input remains
    /// after it, and the fatal errors raised by the runtime checks
    /// (left recursion, non-progressing loops, recursion limit).
    pub fn parse_rule(
        &mut self,
        name: &'static str,
        rule: RuleFn<Self>,
    ) -> Result<ParseOutput, ParseError> {
        let started = Instant::now();
        self.reset();

        let outcome = match self.subrule(name, rule) {
            Ok(()) => self.finish(),
            Err(Halt::Mismatch) => Err(self.syntax_error()),
            Err(Halt::Fatal(error)) => Err(*error),
        };

        self.stats.parse_time = started.elapsed();
        self.stats.cache_hits = self.memo.hits();
        self.stats.cache_misses = self.memo.misses();
        self.stats.cache_evictions = self.memo.evictions();
        self.stats.errors_recovered = self.recoveries.len();

        match outcome {
            Ok(mut output) => {
                output.stats = self.stats.clone();
                log::debug!(
                    "parsed `{name}`: {} tokens, {} backtracks, {} cache hits",
                    output.tokens.len(),
                    self.stats.backtracks,
                    self.stats.cache_hits
                );
                Ok(output)
            }
            Err(error) => {
                log::debug!("parse of `{name}` failed: {error}");
                Err(error)
            }
        }
    }

    /// Counters of the most recent parse.
    #[must_use]
    pub const fn stats(&self) -> &ParseStats {
        &self.stats
    }

    fn reset(&mut self) {
        self.state = ParserState::START;
        self.root_children.clear();
        self.frames.clear();
        self.memo.clear();
        self.active.clear();
        self.rule_stack.clear();
        self.tokens.clear();
        self.furthest = FurthestFailure::default();
        self.high_water = 0;
        self.stats = ParseStats::default();
        self.recoveries.clear();
    }

    fn finish(&mut self) -> Result<ParseOutput, ParseError> {
        let scan = self.scan(LexicalGoal::DEFAULT);
        if !matches!(scan, Scan::Eof { .. }) {
            self.record_expected(END_OF_INPUT, &scan);
            return Err(self.syntax_error());
        }

        let root = self.root_children.pop().ok_or_else(|| {
            ParseError::custom(TextRange::default(), "entry rule produced no syntax tree")
        })?;
        self.tokens.truncate(self.state.token_index);

        if let Some(consumer) = self.token_consumer.as_mut() {
            for token in &self.tokens {
                consumer.accept(token);
            }
        }

        let mut fragments = Vec::new();
        collect_error_nodes(&root, &mut fragments);
        let errors = fragments
            .iter()
            .filter_map(|node| {
                self.recoveries
                    .iter()
                    .find(|(range, _)| *range == node.range)
                    .map(|(_, error)| error.clone())
            })
            .collect();

        Ok(ParseOutput {
            root,
            tokens: self.tokens.clone(),
            errors,
            fragments,
            stats: ParseStats::default(),
        })
    }

    pub(super) fn mark(&self) -> Mark {
        Mark {
            state: self.state,
            children: self.frame_children().len(),
            recoveries: self.recoveries.len(),
        }
    }

    /// Restore a mark, touching only what changed.
    pub(super) fn rewind(&mut self, mark: Mark) {
        if self.state != mark.state {
            self.state = mark.state;
            self.stats.backtracks += 1;
        }
        let children = self.frame_children_mut();
        if children.len() != mark.children {
            children.truncate(mark.children);
        }
        self.recoveries.truncate(mark.recoveries);
    }

    fn frame_children(&self) -> &Vec<Arc<CstNode>> {
        match self.frames.last() {
            Some(frame) => &frame.children,
            None => &self.root_children,
        }
    }

    fn frame_children_mut(&mut self) -> &mut Vec<Arc<CstNode>> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.root_children,
        }
    }

    pub(super) fn push_child(&mut self, node: Arc<CstNode>) {
        self.frame_children_mut().push(node);
    }

    /// Token at the current position under `goal`, cached per lexing context.
    pub(super) fn scan(&mut self, goal: LexicalGoal) -> Scan {
        let key = ScanKey {
            offset: self.state.offset,
            goal,
            prev_token: self.state.prev_token,
            template_depth: self.state.template_depth,
        };
        if let Some(scan) = self.scans.get(&key) {
            return scan.clone();
        }
        let scan = self
            .lexer
            .read_token_at(&self.source, self.state.cursor(), goal, self.state.prev_token);
        self.scans.insert(key, scan.clone());
        scan
    }

    /// Append `token` to the committed stream and move past it.
    pub(super) fn commit(&mut self, mut token: Token, next: crate::lexer::LexCursor) -> Arc<CstNode> {
        token.index = self.state.token_index;
        self.state = self.state.after(&token, next);
        self.high_water = self.high_water.max(self.state.offset);
        self.stats.tokens_consumed += 1;

        let node = Arc::new(CstNode::token(&token));
        self.tokens.truncate(token.index);
        self.tokens.push(token);
        node
    }

    fn record_expected(&mut self, name: &'static str, scan: &Scan) {
        let offset = scan.offset();
        match self.furthest.offset {
            Some(furthest) if offset < furthest => return,
            Some(furthest) if offset == furthest => {}
            _ => {
                self.furthest = FurthestFailure {
                    offset: Some(offset),
                    position: scan.position(),
                    expected: SmallVec::new(),
                    found: match scan {
                        Scan::Token(entry) => Found::Token {
                            name: entry.token.name.to_string(),
                            text: entry.token.text.to_string(),
                            range: entry.token.range,
                        },
                        Scan::Eof { .. } => Found::Eof,
                        Scan::Unrecognized { found, .. } => Found::Unrecognized(*found),
                    },
                    rule_path: self.rule_stack.iter().map(|(rule, _)| *rule).collect(),
                };
            }
        }
        if !self.furthest.expected.contains(&name) {
            self.furthest.expected.push(name);
        }
    }

    /// Syntax error describing the furthest failure.
    pub(super) fn syntax_error(&self) -> ParseError {
        self.error_from(&self.furthest)
    }

    /// Syntax error describing `failure`.
    pub(super) fn error_from(&self, failure: &FurthestFailure) -> ParseError {
        let offset = failure.offset.unwrap_or(self.state.offset);
        let expected = ExpectedTokens(
            failure
                .expected
                .iter()
                .map(|name| self.lexer.display_name(name))
                .collect(),
        );
        let literals: Vec<String> = failure
            .expected
            .iter()
            .map(|name| self.lexer.literal_text(name).unwrap_or(*name).to_string())
            .collect();
        let rule_path = RulePath(failure.rule_path.iter().map(ToString::to_string).collect());
        let point = TextRange::empty(TextSize::of(offset));

        match &failure.found {
            Found::Eof => ParseError::UnexpectedEof {
                span: point,
                position: failure.position,
                expected,
                rule_path,
                suggestion: suggest_fix(&literals, None),
            },
            Found::Token { name, text, range } => ParseError::Syntax {
                span: *range,
                position: failure.position,
                expected,
                found: format!("{name} '{text}'"),
                rule_path,
                suggestion: suggest_fix(&literals, Some(text)),
            },
            Found::Unrecognized(c) => ParseError::Syntax {
                span: TextRange::from_offsets(offset, offset + c.len_utf8()),
                position: failure.position,
                expected,
                found: format!("unrecognized character {c:?}"),
                rule_path,
                suggestion: None,
            },
            Found::Nothing => ParseError::Syntax {
                span: point,
                position: self.state.position(),
                expected,
                found: "no match".to_string(),
                rule_path,
                suggestion: None,
            },
        }
    }

    fn current_rule(&self) -> &'static str {
        self.rule_stack.last().map_or("<root>", |&(rule, _)| rule)
    }

    fn error_span(&self) -> TextRange {
        TextRange::empty(TextSize::of(self.state.offset))
    }

    fn left_recursion(&self, name: &'static str) -> Halt {
        let offset = self.state.offset;
        let from = self
            .rule_stack
            .iter()
            .position(|entry| *entry == (name, offset))
            .unwrap_or(0);
        let mut cycle: Vec<String> = self.rule_stack[from..]
            .iter()
            .map(|(rule, _)| (*rule).to_string())
            .collect();
        cycle.push(name.to_string());
        ParseError::LeftRecursion {
            span: self.error_span(),
            position: self.state.position(),
            rule: name.to_string(),
            cycle: RulePath(cycle),
        }
        .into()
    }

    fn infinite_loop(&self, mark: Mark, attempts: usize) -> Halt {
        let mut suspects: Vec<String> = Vec::new();
        for child in self.frame_children().iter().skip(mark.children) {
            for node in child.descendants() {
                if !node.is_token()
                    && node.range.is_empty()
                    && !suspects.iter().any(|s| s.as_str() == node.name.as_str())
                {
                    suspects.push(node.name.to_string());
                }
            }
        }
        ParseError::InfiniteLoop {
            span: self.error_span(),
            position: self.state.position(),
            rule: self.current_rule().to_string(),
            attempts,
            suspects,
        }
        .into()
    }

    fn trace(&self, event: &str, name: &'static str) {
        if !self.config.debug {
            return;
        }
        let at = self.state.position();
        if self.config.show_path {
            let path: Vec<&str> = self.rule_stack.iter().map(|(rule, _)| *rule).collect();
            log::debug!("{event} {name} @{at} [{}]", path.join(" > "));
        } else {
            log::debug!("{event} {name} @{at}");
        }
    }

    /// Execute a rule body inside its own frame.
    ///
    /// The body runs with its own high-water mark and furthest failure so
    /// that both can be memoized and replayed on a cache hit.
    fn run_rule(&mut self, name: &'static str, rule: RuleFn<Self>) -> Parsed {
        let start = self.state;
        let key = MemoKey::new(name, &start);

        if self.config.enable_memoization
            && let Some(memo) = self.memo.get(&key)
        {
            log::trace!("memo hit {name} @{}", start.offset);
            return self.replay(memo);
        }

        let depth = self.rule_stack.len();
        let recoveries = self.recoveries.len();
        let outer_high_water = std::mem::replace(&mut self.high_water, start.offset);
        let outer_failure = std::mem::take(&mut self.furthest);
        self.rule_stack.push((name, start.offset));
        self.frames.push(Frame {
            children: Vec::new(),
        });
        self.trace("enter", name);

        let result = rule(self);

        let children = self.frames.pop().map(|frame| frame.children).unwrap_or_default();
        self.trace(if result.is_ok() { "match" } else { "fail" }, name);
        self.rule_stack.pop();

        let reached = self.high_water;
        self.high_water = outer_high_water.max(reached);
        let failure = std::mem::replace(&mut self.furthest, outer_failure);
        self.furthest.merge(&failure);
        let attempt = |recovered: &[(TextRange, ParseError)]| Attempt {
            reached,
            failure: failure.clone().relative_to(depth),
            recoveries: Arc::from(recovered),
        };

        match &result {
            Ok(()) => {
                let node = Arc::new(CstNode::rule(
                    name,
                    children,
                    (TextSize::of(start.offset), start.position()),
                ));
                self.stats.nodes_created += 1;
                if self.config.enable_memoization {
                    let tokens = Arc::from(&self.tokens[start.token_index..self.state.token_index]);
                    let attempt = attempt(&self.recoveries[recoveries..]);
                    self.memo.insert(
                        key,
                        Memo::Success {
                            end: self.state,
                            node: Arc::clone(&node),
                            tokens,
                            attempt,
                        },
                    );
                }
                self.push_child(node);
            }
            Err(Halt::Mismatch) => {
                self.state = start;
                self.recoveries.truncate(recoveries);
                if self.config.enable_memoization {
                    self.memo.insert(key, Memo::Failure(attempt(&[])));
                }
            }
            Err(Halt::Fatal(_)) => {
                self.state = start;
                self.recoveries.truncate(recoveries);
            }
        }
        result
    }

    /// Reproduce the side effects of a memoized attempt.
    fn replay_attempt(&mut self, attempt: &Attempt) {
        self.high_water = self.high_water.max(attempt.reached);
        let failure = attempt
            .failure
            .rooted_at(self.rule_stack.iter().map(|(rule, _)| *rule));
        self.furthest.merge(&failure);
        self.recoveries.extend(attempt.recoveries.iter().cloned());
    }

    fn replay(&mut self, memo: Memo) -> Parsed {
        match memo {
            Memo::Success {
                end,
                node,
                tokens,
                attempt,
            } => {
                let first = self.state.token_index;
                self.tokens.truncate(first);
                self.tokens.extend(tokens.iter().enumerate().map(|(i, token)| {
                    let mut token = token.clone();
                    token.index = first + i;
                    token
                }));
                self.state = ParserState {
                    token_index: first + tokens.len(),
                    ..end
                };
                self.replay_attempt(&attempt);
                self.push_child(node);
                Ok(())
            }
            Memo::Failure(attempt) => {
                self.replay_attempt(&attempt);
                Err(Halt::Mismatch)
            }
        }
    }

    /// Iterate `body` until it stops matching.
    fn repeat<F>(&mut self, body: &mut F, mut iterations: usize) -> Parsed
    where
        F: FnMut(&mut Self) -> Parsed,
    {
        loop {
            let mark = self.mark();
            let saved_high_water = std::mem::replace(&mut self.high_water, mark.state.offset);
            let saved_failure = std::mem::take(&mut self.furthest);
            let result = body(self);
            let reached = self.high_water;
            self.high_water = saved_high_water.max(reached);
            let failure = std::mem::replace(&mut self.furthest, saved_failure);
            self.furthest.merge(&failure);

            match result {
                Ok(()) if self.state.offset == mark.state.offset
                    && self.state.token_index == mark.state.token_index =>
                {
                    return Err(self.infinite_loop(mark, iterations + 1));
                }
                Ok(()) => iterations += 1,
                Err(Halt::Mismatch) => {
                    self.rewind(mark);
                    if self.config.error_recovery
                        && reached > mark.state.offset
                        && self.recover(&failure)
                    {
                        iterations += 1;
                        continue;
                    }
                    return Ok(());
                }
                Err(fatal) => return Err(fatal),
            }
        }
    }
}

impl Combinators for Parser {
    fn consume_in(&mut self, token: &'static str, goal: LexicalGoal) -> Parsed {
        match self.scan(goal) {
            Scan::Token(TokenCacheEntry { token: found, next }) if found.name == token => {
                let node = self.commit(found, next);
                self.push_child(node);
                Ok(())
            }
            scan => {
                self.record_expected(token, &scan);
                Err(Halt::Mismatch)
            }
        }
    }

    fn subrule(&mut self, name: &'static str, rule: RuleFn<Self>) -> Parsed {
        let offset = self.state.offset;
        if !self.active.insert((name, offset)) {
            return Err(self.left_recursion(name));
        }
        if self.rule_stack.len() >= self.config.max_rule_depth {
            self.active.remove(&(name, offset));
            return Err(ParseError::RecursionLimit {
                span: self.error_span(),
                position: self.state.position(),
                rule: name.to_string(),
                depth: self.config.max_rule_depth,
            }
            .into());
        }

        let result = self.run_rule(name, rule);
        self.active.remove(&(name, offset));
        result
    }

    fn or(&mut self, alternatives: &[Alt<'_, Self>]) -> Parsed {
        for alternative in alternatives {
            let mark = self.mark();
            match alternative(self) {
                Ok(()) => return Ok(()),
                Err(Halt::Mismatch) => self.rewind(mark),
                Err(fatal) => return Err(fatal),
            }
        }
        Err(Halt::Mismatch)
    }

    fn many<F>(&mut self, mut body: F) -> Parsed
    where
        F: FnMut(&mut Self) -> Parsed,
    {
        self.repeat(&mut body, 0)
    }

    fn at_least_one<F>(&mut self, mut body: F) -> Parsed
    where
        F: FnMut(&mut Self) -> Parsed,
    {
        let mark = self.mark();
        match body(self) {
            Ok(()) if self.state.offset == mark.state.offset
                && self.state.token_index == mark.state.token_index =>
            {
                Err(self.infinite_loop(mark, 1))
            }
            Ok(()) => self.repeat(&mut body, 1),
            Err(Halt::Mismatch) => {
                self.rewind(mark);
                Err(Halt::Mismatch)
            }
            Err(fatal) => Err(fatal),
        }
    }

    fn option<F>(&mut self, body: F) -> Parsed
    where
        F: FnOnce(&mut Self) -> Parsed,
    {
        let mark = self.mark();
        match body(self) {
            Err(Halt::Mismatch) => {
                self.rewind(mark);
                Ok(())
            }
            other => other,
        }
    }

    fn not_followed_by(&mut self, token: &'static str, goal: LexicalGoal) -> Parsed {
        match self.scan(goal) {
            Scan::Token(entry) if entry.token.name == token => Err(Halt::Mismatch),
            _ => Ok(()),
        }
    }

    fn no_line_break(&mut self) -> Parsed {
        match self.scan(LexicalGoal::DEFAULT) {
            Scan::Token(entry) if entry.token.has_line_break_before => Err(Halt::Mismatch),
            _ => Ok(()),
        }
    }
}

fn collect_error_nodes(node: &Arc<CstNode>, out: &mut Vec<Arc<CstNode>>) {
    if node.is_error() {
        out.push(Arc::clone(node));
        return;
    }
    for child in &node.children {
        collect_error_nodes(child, out);
    }
}

fn log_report(report: &ValidationReport) {
    log::debug!(
        "grammar `{}` validated: {} rules, {} choices",
        report.entry,
        report.stats.rules,
        report.stats.choices
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenDefinition;

    fn parser(source: &str) -> Parser {
        Parser::new(
            source,
            ParserOptions::new(vec![
                TokenDefinition::regex("Whitespace", r"\s+").skipped(),
                TokenDefinition::regex("Identifier", "[a-z]+"),
                TokenDefinition::literal("Comma", ","),
                TokenDefinition::literal("Semicolon", ";"),
            ]),
        )
        .unwrap()
    }

    fn list<P: Combinators>(p: &mut P) -> Parsed {
        p.consume("Identifier")?;
        p.many(|p| {
            p.consume("Comma")?;
            p.consume("Identifier")
        })
    }

    fn looping<P: Combinators>(p: &mut P) -> Parsed {
        p.many(|p| p.option(|p| p.consume("Comma")))
    }

    fn recursive<P: Combinators>(p: &mut P) -> Parsed {
        p.or(&[
            &|p| {
                p.subrule("Recursive", recursive)?;
                p.consume("Comma")
            },
            &|p| p.consume("Identifier"),
        ])
    }

    #[test]
    fn test_mark_and_rewind() {
        let mut parser = parser("a , b");
        let mark = parser.mark();
        parser.consume("Identifier").unwrap();
        assert_eq!(parser.state.offset, 1);
        assert_eq!(parser.frame_children().len(), 1);
        parser.rewind(mark);
        assert_eq!(parser.state, ParserState::START);
        assert!(parser.frame_children().is_empty());
        assert_eq!(parser.stats.backtracks, 1);
    }

    #[test]
    fn test_option_restores_position() {
        let mut parser = parser("a ;");
        parser.consume("Identifier").unwrap();
        let before = parser.state;
        parser
            .option(|p| {
                p.consume("Comma")?;
                p.consume("Identifier")
            })
            .unwrap();
        assert_eq!(parser.state, before);
    }

    #[test]
    fn test_list_parses() {
        let mut parser = parser("a, b ,c");
        let output = parser.parse_rule("List", list).unwrap();
        assert_eq!(output.tokens.len(), 5);
        assert_eq!(output.root.name, "List");
        assert!(output.tokens.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_trailing_input_is_an_error() {
        let mut parser = parser("a, b ;");
        let error = parser.parse_rule("List", list).unwrap_err();
        assert!(matches!(error, ParseError::Syntax { .. }), "{error}");
        let expected = error.expected().unwrap();
        assert!(expected.iter().any(|e| e == "end of input"));
        assert!(expected.iter().any(|e| e == "','"));
    }

    #[test]
    fn test_non_progressing_loop_is_fatal() {
        let mut parser = parser("a");
        let error = parser.parse_rule("Looping", looping).unwrap_err();
        assert!(
            matches!(error, ParseError::InfiniteLoop { ref rule, attempts: 1, .. } if rule == "Looping"),
            "{error}"
        );
    }

    #[test]
    fn test_left_recursion_is_fatal() {
        let mut parser = parser("a,");
        let error = parser.parse_rule("Recursive", recursive).unwrap_err();
        match error {
            ParseError::LeftRecursion { rule, cycle, .. } => {
                assert_eq!(rule, "Recursive");
                assert_eq!(cycle.0, ["Recursive", "Recursive"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_recursion_limit() {
        fn nested<P: Combinators>(p: &mut P) -> Parsed {
            p.consume("Identifier")?;
            p.option(|p| p.subrule("Nested", nested))
        }
        let source = vec!["a"; 50].join(" ");
        let mut parser = parser(&source).with_config(ParserConfig::default().with_max_rule_depth(10));
        let error = parser.parse_rule("Nested", nested).unwrap_err();
        assert!(matches!(error, ParseError::RecursionLimit { depth: 10, .. }));
    }

    #[test]
    fn test_no_line_break() {
        fn same_line<P: Combinators>(p: &mut P) -> Parsed {
            p.consume("Identifier")?;
            p.no_line_break()?;
            p.consume("Identifier")
        }
        assert!(parser("a b").parse_rule("SameLine", same_line).is_ok());
        assert!(parser("a\nb").parse_rule("SameLine", same_line).is_err());
    }

    #[test]
    fn test_not_followed_by() {
        fn bare<P: Combinators>(p: &mut P) -> Parsed {
            p.consume("Identifier")?;
            p.not_followed_by("Comma", LexicalGoal::DEFAULT)
        }
        assert!(parser("a").parse_rule("Bare", bare).is_ok());
        assert!(parser("a,").parse_rule("Bare", bare).is_err());
    }
}
