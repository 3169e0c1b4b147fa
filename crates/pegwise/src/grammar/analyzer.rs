//! # Grammar Analyzer
//!
//! Computes which token sequences a rule (or any rule fragment) can begin
//! with, using two strategies:
//!
//! - **depth-first** First-K expansion: every path is cut to K tokens, rule
//!   references are followed up to `max_depth` levels, repetitions are closed
//!   to a fixpoint. Results are cached per (rule, K, remaining depth).
//! - **breadth-first** level expansion: level `d` inlines rule references
//!   fewer than `d` levels deep and keeps deeper ones as `<Rule>`
//!   placeholders. Paths are not cut, repetitions are unrolled once, and a
//!   level is derived from the nearest cached shallower level.
//!
//! Both detect left recursion; the validator cross-checks them.

use super::config::AnalyzerConfig;
use super::path::{Path, PathSet, Symbol, product};
use super::rule::{CollectedGrammar, RuleNode};
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("grammar analysis exceeded its {limit:?} budget after {elapsed:?}")]
    Timeout { elapsed: Duration, limit: Duration },
}

/// Left-recursive cycle; the first rule is repeated at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursionCycle {
    pub rules: Vec<CompactString>,
}

impl RecursionCycle {
    #[must_use]
    pub fn head(&self) -> &str {
        self.rules.first().map_or("", CompactString::as_str)
    }

    /// Direct recursion: `A := A ...`
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.rules.len() == 2
    }
}

impl std::fmt::Display for RecursionCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.rules.iter().map(CompactString::as_str).collect();
        f.write_str(&names.join(" -> "))
    }
}

/// Result of a breadth expansion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expansion {
    pub paths: PathSet,
    /// The path cap was hit; `paths` is incomplete.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalyzerStats {
    pub depth_first: CacheStats,
    pub breadth_first: CacheStats,
    pub nullable_rules: usize,
}

/// Wall-clock budget, checked on the first step and then every 256 steps.
#[derive(Debug)]
struct Deadline {
    started: Instant,
    limit: Duration,
    steps: u32,
}

impl Deadline {
    fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            steps: 0,
        }
    }

    fn check(&mut self) -> Result<(), AnalysisError> {
        self.steps = self.steps.wrapping_add(1);
        if self.steps % 256 != 1 {
            return Ok(());
        }
        let elapsed = self.started.elapsed();
        if elapsed > self.limit {
            return Err(AnalysisError::Timeout {
                elapsed,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

type DepthKey = (CompactString, usize, usize);

pub struct GrammarAnalyzer<'g> {
    grammar: &'g CollectedGrammar,
    config: AnalyzerConfig,
    depth_cache: HashMap<DepthKey, PathSet, RandomState>,
    level_cache: HashMap<CompactString, BTreeMap<usize, Expansion>, RandomState>,
    nullable: HashSet<CompactString, RandomState>,
    left_stack: Vec<CompactString>,
    cuts: usize,
    cycles: Vec<RecursionCycle>,
    stats: AnalyzerStats,
    deadline: Deadline,
}

impl<'g> GrammarAnalyzer<'g> {
    #[must_use]
    pub fn new(grammar: &'g CollectedGrammar, config: AnalyzerConfig) -> Self {
        let config = config.normalized();
        let nullable = nullable_rules(grammar);
        let deadline = Deadline::new(config.timeout);
        let stats = AnalyzerStats {
            nullable_rules: nullable.len(),
            ..AnalyzerStats::default()
        };
        Self {
            grammar,
            config,
            depth_cache: HashMap::with_hasher(RandomState::new()),
            level_cache: HashMap::with_hasher(RandomState::new()),
            nullable,
            left_stack: Vec::new(),
            cuts: 0,
            cycles: Vec::new(),
            stats,
            deadline,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> AnalyzerStats {
        let mut stats = self.stats;
        stats.depth_first.entries = self.depth_cache.len();
        stats.breadth_first.entries = self.level_cache.values().map(BTreeMap::len).sum();
        stats
    }

    #[must_use]
    pub fn is_nullable(&self, rule: &str) -> bool {
        self.nullable.contains(rule)
    }

    /// First-K paths of `rule`, following references up to `max_depth` levels.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Timeout`] when the time budget is spent.
    pub fn expand(
        &mut self,
        rule: &str,
        first_k: usize,
        max_depth: usize,
    ) -> Result<PathSet, AnalysisError> {
        self.left_stack.clear();
        self.dfs_rule(rule, first_k, max_depth, true)
    }

    /// First-K paths of a rule fragment, with the configured K and depth.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Timeout`] when the time budget is spent.
    pub fn first_k_of(&mut self, node: &RuleNode) -> Result<PathSet, AnalysisError> {
        self.left_stack.clear();
        self.dfs_node(node, self.config.first_k, self.config.max_depth, false)
    }

    /// Left-recursive cycle through `rule`, found by depth-first expansion.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Timeout`] when the time budget is spent.
    pub fn left_recursion_depth_first(
        &mut self,
        rule: &str,
    ) -> Result<Option<RecursionCycle>, AnalysisError> {
        self.cycles.clear();
        self.expand(rule, self.config.first_k, self.config.max_depth)?;
        Ok(self.cycles.iter().find(|cycle| cycle.head() == rule).cloned())
    }

    /// Whether `rule` is left-recursive according to breadth expansion.
    ///
    /// `None` means the path cap truncated an expansion before a
    /// recursion was seen, so the answer is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Timeout`] when the time budget is spent.
    pub fn left_recursion_breadth_first(
        &mut self,
        rule: &str,
    ) -> Result<Option<bool>, AnalysisError> {
        let mut truncated = false;
        for depth in 1..=self.config.max_depth.max(1) {
            let expansion = self.expand_breadth(rule, depth)?;
            truncated |= expansion.truncated;
            if expansion.paths.iter().any(|path| self.starts_with_rule(path, rule)) {
                return Ok(Some(true));
            }
        }
        Ok(if truncated { None } else { Some(false) })
    }

    /// Level `depth` (at least 1) of the breadth expansion of `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Timeout`] when the time budget is spent.
    pub fn expand_breadth(&mut self, rule: &str, depth: usize) -> Result<Expansion, AnalysisError> {
        let depth = depth.max(1);
        if let Some(hit) = self.level_cache.get(rule).and_then(|levels| levels.get(&depth)) {
            self.stats.breadth_first.hits += 1;
            return Ok(hit.clone());
        }
        self.stats.breadth_first.misses += 1;
        self.deadline.check()?;

        let grammar = self.grammar;
        let Some(body) = grammar.rule(rule) else {
            return Ok(Expansion {
                paths: PathSet::from([Path::rule(rule)]),
                truncated: false,
            });
        };

        let nearest = self
            .level_cache
            .get(rule)
            .and_then(|levels| levels.range(..depth).next_back())
            .map(|(level, expansion)| (*level, expansion.clone()));

        let expansion = match nearest {
            Some((level, base)) => self.substitute(base, depth - level)?,
            None => {
                let base = self.structural(body)?;
                self.cache_level(rule, 1, base.clone());
                if depth == 1 {
                    base
                } else {
                    self.substitute(base, depth - 1)?
                }
            }
        };
        self.cache_level(rule, depth, expansion.clone());
        Ok(expansion)
    }

    /// Breadth expansion of a rule fragment at level `depth`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Timeout`] when the time budget is spent.
    pub fn breadth_of(&mut self, node: &RuleNode, depth: usize) -> Result<Expansion, AnalysisError> {
        let base = self.structural(node)?;
        if depth <= 1 {
            Ok(base)
        } else {
            self.substitute(base, depth - 1)
        }
    }

    fn cache_level(&mut self, rule: &str, depth: usize, expansion: Expansion) {
        self.level_cache
            .entry(CompactString::from(rule))
            .or_default()
            .insert(depth, expansion);
    }

    /// True when `path` begins with `rule`, looking past nullable rules.
    fn starts_with_rule(&self, path: &Path, rule: &str) -> bool {
        for symbol in path.symbols() {
            match symbol {
                Symbol::Rule(name) if name == rule => return true,
                Symbol::Rule(name) if self.nullable.contains(name) => {}
                Symbol::Rule(_) | Symbol::Token(_) => return false,
            }
        }
        false
    }

    fn dfs_rule(
        &mut self,
        rule: &str,
        k: usize,
        budget: usize,
        leading: bool,
    ) -> Result<PathSet, AnalysisError> {
        self.deadline.check()?;

        if leading && let Some(at) = self.left_stack.iter().position(|r| r == rule) {
            self.cuts += 1;
            let mut rules = self.left_stack[at..].to_vec();
            rules.push(rule.into());
            let cycle = RecursionCycle { rules };
            if !self.cycles.contains(&cycle) {
                log::debug!("left recursion: {cycle}");
                self.cycles.push(cycle);
            }
            return Ok(PathSet::new());
        }

        let grammar = self.grammar;
        let body = match grammar.rule(rule) {
            Some(body) if budget > 0 => body,
            _ => return Ok(self.placeholder(rule)),
        };

        let key = (CompactString::from(rule), k, budget);
        if let Some(hit) = self.depth_cache.get(&key) {
            self.stats.depth_first.hits += 1;
            return Ok(hit.clone());
        }
        self.stats.depth_first.misses += 1;

        let saved = if leading {
            self.left_stack.push(rule.into());
            None
        } else {
            Some(std::mem::replace(&mut self.left_stack, vec![rule.into()]))
        };
        let cuts_before = self.cuts;
        let result = self.dfs_node(body, k, budget, true);
        match saved {
            Some(stack) => self.left_stack = stack,
            None => {
                self.left_stack.pop();
            }
        }

        let paths = result?;
        if self.cuts == cuts_before {
            self.depth_cache.insert(key, paths.clone());
        }
        Ok(paths)
    }

    /// Stand-in for a rule that is not expanded; nullable rules may also vanish.
    fn placeholder(&self, rule: &str) -> PathSet {
        let mut paths = PathSet::from([Path::rule(rule)]);
        if self.nullable.contains(rule) {
            paths.insert(Path::empty());
        }
        paths
    }

    fn dfs_node(
        &mut self,
        node: &RuleNode,
        k: usize,
        budget: usize,
        leading: bool,
    ) -> Result<PathSet, AnalysisError> {
        match node {
            RuleNode::Consume { token } => Ok(PathSet::from([Path::token(token)])),
            RuleNode::Subrule { rule } => self.dfs_rule(rule, k, budget.saturating_sub(1), leading),
            RuleNode::Sequence { children, .. } => {
                let mut acc = PathSet::from([Path::empty()]);
                for child in children {
                    let Some(shortest) = acc.iter().map(Path::len).filter(|len| *len < k).min() else {
                        break;
                    };
                    let child_leading = leading && shortest == 0;
                    let tail = self.dfs_node(child, k - shortest, budget, child_leading)?;
                    acc = product(&acc, &tail, k);
                }
                Ok(acc)
            }
            RuleNode::OrderedChoice { branches } => {
                let mut acc = PathSet::new();
                for branch in branches {
                    acc.extend(self.dfs_node(branch, k, budget, leading)?);
                }
                Ok(acc)
            }
            RuleNode::Optional(body) => {
                let mut acc = self.dfs_node(body, k, budget, leading)?;
                acc.insert(Path::empty());
                Ok(acc)
            }
            RuleNode::ZeroOrMore(body) => {
                let mut acc = self.repetition(body, k, budget, leading)?;
                acc.insert(Path::empty());
                Ok(acc)
            }
            RuleNode::OneOrMore(body) => self.repetition(body, k, budget, leading),
        }
    }

    /// One or more iterations of `body`, closed under concatenation up to K.
    fn repetition(
        &mut self,
        body: &RuleNode,
        k: usize,
        budget: usize,
        leading: bool,
    ) -> Result<PathSet, AnalysisError> {
        let once = self.dfs_node(body, k, budget, leading)?;
        let mut acc = once.clone();
        for _ in 0..k {
            self.deadline.check()?;
            let mut next = product(&acc, &once, k);
            next.extend(acc.iter().cloned());
            if next == acc {
                break;
            }
            acc = next;
        }
        Ok(acc)
    }

    /// Level-1 expansion: rule references stay as placeholders.
    fn structural(&mut self, node: &RuleNode) -> Result<Expansion, AnalysisError> {
        self.deadline.check()?;
        let max_paths = self.config.max_paths;
        Ok(match node {
            RuleNode::Consume { token } => Expansion {
                paths: PathSet::from([Path::token(token)]),
                truncated: false,
            },
            RuleNode::Subrule { rule } => Expansion {
                paths: PathSet::from([Path::rule(rule)]),
                truncated: false,
            },
            RuleNode::Sequence { children, .. } => {
                let mut acc = Expansion {
                    paths: PathSet::from([Path::empty()]),
                    truncated: false,
                };
                for child in children {
                    let tail = self.structural(child)?;
                    acc.truncated |= tail.truncated;
                    acc.paths = product(&acc.paths, &tail.paths, usize::MAX);
                    acc.truncated |= cap(&mut acc.paths, max_paths);
                }
                acc
            }
            RuleNode::OrderedChoice { branches } => {
                let mut acc = Expansion::default();
                for branch in branches {
                    let alternative = self.structural(branch)?;
                    acc.truncated |= alternative.truncated;
                    acc.paths.extend(alternative.paths);
                    acc.truncated |= cap(&mut acc.paths, max_paths);
                }
                acc
            }
            RuleNode::Optional(body) | RuleNode::ZeroOrMore(body) => {
                let mut acc = self.structural(body)?;
                acc.paths.insert(Path::empty());
                acc.truncated |= cap(&mut acc.paths, max_paths);
                acc
            }
            RuleNode::OneOrMore(body) => self.structural(body)?,
        })
    }

    /// Replace every placeholder of `base` by that rule's expansion at `depth`.
    fn substitute(&mut self, base: Expansion, depth: usize) -> Result<Expansion, AnalysisError> {
        let max_paths = self.config.max_paths;
        let mut out = Expansion {
            paths: PathSet::new(),
            truncated: base.truncated,
        };

        for path in &base.paths {
            let mut acc = PathSet::from([Path::empty()]);
            for symbol in path.symbols() {
                let part = match symbol {
                    Symbol::Token(name) => PathSet::from([Path::token(name)]),
                    Symbol::Rule(name) => {
                        let expansion = self.expand_breadth(name, depth)?;
                        out.truncated |= expansion.truncated;
                        expansion.paths
                    }
                };
                acc = product(&acc, &part, usize::MAX);
                out.truncated |= cap(&mut acc, max_paths);
            }
            out.paths.extend(acc);
            if cap(&mut out.paths, max_paths) {
                out.truncated = true;
                break;
            }
        }
        Ok(out)
    }
}

/// Keep at most `max` paths; returns true when paths were dropped.
fn cap(paths: &mut PathSet, max: usize) -> bool {
    if paths.len() <= max {
        return false;
    }
    while paths.len() > max {
        paths.pop_last();
    }
    true
}

/// Rules that can match the empty input (fixpoint).
fn nullable_rules(grammar: &CollectedGrammar) -> HashSet<CompactString, RandomState> {
    let mut nullable: HashSet<CompactString, RandomState> = HashSet::with_hasher(RandomState::new());
    loop {
        let mut changed = false;
        for (name, body) in grammar.rules() {
            if !nullable.contains(name) && body.is_nullable(&|rule| nullable.contains(rule)) {
                nullable.insert(name.into());
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(children: Vec<RuleNode>) -> RuleNode {
        RuleNode::sequence(children)
    }

    fn tok(name: &str) -> RuleNode {
        RuleNode::consume(name)
    }

    fn sub(name: &str) -> RuleNode {
        RuleNode::subrule(name)
    }

    fn choice(branches: Vec<RuleNode>) -> RuleNode {
        RuleNode::OrderedChoice { branches }
    }

    fn rendered(paths: &PathSet) -> Vec<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    fn grammar(rules: Vec<(&str, RuleNode)>) -> CollectedGrammar {
        let mut grammar = CollectedGrammar::new(rules[0].0, Vec::new());
        for (name, body) in rules {
            grammar.insert_rule(name, body);
        }
        grammar
    }

    #[test]
    fn test_first_k_sequence_and_choice() {
        let g = grammar(vec![
            ("S", seq(vec![sub("A"), tok("c")])),
            ("A", seq(vec![choice(vec![seq(vec![tok("a")]), seq(vec![tok("b"), tok("b")])])])),
        ]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        let paths = analyzer.expand("S", 2, 4).unwrap();
        assert_eq!(rendered(&paths), ["a,c", "b,b"]);
    }

    #[test]
    fn test_first_k_optional_and_repetition() {
        let g = grammar(vec![(
            "S",
            seq(vec![
                RuleNode::Optional(Box::new(seq(vec![tok("x")]))),
                RuleNode::OneOrMore(Box::new(seq(vec![tok("y")]))),
            ]),
        )]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        let paths = analyzer.expand("S", 3, 4).unwrap();
        assert_eq!(rendered(&paths), ["x,y", "x,y,y", "y", "y,y", "y,y,y"]);
    }

    #[test]
    fn test_depth_limit_leaves_placeholder() {
        let g = grammar(vec![
            ("S", seq(vec![sub("A")])),
            ("A", seq(vec![sub("B")])),
            ("B", seq(vec![tok("b")])),
        ]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        assert_eq!(rendered(&analyzer.expand("S", 3, 2).unwrap()), ["<B>"]);
        assert_eq!(rendered(&analyzer.expand("S", 3, 3).unwrap()), ["b"]);
    }

    #[test]
    fn test_direct_left_recursion() {
        let g = grammar(vec![(
            "A",
            seq(vec![choice(vec![
                seq(vec![sub("A"), tok("+"), sub("B")]),
                seq(vec![sub("B")]),
            ])]),
        ), ("B", seq(vec![tok("b")]))]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        let cycle = analyzer.left_recursion_depth_first("A").unwrap().unwrap();
        assert_eq!(cycle.to_string(), "A -> A");
        assert!(cycle.is_direct());
        assert_eq!(analyzer.left_recursion_breadth_first("A").unwrap(), Some(true));
        assert_eq!(analyzer.left_recursion_depth_first("B").unwrap(), None);
        assert_eq!(analyzer.left_recursion_breadth_first("B").unwrap(), Some(false));
    }

    #[test]
    fn test_indirect_left_recursion_through_nullable_prefix() {
        let g = grammar(vec![
            ("A", seq(vec![sub("Opt"), sub("B"), tok("x")])),
            ("B", seq(vec![choice(vec![seq(vec![sub("A")]), seq(vec![tok("b")])])])),
            ("Opt", seq(vec![RuleNode::Optional(Box::new(seq(vec![tok("o")])))])),
        ]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        assert!(analyzer.is_nullable("Opt"));
        let cycle = analyzer.left_recursion_depth_first("A").unwrap().unwrap();
        assert_eq!(cycle.to_string(), "A -> B -> A");
        assert_eq!(analyzer.left_recursion_breadth_first("A").unwrap(), Some(true));
    }

    #[test]
    fn test_right_recursion_is_not_left_recursion() {
        let g = grammar(vec![(
            "L",
            seq(vec![tok("a"), RuleNode::Optional(Box::new(seq(vec![sub("L")])))]),
        )]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        assert_eq!(analyzer.left_recursion_depth_first("L").unwrap(), None);
        assert_eq!(analyzer.left_recursion_breadth_first("L").unwrap(), Some(false));
        assert_eq!(rendered(&analyzer.expand("L", 3, 6).unwrap()), ["a", "a,a", "a,a,a"]);
    }

    #[test]
    fn test_breadth_levels() {
        let g = grammar(vec![
            ("S", seq(vec![sub("A"), tok("s")])),
            ("A", seq(vec![choice(vec![seq(vec![tok("a")]), seq(vec![sub("B")])])])),
            ("B", seq(vec![tok("b"), RuleNode::ZeroOrMore(Box::new(seq(vec![tok("c")])))])),
        ]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        assert_eq!(rendered(&analyzer.expand_breadth("S", 1).unwrap().paths), ["<A>,s"]);
        assert_eq!(rendered(&analyzer.expand_breadth("S", 2).unwrap().paths), ["a,s", "<B>,s"]);
        assert_eq!(
            rendered(&analyzer.expand_breadth("S", 3).unwrap().paths),
            ["a,s", "b,c,s", "b,s"]
        );
        let before = analyzer.stats().breadth_first.hits;
        analyzer.expand_breadth("S", 3).unwrap();
        assert_eq!(analyzer.stats().breadth_first.hits, before + 1);
    }

    #[test]
    fn test_breadth_cap_marks_truncated() {
        let many = choice((0..10).map(|i| seq(vec![tok(&format!("t{i}"))])).collect());
        let g = grammar(vec![("S", seq(vec![many.clone(), many]))]);
        let config = AnalyzerConfig::default().with_max_paths(16);
        let mut analyzer = GrammarAnalyzer::new(&g, config);
        let expansion = analyzer.expand_breadth("S", 1).unwrap();
        assert!(expansion.truncated);
        assert_eq!(expansion.paths.len(), 16);
    }

    #[test]
    fn test_depth_first_cache_hits() {
        let g = grammar(vec![
            ("S", seq(vec![sub("T"), sub("T")])),
            ("T", seq(vec![tok("t")])),
        ]);
        let mut analyzer = GrammarAnalyzer::new(&g, AnalyzerConfig::default());
        let first = analyzer.expand("S", 3, 4).unwrap();
        assert_eq!(analyzer.stats().depth_first.hits, 0);
        assert_eq!(analyzer.expand("S", 3, 4).unwrap(), first);
        assert_eq!(analyzer.stats().depth_first.hits, 1);
        assert_eq!(analyzer.stats().depth_first.entries, 3);
    }

    #[test]
    fn test_timeout() {
        let g = grammar(vec![("S", seq(vec![tok("a")]))]);
        let config = AnalyzerConfig::default().with_timeout(Duration::ZERO);
        let mut analyzer = GrammarAnalyzer::new(&g, config);
        let mut result = Ok(PathSet::new());
        for _ in 0..512 {
            analyzer.depth_cache.clear();
            result = analyzer.expand("S", 3, 4);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(AnalysisError::Timeout { .. })));
    }
}
