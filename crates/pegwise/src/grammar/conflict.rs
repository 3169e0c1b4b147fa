//! Ordered-choice conflict detection.
//!
//! Every pair of branches `i < j` of every ordered choice is checked:
//!
//! - **identical**: branch `i` fully matches something branch `j` would
//!   match, or both share the same First-K set, so `j` never gets a chance
//!   (FATAL);
//! - **prefix**: a path of `i` is a strict prefix of a path of `j`, so the
//!   choice commits to `i` before `j`'s longer match is tried (ERROR);
//! - **empty path**: a branch other than the last can match nothing, which
//!   shadows every later branch (ERROR).
//!
//! Lookahead guards (`not_followed_by`, `no_line_break`) are not recorded,
//! so a branch protected by one may still be reported.
//!
//! Expansions through a left-recursive rule are cut at the recursion, so
//! choices that can reach such a rule are skipped; see
//! [`ConflictDetector::skipping_recursive`].

use super::analyzer::{AnalysisError, GrammarAnalyzer};
use super::path::{Path, PathSet};
use super::rule::{CollectedGrammar, RuleNode};
use super::validate::{Finding, FindingKind, Severity};
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashSet;

type RuleSet = HashSet<CompactString, RandomState>;

pub struct ConflictDetector<'a, 'g> {
    analyzer: &'a mut GrammarAnalyzer<'g>,
    recursive: RuleSet,
}

impl<'a, 'g> ConflictDetector<'a, 'g> {
    pub fn new(analyzer: &'a mut GrammarAnalyzer<'g>) -> Self {
        Self {
            analyzer,
            recursive: RuleSet::with_hasher(RandomState::new()),
        }
    }

    /// Do not check choices from which one of `rules` is reachable.
    #[must_use]
    pub fn skipping_recursive(mut self, rules: impl IntoIterator<Item = CompactString>) -> Self {
        self.recursive.extend(rules);
        self
    }

    /// Check every ordered choice of every rule.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Timeout`] when the time budget is spent.
    pub fn detect(&mut self, grammar: &CollectedGrammar) -> Result<Vec<Finding>, AnalysisError> {
        let reaching = reaching(grammar, &self.recursive);
        let mut findings = Vec::new();
        for (name, body) in grammar.rules() {
            for (index, branches) in body.choices().into_iter().enumerate() {
                if branches.iter().any(|branch| references_any(branch, &reaching)) {
                    log::debug!("skipping choice {index} of `{name}`: it reaches a left-recursive rule");
                    continue;
                }
                self.check_choice(name, index, branches, &mut findings)?;
            }
        }
        Ok(findings)
    }

    fn check_choice(
        &mut self,
        rule: &str,
        choice: usize,
        branches: &[RuleNode],
        findings: &mut Vec<Finding>,
    ) -> Result<(), AnalysisError> {
        if branches.len() < 2 {
            return Ok(());
        }
        let first_k = self.analyzer.config().first_k;
        let depth = self.analyzer.config().max_depth;

        for (i, branch) in branches[..branches.len() - 1].iter().enumerate() {
            if branch.is_nullable(&|name| self.analyzer.is_nullable(name)) {
                findings.push(
                    Finding::new(
                        Severity::Error,
                        FindingKind::EmptyPath,
                        rule,
                        format!("branch {i} can match empty input, so no later branch is ever tried"),
                    )
                    .in_choice(choice, &[i])
                    .with_paths(vec![Path::empty()])
                    .with_suggestion("move the branch last or make it consume at least one token"),
                );
            }
        }

        let mut first = Vec::with_capacity(branches.len());
        let mut breadth = Vec::with_capacity(branches.len());
        for branch in branches {
            first.push(self.analyzer.first_k_of(branch)?);
            breadth.push(self.analyzer.breadth_of(branch, depth)?);
        }

        for i in 0..branches.len() {
            for j in i + 1..branches.len() {
                if let Some(shadow) = identical(&first[i], &first[j], first_k) {
                    let (path, message) = match shadow {
                        Shadow::Complete(path) => {
                            let message = format!("branch {j} is unreachable: branch {i} already matches `{path}`");
                            (path, message)
                        }
                        Shadow::SameLookahead(path) => {
                            let message = format!(
                                "branch {j} is unreachable: branches {i} and {j} have the same first {first_k} tokens (`{path}`)"
                            );
                            (path, message)
                        }
                    };
                    findings.push(
                        Finding::new(Severity::Fatal, FindingKind::IdenticalBranches, rule, message)
                        .in_choice(choice, &[i, j])
                        .with_paths(vec![path])
                        .with_suggestion(format!("remove branch {j} or merge it into branch {i}")),
                    );
                    continue;
                }

                if let Some((shorter, longer)) = prefix_shadow(&breadth[i].paths, &breadth[j].paths) {
                    findings.push(
                        Finding::new(
                            Severity::Error,
                            FindingKind::PrefixConflict,
                            rule,
                            format!(
                                "branch {i} matches `{shorter}` and commits before branch {j} can match `{longer}` (shared prefix `{shorter}`)"
                            ),
                        )
                        .in_choice(choice, &[i, j])
                        .with_paths(vec![shorter.clone(), longer.clone(), shorter.clone()])
                        .with_suggestion(format!(
                            "move branch {j} before branch {i}, factor the common prefix `{shorter}` out of both, or guard branch {i} with a lookahead"
                        )),
                    );
                }
            }
        }
        Ok(())
    }
}

/// Why branch `j` can never be chosen over branch `i`.
enum Shadow {
    /// A complete match of branch `i`, shorter than K, is also one of `j`.
    Complete(Path),
    /// Both branches have the same First-K set; carries one of its paths.
    SameLookahead(Path),
}

fn identical(first_i: &PathSet, first_j: &PathSet, k: usize) -> Option<Shadow> {
    if let Some(shared) = first_i
        .iter()
        .find(|path| path.len() < k && !path.has_rules() && first_j.contains(*path))
    {
        return Some(Shadow::Complete(shared.clone()));
    }
    if first_i.is_empty() || first_i != first_j {
        return None;
    }
    first_i.first().cloned().map(Shadow::SameLookahead)
}

/// Rules from which one of `targets` is reachable, `targets` included.
fn reaching(grammar: &CollectedGrammar, targets: &RuleSet) -> RuleSet {
    let mut found = targets.clone();
    if found.is_empty() {
        return found;
    }
    loop {
        let before = found.len();
        for (name, body) in grammar.rules() {
            if !found.contains(name) && references_any(body, &found) {
                found.insert(name.into());
            }
        }
        if found.len() == before {
            return found;
        }
    }
}

fn references_any(node: &RuleNode, rules: &RuleSet) -> bool {
    if rules.is_empty() {
        return false;
    }
    let mut found = false;
    node.walk(&mut |node| {
        if let RuleNode::Subrule { rule } = node {
            found |= rules.contains(rule.as_str());
        }
    });
    found
}

/// First non-empty path of `earlier` that is a strict prefix of a path of `later`.
fn prefix_shadow<'p>(earlier: &'p PathSet, later: &'p PathSet) -> Option<(&'p Path, &'p Path)> {
    earlier.iter().filter(|path| !path.is_empty()).find_map(|shorter| {
        later
            .iter()
            .find(|longer| shorter.is_strict_prefix_of(longer))
            .map(|longer| (shorter, longer))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::AnalyzerConfig;

    fn seq(children: Vec<RuleNode>) -> RuleNode {
        RuleNode::sequence(children)
    }

    fn tok(name: &str) -> RuleNode {
        RuleNode::consume(name)
    }

    fn toks(names: &[&str]) -> RuleNode {
        seq(names.iter().map(|name| tok(name)).collect())
    }

    fn detect(rules: Vec<(&str, RuleNode)>) -> Vec<Finding> {
        let mut grammar = CollectedGrammar::new(rules[0].0, Vec::new());
        for (name, body) in rules {
            grammar.insert_rule(name, body);
        }
        let mut analyzer = GrammarAnalyzer::new(&grammar, AnalyzerConfig::default());
        ConflictDetector::new(&mut analyzer).detect(&grammar).unwrap()
    }

    fn choice(branches: Vec<RuleNode>) -> RuleNode {
        seq(vec![RuleNode::OrderedChoice { branches }])
    }

    #[test]
    fn test_prefix_conflict_through_subrules() {
        let findings = detect(vec![
            (
                "S",
                choice(vec![
                    seq(vec![RuleNode::subrule("X")]),
                    seq(vec![RuleNode::subrule("Y")]),
                ]),
            ),
            ("X", toks(&["a", "b"])),
            ("Y", toks(&["a", "b", "c"])),
        ]);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.kind, FindingKind::PrefixConflict);
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.choice, Some(0));
        assert_eq!(finding.branches.as_slice(), [0, 1]);
        assert_eq!(finding.paths.last().map(ToString::to_string).as_deref(), Some("a,b"));
    }

    #[test]
    fn test_longer_branch_first_is_fine() {
        let findings = detect(vec![(
            "S",
            choice(vec![toks(&["a", "b", "c"]), toks(&["a", "b"])]),
        )]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_identical_branches() {
        let findings = detect(vec![("S", choice(vec![toks(&["a", "b"]), toks(&["a", "b"])]))]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::IdenticalBranches);
        assert_eq!(findings[0].severity, Severity::Fatal);
        assert!(findings[0].message.contains("branch 1 is unreachable"));
    }

    #[test]
    fn test_equal_first_k_is_identical() {
        let findings = detect(vec![(
            "S",
            choice(vec![toks(&["a", "b", "c", "d"]), toks(&["a", "b", "c", "e"])]),
        )]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::IdenticalBranches);
        assert_eq!(findings[0].severity, Severity::Fatal);
        assert!(findings[0].message.contains("same first 3 tokens (`a,b,c`)"));
    }

    #[test]
    fn test_first_k_differs_past_shared_prefix() {
        let findings = detect(vec![(
            "S",
            choice(vec![toks(&["a", "b", "d"]), toks(&["a", "b", "e"])]),
        )]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_long_identical_branches() {
        let findings = detect(vec![(
            "S",
            choice(vec![toks(&["a", "b", "c", "d"]), toks(&["a", "b", "c", "d"])]),
        )]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::IdenticalBranches);
    }

    #[test]
    fn test_choices_reaching_recursive_rules_are_skipped() {
        let rules = vec![
            (
                "S",
                choice(vec![
                    seq(vec![RuleNode::subrule("T")]),
                    seq(vec![RuleNode::subrule("T")]),
                ]),
            ),
            ("T", seq(vec![RuleNode::subrule("A"), tok("x")])),
            ("A", seq(vec![RuleNode::subrule("A"), tok("y")])),
            ("U", choice(vec![toks(&["a"]), toks(&["a", "b"])])),
        ];
        let mut grammar = CollectedGrammar::new("S", Vec::new());
        for (name, body) in rules {
            grammar.insert_rule(name, body);
        }
        let mut analyzer = GrammarAnalyzer::new(&grammar, AnalyzerConfig::default());
        let findings = ConflictDetector::new(&mut analyzer)
            .skipping_recursive([CompactString::new("A")])
            .detect(&grammar)
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "U");
        assert_eq!(findings[0].kind, FindingKind::PrefixConflict);
    }

    #[test]
    fn test_empty_path() {
        let findings = detect(vec![(
            "S",
            choice(vec![
                seq(vec![RuleNode::Optional(Box::new(toks(&["a"])))]),
                toks(&["b"]),
            ]),
        )]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::EmptyPath);
        assert_eq!(findings[0].branches.as_slice(), [0]);
    }

    #[test]
    fn test_nullable_last_branch_is_fine() {
        let findings = detect(vec![(
            "S",
            choice(vec![toks(&["b"]), seq(vec![RuleNode::Optional(Box::new(toks(&["a"])))])]),
        )]);
        assert!(findings.is_empty());
    }
}
