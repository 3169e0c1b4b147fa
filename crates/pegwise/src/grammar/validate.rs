//! Validation pipeline and its findings.

use super::analyzer::{AnalysisError, CacheStats, GrammarAnalyzer, RecursionCycle};
use super::collector::RuleRecorder;
use super::config::AnalyzerConfig;
use super::conflict::ConflictDetector;
use super::path::Path;
use super::rule::{CollectedGrammar, RuleNode};
use crate::parser::Grammar;
use compact_str::CompactString;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Deref;
use std::time::{Duration, Instant};
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FindingKind {
    LeftRecursion,
    IdenticalBranches,
    PrefixConflict,
    EmptyPath,
    UndefinedToken,
    AnalyzerDisagreement,
    TooComplex,
}

impl FindingKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeftRecursion => "left-recursion",
            Self::IdenticalBranches => "or-identical-branches",
            Self::PrefixConflict => "prefix-conflict",
            Self::EmptyPath => "empty-path",
            Self::UndefinedToken => "undefined-token",
            Self::AnalyzerDisagreement => "analyzer-disagreement",
            Self::TooComplex => "too-complex",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found in a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub rule: CompactString,
    /// Pre-order index of the ordered choice inside the rule.
    pub choice: Option<usize>,
    /// Branch indices inside that choice, earlier first.
    pub branches: SmallVec<[usize; 2]>,
    /// Example paths; for a prefix conflict the shared prefix comes last.
    pub paths: Vec<Path>,
    pub message: String,
    pub suggestion: Option<String>,
}

impl Finding {
    #[must_use]
    pub fn new(severity: Severity, kind: FindingKind, rule: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            rule: rule.into(),
            choice: None,
            branches: SmallVec::new(),
            paths: Vec::new(),
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn in_choice(mut self, choice: usize, branches: &[usize]) -> Self {
        self.choice = Some(choice);
        self.branches = branches.iter().copied().collect();
        self
    }

    #[must_use]
    pub fn with_paths(mut self, paths: Vec<Path>) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    fn dedup_key(&self) -> (FindingKind, &str, Option<usize>, &[usize]) {
        (self.kind, self.rule.as_str(), self.choice, self.branches.as_slice())
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} in `{}`", self.severity, self.kind, self.rule)?;
        if let Some(choice) = self.choice {
            write!(f, " (choice {choice}")?;
            match self.branches.as_slice() {
                [] => {}
                [one] => write!(f, ", branch {one}")?,
                [first, second, ..] => write!(f, ", branches {first} and {second}")?,
            }
            f.write_str(")")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  help: {suggestion}")?;
        }
        Ok(())
    }
}

/// Findings listed one per line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Findings(pub Vec<Finding>);

impl Deref for Findings {
    type Target = [Finding];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Findings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, finding) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{finding}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationStats {
    pub rules: usize,
    pub choices: usize,
    pub tokens: usize,
    pub nullable_rules: usize,
    pub depth_first: CacheStats,
    pub breadth_first: CacheStats,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("grammar `{entry}` failed validation with {count} finding(s):\n{findings}")]
#[cfg_attr(
    feature = "diagnostics",
    diagnostic(
        code(grammar::validation),
        help("fix FATAL findings first; later findings may depend on them")
    )
)]
pub struct ValidationError {
    pub entry: CompactString,
    pub count: usize,
    pub findings: Findings,
    pub stats: ValidationStats,
}

impl ValidationError {
    /// Findings of the given kind.
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |finding| finding.kind == kind)
    }

    #[must_use]
    pub fn has_fatal(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Fatal)
    }
}

/// Summary of a grammar that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub entry: CompactString,
    pub stats: ValidationStats,
}

/// Runs the undefined-token, left-recursion and conflict checks.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: AnalyzerConfig,
}

impl Validator {
    #[must_use]
    pub const fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Record grammar `G` and validate it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when any finding is reported.
    pub fn validate<G: Grammar>(&self) -> Result<ValidationReport, ValidationError> {
        let grammar = RuleRecorder::collect(G::ENTRY, G::entry::<RuleRecorder>, G::token_definitions());
        self.validate_collected(&grammar)
    }

    /// Validate an already collected grammar.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when any finding is reported.
    pub fn validate_collected(
        &self,
        grammar: &CollectedGrammar,
    ) -> Result<ValidationReport, ValidationError> {
        let started = Instant::now();
        let mut analyzer = GrammarAnalyzer::new(grammar, self.config.clone());
        let mut findings = undefined_tokens(grammar);

        match analyze(grammar, &mut analyzer) {
            Ok(mut more) => findings.append(&mut more),
            Err(AnalysisError::Timeout { elapsed, limit }) => findings.push(
                Finding::new(
                    Severity::Fatal,
                    FindingKind::TooComplex,
                    &grammar.entry,
                    format!("grammar too complex to validate in bounded time ({elapsed:?} > {limit:?})"),
                )
                .with_suggestion("raise the analyzer timeout or lower `max_depth`/`first_k`"),
            ),
        }

        let analyzer_stats = analyzer.stats();
        let stats = ValidationStats {
            rules: grammar.rule_count(),
            choices: grammar.rules().map(|(_, body)| body.choices().len()).sum(),
            tokens: grammar.tokens().len(),
            nullable_rules: analyzer_stats.nullable_rules,
            depth_first: analyzer_stats.depth_first,
            breadth_first: analyzer_stats.breadth_first,
            elapsed: started.elapsed(),
        };

        let findings = dedup(findings);
        if findings.is_empty() {
            return Ok(ValidationReport {
                entry: grammar.entry.clone(),
                stats,
            });
        }
        for finding in &findings {
            log::debug!("{finding}");
        }
        Err(ValidationError {
            entry: grammar.entry.clone(),
            count: findings.len(),
            findings: Findings(findings),
            stats,
        })
    }
}

fn analyze(
    grammar: &CollectedGrammar,
    analyzer: &mut GrammarAnalyzer<'_>,
) -> Result<Vec<Finding>, AnalysisError> {
    let (mut findings, cycles) = left_recursion(grammar, analyzer)?;
    if findings.iter().any(|f| f.kind == FindingKind::AnalyzerDisagreement) {
        return Ok(findings);
    }
    let recursive = cycles.into_iter().flat_map(|cycle| cycle.rules);
    let conflicts = ConflictDetector::new(analyzer)
        .skipping_recursive(recursive)
        .detect(grammar)?;
    findings.extend(conflicts);
    Ok(findings)
}

/// Both strategies must agree on every rule; a disagreement aborts the pass.
fn left_recursion(
    grammar: &CollectedGrammar,
    analyzer: &mut GrammarAnalyzer<'_>,
) -> Result<(Vec<Finding>, Vec<RecursionCycle>), AnalysisError> {
    let mut findings = Vec::new();
    let mut cycles = Vec::new();
    for (name, _) in grammar.rules() {
        let depth_first = analyzer.left_recursion_depth_first(name)?;
        let breadth_first = analyzer.left_recursion_breadth_first(name)?;

        if let Some(breadth_first) = breadth_first
            && breadth_first != depth_first.is_some()
        {
            let finding = Finding::new(
                Severity::Fatal,
                FindingKind::AnalyzerDisagreement,
                name,
                format!(
                    "internal error: depth-first expansion says left-recursive = {}, breadth-first says {breadth_first}",
                    depth_first.is_some()
                ),
            );
            return Ok((vec![finding], Vec::new()));
        }

        if let Some(cycle) = depth_first {
            let suggestion = if cycle.is_direct() {
                format!("rewrite as `{name} := <base> {{<operator> <base>}}`")
            } else {
                format!("make one rule of `{cycle}` consume a token before the recursive reference")
            };
            findings.push(
                Finding::new(
                    Severity::Fatal,
                    FindingKind::LeftRecursion,
                    name,
                    format!("rule `{name}` can re-enter itself without consuming input: {cycle}"),
                )
                .with_suggestion(suggestion),
            );
            cycles.push(cycle);
        }
    }
    Ok((findings, cycles))
}

fn undefined_tokens(grammar: &CollectedGrammar) -> Vec<Finding> {
    if grammar.tokens().is_empty() {
        return Vec::new();
    }
    let mut findings = Vec::new();
    for (name, body) in grammar.rules() {
        body.walk(&mut |node| {
            if let RuleNode::Consume { token } = node
                && !grammar.has_token(token)
            {
                findings.push(
                    Finding::new(
                        Severity::Error,
                        FindingKind::UndefinedToken,
                        name,
                        format!("token `{token}` has no definition"),
                    )
                    .with_paths(vec![Path::token(token)]),
                );
            }
        });
    }
    findings
}

fn dedup(findings: Vec<Finding>) -> Vec<Finding> {
    let mut out: Vec<Finding> = Vec::with_capacity(findings.len());
    for finding in findings {
        if !out.iter().any(|seen| seen.dedup_key() == finding.dedup_key() && seen.paths == finding.paths) {
            out.push(finding);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenDefinition;
    use crate::parser::{Combinators, Parsed};

    fn tokens() -> Vec<TokenDefinition> {
        vec![
            TokenDefinition::literal("Plus", "+"),
            TokenDefinition::regex("Number", "[0-9]+"),
        ]
    }

    fn sum<P: Combinators>(p: &mut P) -> Parsed {
        p.consume("Number")?;
        p.many(|p| {
            p.consume("Plus")?;
            p.consume("Number")
        })
    }

    fn typo<P: Combinators>(p: &mut P) -> Parsed {
        p.consume("Number")?;
        p.consume("Plsu")
    }

    fn left<P: Combinators>(p: &mut P) -> Parsed {
        p.or(&[
            &|p| {
                p.subrule("Left", left)?;
                p.consume("Plus")?;
                p.consume("Number")
            },
            &|p| p.consume("Number"),
        ])
    }

    #[test]
    fn test_clean_grammar_passes() {
        let grammar = RuleRecorder::collect("Sum", sum, tokens());
        let report = Validator::default().validate_collected(&grammar).unwrap();
        assert_eq!(report.entry, "Sum");
        assert_eq!(report.stats.rules, 1);
        assert_eq!(report.stats.tokens, 2);
    }

    #[test]
    fn test_undefined_token() {
        let grammar = RuleRecorder::collect("Typo", typo, tokens());
        let error = Validator::default().validate_collected(&grammar).unwrap_err();
        let finding = error.of_kind(FindingKind::UndefinedToken).next().unwrap();
        assert_eq!(finding.severity, Severity::Error);
        assert!(finding.message.contains("`Plsu`"));
        assert!(!error.has_fatal());
    }

    #[test]
    fn test_left_recursion_is_fatal() {
        let grammar = RuleRecorder::collect("Left", left, tokens());
        let error = Validator::default().validate_collected(&grammar).unwrap_err();
        assert!(error.has_fatal());
        let finding = error.of_kind(FindingKind::LeftRecursion).next().unwrap();
        assert_eq!(finding.rule, "Left");
        assert!(error.to_string().contains("FATAL left-recursion in `Left`"));
    }

    #[test]
    fn test_finding_display() {
        let finding = Finding::new(Severity::Error, FindingKind::PrefixConflict, "Stmt", "shadowed")
            .in_choice(0, &[0, 1])
            .with_suggestion("reorder");
        assert_eq!(
            finding.to_string(),
            "ERROR prefix-conflict in `Stmt` (choice 0, branches 0 and 1): shadowed\n  help: reorder"
        );
    }

    #[test]
    fn test_dedup() {
        let finding = Finding::new(Severity::Error, FindingKind::EmptyPath, "A", "empty").in_choice(0, &[0]);
        assert_eq!(dedup(vec![finding.clone(), finding]).len(), 1);
    }
}
