//! Static grammar validation tests
//!
//! Grammars here are recorded from their rule functions and checked for
//! left recursion and ordered-choice conflicts without parsing any input.

use pegwise::grammar::{
    AnalyzerConfig, FindingKind, GrammarAnalyzer, RuleRecorder, Severity, ValidationError,
    Validator,
};
use pegwise::parser::{Combinators, Grammar, Parsed, Parser, ParserOptions, RuleFn};
use pegwise::TokenDefinition;
use std::time::Duration;

fn tokens() -> Vec<TokenDefinition> {
    vec![
        TokenDefinition::regex("Whitespace", r"\s+").skipped(),
        TokenDefinition::regex("Number", "[0-9]+"),
        TokenDefinition::literal("a", "a"),
        TokenDefinition::literal("b", "b"),
        TokenDefinition::literal("c", "c"),
        TokenDefinition::literal("d", "d"),
        TokenDefinition::literal("e", "e"),
        TokenDefinition::literal("Plus", "+"),
        TokenDefinition::literal("Semicolon", ";"),
    ]
}

fn validate(entry: &'static str, rule: RuleFn<RuleRecorder>) -> Result<(), ValidationError> {
    let grammar = RuleRecorder::collect(entry, rule, tokens());
    Validator::default().validate_collected(&grammar).map(|_| ())
}

/// `A := A '+' B | B`
fn a<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[
        &|p| {
            p.subrule("A", a)?;
            p.consume("Plus")?;
            p.subrule("B", b)
        },
        &|p| p.subrule("B", b),
    ])
}

fn b<P: Combinators>(p: &mut P) -> Parsed {
    p.consume("Number")
}

#[test]
fn test_left_recursion_names_rule() {
    let error = validate("A", a).unwrap_err();
    let findings: Vec<_> = error.of_kind(FindingKind::LeftRecursion).collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule, "A");
    assert_eq!(findings[0].severity, Severity::Fatal);
    assert!(findings[0].suggestion.is_some());
    assert!(error.of_kind(FindingKind::AnalyzerDisagreement).next().is_none());
}

fn expr<P: Combinators>(p: &mut P) -> Parsed {
    p.subrule("Term", term)?;
    p.consume("Plus")
}

fn term<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[&|p| p.subrule("Expr", expr), &|p| p.consume("Number")])
}

#[test]
fn test_indirect_left_recursion() {
    let error = validate("Expr", expr).unwrap_err();
    let rules: Vec<_> = error
        .of_kind(FindingKind::LeftRecursion)
        .map(|f| f.rule.to_string())
        .collect();
    assert_eq!(rules, ["Expr", "Term"]);
    assert!(error.findings[0].message.contains("Expr -> Term -> Expr"));
}

/// `S := X | Y` with `X := a b` and `Y := a b c`
fn shadowed<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[&|p| p.subrule("X", x), &|p| p.subrule("Y", y)])
}

fn x<P: Combinators>(p: &mut P) -> Parsed {
    p.consume("a")?;
    p.consume("b")
}

fn y<P: Combinators>(p: &mut P) -> Parsed {
    p.consume("a")?;
    p.consume("b")?;
    p.consume("c")
}

#[test]
fn test_prefix_conflict_reports_shared_prefix() {
    let error = validate("S", shadowed).unwrap_err();
    assert_eq!(error.count, 1);
    let finding = &error.findings[0];
    assert_eq!(finding.kind, FindingKind::PrefixConflict);
    assert_eq!(finding.severity, Severity::Error);
    assert_eq!(finding.rule, "S");
    assert_eq!(finding.branches.as_slice(), [0, 1]);

    let paths: Vec<_> = finding.paths.iter().map(ToString::to_string).collect();
    assert_eq!(paths, ["a,b", "a,b,c", "a,b"]);
    assert!(finding.message.contains("shared prefix `a,b`"));
    assert!(finding.suggestion.as_deref().unwrap().contains("move branch 1 before branch 0"));
}

fn reordered<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[&|p| p.subrule("Y", y), &|p| p.subrule("X", x)])
}

#[test]
fn test_longer_branch_first_passes() {
    validate("S", reordered).unwrap();
}

fn duplicated<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[
        &|p| {
            p.consume("a")?;
            p.consume("b")
        },
        &|p| p.consume("c"),
        &|p| {
            p.consume("a")?;
            p.consume("b")
        },
    ])
}

#[test]
fn test_identical_branches_flag_later_branch() {
    let error = validate("Dup", duplicated).unwrap_err();
    let finding = error.of_kind(FindingKind::IdenticalBranches).next().unwrap();
    assert_eq!(finding.severity, Severity::Fatal);
    assert_eq!(finding.branches.as_slice(), [0, 2]);
    assert!(finding.message.contains("branch 2 is unreachable"));
    assert!(error.has_fatal());
}

/// `S := a b c d | a b c e`
fn same_lookahead<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[
        &|p| {
            p.consume("a")?;
            p.consume("b")?;
            p.consume("c")?;
            p.consume("d")
        },
        &|p| {
            p.consume("a")?;
            p.consume("b")?;
            p.consume("c")?;
            p.consume("e")
        },
    ])
}

#[test]
fn test_equal_first_k_sets_are_identical_branches() {
    let error = validate("S", same_lookahead).unwrap_err();
    assert_eq!(error.count, 1);
    let finding = &error.findings[0];
    assert_eq!(finding.kind, FindingKind::IdenticalBranches);
    assert_eq!(finding.severity, Severity::Fatal);
    assert_eq!(finding.branches.as_slice(), [0, 1]);
    assert_eq!(finding.paths[0].to_string(), "a,b,c");
}

#[test]
fn test_larger_k_tells_branches_apart() {
    let grammar = RuleRecorder::collect("S", same_lookahead, tokens());
    let config = AnalyzerConfig::default().with_first_k(4);
    Validator::new(config).validate_collected(&grammar).unwrap();
}

#[test]
fn test_zero_first_k_still_compares_tokens() {
    fn a_or_b<P: Combinators>(p: &mut P) -> Parsed {
        p.or(&[&|p| p.consume("a"), &|p| p.consume("b")])
    }

    let grammar = RuleRecorder::collect("AB", a_or_b, tokens());
    let config = AnalyzerConfig {
        first_k: 0,
        ..AnalyzerConfig::default()
    };
    Validator::new(config).validate_collected(&grammar).unwrap();
}

/// A left-recursive rule next to an unrelated prefix conflict.
fn recursive_and_shadowed<P: Combinators>(p: &mut P) -> Parsed {
    p.subrule("S", shadowed)?;
    p.consume("Semicolon")?;
    p.subrule("A", a)
}

#[test]
fn test_left_recursion_does_not_hide_other_conflicts() {
    let error = validate("Program", recursive_and_shadowed).unwrap_err();
    let recursive: Vec<_> = error.of_kind(FindingKind::LeftRecursion).collect();
    assert_eq!(recursive.len(), 1);
    assert_eq!(recursive[0].rule, "A");

    let conflicts: Vec<_> = error.of_kind(FindingKind::PrefixConflict).collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].rule, "S");
    assert_eq!(error.count, 2);
}

fn empty_first<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[&|p| p.option(|p| p.consume("a")), &|p| p.consume("b")])
}

#[test]
fn test_empty_path_branch() {
    let error = validate("Empty", empty_first).unwrap_err();
    let finding = error.of_kind(FindingKind::EmptyPath).next().unwrap();
    assert_eq!(finding.branches.as_slice(), [0]);
    assert_eq!(finding.severity, Severity::Error);
}

fn typo<P: Combinators>(p: &mut P) -> Parsed {
    p.consume("Number")?;
    p.consume("Semicolonn")
}

#[test]
fn test_undefined_token() {
    let error = validate("Typo", typo).unwrap_err();
    let finding = error.of_kind(FindingKind::UndefinedToken).next().unwrap();
    assert_eq!(finding.rule, "Typo");
    assert!(finding.message.contains("Semicolonn"));
}

struct Statements;

impl Grammar for Statements {
    const ENTRY: &'static str = "Statements";

    fn token_definitions() -> Vec<TokenDefinition> {
        tokens()
    }

    fn entry<P: Combinators>(p: &mut P) -> Parsed {
        p.many(|p| p.subrule("Statement", statement))
    }
}

fn statement<P: Combinators>(p: &mut P) -> Parsed {
    p.consume("Number")?;
    p.many(|p| {
        p.consume("Plus")?;
        p.consume("Number")
    })?;
    p.consume("Semicolon")
}

#[test]
fn test_clean_grammar_validates_then_parses() {
    let mut parser = Parser::for_grammar::<Statements>("1 + 2; 3;").unwrap();
    let output = parser
        .validate_grammar::<Statements>()
        .unwrap()
        .parse::<Statements>()
        .unwrap();
    assert_eq!(output.root.child_names(), ["Statement", "Statement"]);
}

#[test]
fn test_validation_does_not_disturb_parser() {
    let mut parser = Parser::new("1;", ParserOptions::new(tokens())).unwrap();
    let before = parser.parse_rule("Statement", statement).unwrap();
    assert!(parser.validate("A", a).is_err());
    let after = parser.parse_rule("Statement", statement).unwrap();
    assert_eq!(before.root, after.root);
}

#[test]
fn test_validator_for_grammar_type() {
    let report = Validator::default().validate::<Statements>().unwrap();
    assert_eq!(report.entry, "Statements");
    assert_eq!(report.stats.rules, 2);
    assert_eq!(report.stats.choices, 0);
}

#[test]
fn test_findings_are_aggregated() {
    fn both<P: Combinators>(p: &mut P) -> Parsed {
        p.subrule("Dup", duplicated)?;
        p.subrule("Empty", empty_first)
    }

    let error = validate("Both", both).unwrap_err();
    assert!(error.of_kind(FindingKind::IdenticalBranches).next().is_some());
    assert!(error.of_kind(FindingKind::EmptyPath).next().is_some());
    assert_eq!(error.count, error.findings.len());

    let rendered = error.to_string();
    assert!(rendered.starts_with("grammar `Both` failed validation"));
    assert!(rendered.contains("FATAL or-identical-branches in `Dup`"));
    assert!(rendered.contains("ERROR empty-path in `Empty`"));
}

#[test]
fn test_timeout_reports_too_complex() {
    let grammar = RuleRecorder::collect("A", a, tokens());
    let config = AnalyzerConfig::default().with_timeout(Duration::ZERO);
    let mut attempts = 0;
    let error = loop {
        attempts += 1;
        match Validator::new(config.clone()).validate_collected(&grammar) {
            Err(error) if error.of_kind(FindingKind::TooComplex).next().is_some() => break error,
            _ if attempts < 50 => {}
            other => panic!("expected a timeout, got {other:?}"),
        }
    };
    assert!(error.has_fatal());
}

#[test]
fn test_first_k_expansion_of_recorded_grammar() {
    let grammar = RuleRecorder::collect("S", shadowed, tokens());
    let mut analyzer = GrammarAnalyzer::new(&grammar, AnalyzerConfig::default());
    let paths: Vec<_> = analyzer
        .expand("S", 2, 4)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(paths, ["a,b"]);
}
