//! Statement list parser example
//!
//! This example demonstrates how to:
//! 1. Declare token definitions, including a keyword and a lexical goal
//! 2. Write rules once and use them for both validation and parsing
//! 3. Read the concrete syntax tree
//! 4. Report syntax errors with source context
//! 5. Recover from errors at statement boundaries

use pegwise::error::diagnostics::format_error_with_context;
use pegwise::grammar::Validator;
use pegwise::lexer::LexicalGoal;
use pegwise::parser::{Combinators, Grammar, Parsed, Parser, ParserConfig};
use pegwise::TokenDefinition;

const REGEXP: LexicalGoal = LexicalGoal("RegExp");

struct Statements;

impl Grammar for Statements {
    const ENTRY: &'static str = "Program";

    fn token_definitions() -> Vec<TokenDefinition> {
        vec![
            TokenDefinition::regex("Whitespace", r"[ \t\r\n]+").skipped(),
            TokenDefinition::regex("Comment", r"//[^\n]*").skipped(),
            TokenDefinition::keyword("Let", "let"),
            TokenDefinition::regex("Identifier", r"[A-Za-z_][A-Za-z0-9_]*"),
            TokenDefinition::regex("Number", r"[0-9]+"),
            TokenDefinition::regex("RegularExpression", r"/[^/\n]+/[a-z]*").in_goals(&[REGEXP]),
            TokenDefinition::literal("Slash", "/").in_goals(&[LexicalGoal::DEFAULT]),
            TokenDefinition::literal("Eq", "="),
            TokenDefinition::literal("Plus", "+"),
            TokenDefinition::literal("Semicolon", ";"),
        ]
    }

    fn entry<P: Combinators>(p: &mut P) -> Parsed {
        p.many(|p| p.subrule("Statement", statement))
    }
}

/// `Statement := let Identifier = Expr ;`
fn statement<P: Combinators>(p: &mut P) -> Parsed {
    p.consume("Let")?;
    p.consume("Identifier")?;
    p.consume("Eq")?;
    p.subrule("Expr", expr)?;
    p.consume("Semicolon")
}

/// `Expr := Operand {(+ | /) Operand}`
fn expr<P: Combinators>(p: &mut P) -> Parsed {
    p.subrule("Operand", operand)?;
    p.many(|p| {
        p.or(&[&|p| p.consume("Plus"), &|p| p.consume("Slash")])?;
        p.subrule("Operand", operand)
    })
}

/// A `/` at the start of an operand begins a regular expression.
fn operand<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[
        &|p| p.consume("Identifier"),
        &|p| p.consume("Number"),
        &|p| p.consume_in("RegularExpression", REGEXP),
    ])
}

fn main() {
    match Validator::default().validate::<Statements>() {
        Ok(report) => println!(
            "grammar `{}` is valid: {} rules, {} choices",
            report.entry, report.stats.rules, report.stats.choices
        ),
        Err(error) => {
            eprintln!("{error}");
            return;
        }
    }

    let source = "let a = 1 + 2 / 3;\nlet b = /ab+c/g;";
    let mut parser = Parser::for_grammar::<Statements>(source).expect("valid token definitions");
    match parser.parse::<Statements>() {
        Ok(output) => {
            print!("{}", output.root.pretty());
            println!(
                "{} tokens, {} backtracks, {} cache hits",
                output.tokens.len(),
                output.stats.backtracks,
                output.stats.cache_hits
            );
        }
        Err(error) => eprintln!("{}", format_error_with_context(&error, source)),
    }

    let broken = "let a = 1 +;\nlet = 2;\nlet c = 3;";
    let mut parser = Parser::for_grammar::<Statements>(broken).expect("valid token definitions");
    if let Err(error) = parser.parse::<Statements>() {
        println!("{}", format_error_with_context(&error, broken));
    }

    let config = ParserConfig::default()
        .with_error_recovery(true)
        .with_sync_tokens(&["Semicolon"]);
    let mut parser = Parser::for_grammar::<Statements>(broken)
        .expect("valid token definitions")
        .with_config(config);
    match parser.parse::<Statements>() {
        Ok(output) => {
            println!("recovered from {} error(s):", output.errors.len());
            for error in &output.errors {
                println!("  {error}");
            }
            print!("{}", output.root.pretty());
        }
        Err(error) => eprintln!("{error}"),
    }
}
