//! Property-based tests for the lexer and parser runtime
//!
//! These tests use proptest to generate random arithmetic inputs and check
//! invariants that must hold for every input.

#![cfg(test)]

use pegwise::lexer::Lexer;
use pegwise::parser::{Combinators, Grammar, Parsed, Parser};
use pegwise::TokenDefinition;
use proptest::prelude::*;

struct Arith;

impl Grammar for Arith {
    const ENTRY: &'static str = "Expr";

    fn token_definitions() -> Vec<TokenDefinition> {
        vec![
            TokenDefinition::regex("Whitespace", r"[ \t\n]+").skipped(),
            TokenDefinition::regex("Number", "[0-9]+"),
            TokenDefinition::literal("Plus", "+"),
            TokenDefinition::literal("Minus", "-"),
            TokenDefinition::literal("Star", "*"),
            TokenDefinition::literal("LParen", "("),
            TokenDefinition::literal("RParen", ")"),
        ]
    }

    fn entry<P: Combinators>(p: &mut P) -> Parsed {
        expr(p)
    }
}

fn expr<P: Combinators>(p: &mut P) -> Parsed {
    p.subrule("Term", term)?;
    p.many(|p| {
        p.or(&[&|p| p.consume("Plus"), &|p| p.consume("Minus")])?;
        p.subrule("Term", term)
    })
}

fn term<P: Combinators>(p: &mut P) -> Parsed {
    p.subrule("Factor", factor)?;
    p.many(|p| {
        p.consume("Star")?;
        p.subrule("Factor", factor)
    })
}

fn factor<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[&|p| p.consume("Number"), &|p| {
        p.consume("LParen")?;
        p.subrule("Expr", expr)?;
        p.consume("RParen")
    }])
}

/// Well-formed expressions with random spacing.
fn expression() -> impl Strategy<Value = String> {
    "[0-9]{1,4}".prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(vec!["+", "-", "*"]), inner.clone(), " {0,2}")
                .prop_map(|(l, op, r, space)| format!("{l}{space}{op}{space}{r}")),
            inner.prop_map(|e| format!("({e})")),
        ]
    })
}

/// Arbitrary strings over the token alphabet, mostly malformed.
fn token_soup() -> impl Strategy<Value = String> {
    "[0-9+*()\\- ]{0,24}"
}

proptest! {
    #[test]
    fn test_tokenizing_is_idempotent(source in token_soup()) {
        let lexer = Lexer::new(Arith::token_definitions()).unwrap();
        let first = lexer.tokenize(&source);
        let second = lexer.tokenize(&source);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_valid_expressions_parse(source in expression()) {
        let mut parser = Parser::for_grammar::<Arith>(source.as_str()).unwrap();
        let output = parser.parse::<Arith>();
        prop_assert!(output.is_ok(), "failed on {:?}: {:?}", source, output.err());
    }

    #[test]
    fn test_cache_is_transparent(source in token_soup()) {
        let mut cached = Parser::for_grammar::<Arith>(source.as_str()).unwrap();
        let mut uncached = Parser::for_grammar::<Arith>(source.as_str()).unwrap();
        uncached.cache(false);

        match (cached.parse::<Arith>(), uncached.parse::<Arith>()) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.root, b.root);
                prop_assert_eq!(a.tokens, b.tokens);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            (a, b) => prop_assert!(false, "cache changed the outcome: {:?} vs {:?}", a.is_ok(), b.is_ok()),
        }
    }

    #[test]
    fn test_cache_is_transparent_with_recovery(source in token_soup()) {
        let mut cached = Parser::for_grammar::<Arith>(source.as_str()).unwrap();
        let mut uncached = Parser::for_grammar::<Arith>(source.as_str()).unwrap();
        cached.error_handler(true);
        uncached.error_handler(true).cache(false);

        match (cached.parse::<Arith>(), uncached.parse::<Arith>()) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.root, b.root);
                prop_assert_eq!(a.tokens, b.tokens);
                prop_assert_eq!(a.errors, b.errors);
                prop_assert_eq!(a.stats.errors_recovered, b.stats.errors_recovered);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            (a, b) => prop_assert!(false, "cache changed the outcome: {:?} vs {:?}", a.is_ok(), b.is_ok()),
        }
    }

    #[test]
    fn test_round_trip(source in expression()) {
        let output = Parser::for_grammar::<Arith>(source.as_str())
            .unwrap()
            .parse::<Arith>()
            .unwrap();
        let joined: String = output.tokens.iter().map(|t| t.text.as_str()).collect();
        let expected: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        prop_assert_eq!(joined, expected);
    }

    #[test]
    fn test_tokens_cover_their_text(source in token_soup()) {
        let lexer = Lexer::new(Arith::token_definitions()).unwrap();
        let (tokens, stopped) = lexer.tokenize(&source);
        prop_assert!(stopped <= source.len());
        for token in &tokens {
            prop_assert_eq!(token.range.slice(&source), token.text.as_str());
            prop_assert!(token.range.end().to_usize() <= stopped);
        }
    }
}
