#![no_main]
use libfuzzer_sys::fuzz_target;
use pegwise::parser::{Combinators, Grammar, Parsed, Parser, ParserConfig};
use pegwise::TokenDefinition;

struct Blocks;

impl Grammar for Blocks {
    const ENTRY: &'static str = "Items";

    fn token_definitions() -> Vec<TokenDefinition> {
        vec![
            TokenDefinition::regex("Whitespace", r"\s+").skipped(),
            TokenDefinition::regex("Identifier", "[a-z]+"),
            TokenDefinition::regex("Number", "[0-9]+"),
            TokenDefinition::literal("LBrace", "{"),
            TokenDefinition::literal("RBrace", "}"),
            TokenDefinition::literal("Comma", ","),
            TokenDefinition::literal("Semicolon", ";"),
        ]
    }

    fn entry<P: Combinators>(p: &mut P) -> Parsed {
        p.many(|p| p.subrule("Item", item))
    }
}

fn item<P: Combinators>(p: &mut P) -> Parsed {
    p.or(&[
        &|p| {
            p.consume("LBrace")?;
            p.many(|p| p.subrule("Item", item))?;
            p.consume("RBrace")
        },
        &|p| {
            p.consume("Identifier")?;
            p.many(|p| {
                p.consume("Comma")?;
                p.consume("Number")
            })?;
            p.consume("Semicolon")
        },
    ])
}

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing arbitrary input must never panic, with or without the cache.
    for cache in [true, false] {
        if let Ok(mut parser) = Parser::for_grammar::<Blocks>(source) {
            parser.cache(cache);
            let _ = parser.parse::<Blocks>();
        }
    }

    let config = ParserConfig::default()
        .with_error_recovery(true)
        .with_sync_tokens(&["Semicolon", "RBrace"]);
    let max_errors = config.max_errors;
    if let Ok(parser) = Parser::for_grammar::<Blocks>(source) {
        let mut parser = parser.with_config(config);
        if let Ok(output) = parser.parse::<Blocks>() {
            assert!(output.errors.len() <= max_errors);
        }
    }
});
