#![no_main]
use libfuzzer_sys::fuzz_target;
use pegwise::lexer::{Lexer, LexicalGoal, Pattern, TemplateEffect, TokenDefinition};

const TEMPLATE: LexicalGoal = LexicalGoal("TemplateTail");

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(lexer) = Lexer::new(vec![
        TokenDefinition::skip("Whitespace", Pattern::regex(r"[ \t\r\n\u{2028}\u{2029}]+")),
        TokenDefinition::keyword("If", "if"),
        TokenDefinition::regex("Identifier", r"[A-Za-z_$][A-Za-z0-9_$]*"),
        TokenDefinition::regex("Number", r"[0-9]+"),
        TokenDefinition::literal("RBrace", "}"),
        TokenDefinition::regex("TemplateHead", r"`[^`$]*\$\{").template(TemplateEffect::Open),
        TokenDefinition::regex("TemplateTail", r"\}[^`$]*`")
            .in_goals(&[TEMPLATE])
            .template(TemplateEffect::Close),
    ]) else {
        return;
    };

    let (tokens, stopped) = lexer.tokenize(source);
    assert!(stopped <= source.len());
    for pair in tokens.windows(2) {
        assert!(pair[0].range.end() <= pair[1].range.start());
    }
    for token in &tokens {
        assert_eq!(token.range.slice(source), token.text.as_str());
    }
});
