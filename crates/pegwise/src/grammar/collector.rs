//! Recording-mode implementation of the combinators.

use super::rule::{CollectedGrammar, RuleNode};
use crate::lexer::{LexicalGoal, TokenDefinition};
use crate::parser::{Alt, Combinators, Halt, Parsed, RuleFn};
use ahash::RandomState;
use hashbrown::HashSet;
use std::collections::VecDeque;

/// Reconstructs rule structure by running rule functions once.
///
/// Every combinator appends a [`RuleNode`] to the sequence currently being
/// recorded instead of consuming input: `or` records each alternative,
/// repetitions and `option` record their body once, and `subrule` records a
/// reference and queues the referenced rule for its own recording.
#[derive(Debug, Default)]
pub struct RuleRecorder {
    open: Vec<Vec<RuleNode>>,
    pending: VecDeque<(&'static str, RuleFn<Self>)>,
    seen: HashSet<&'static str, RandomState>,
}

impl RuleRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` and every rule reachable from it.
    #[must_use]
    pub fn collect(
        entry: &'static str,
        rule: RuleFn<Self>,
        tokens: Vec<TokenDefinition>,
    ) -> CollectedGrammar {
        let mut recorder = Self::new();
        let mut grammar = CollectedGrammar::new(entry, tokens);

        recorder.seen.insert(entry);
        recorder.pending.push_back((entry, rule));
        while let Some((name, rule)) = recorder.pending.pop_front() {
            let body = recorder.record(Some(name), |r| rule(r));
            log::trace!("recorded {name} := {body}");
            grammar.insert_rule(name, body);
        }

        log::debug!("collected {} rules from `{entry}`", grammar.rule_count());
        grammar
    }

    /// Run `body` with a fresh open sequence and return that sequence.
    fn record<F>(&mut self, rule: Option<&'static str>, body: F) -> RuleNode
    where
        F: FnOnce(&mut Self) -> Parsed,
    {
        self.open.push(Vec::new());
        match body(self) {
            Ok(()) | Err(Halt::Mismatch) => {}
            Err(Halt::Fatal(error)) if error.is_grammar_defect() => {}
            Err(Halt::Fatal(error)) => {
                log::warn!(
                    "rule `{}` raised an error while recording, keeping partial structure: {error}",
                    rule.unwrap_or("<anonymous>")
                );
            }
        }
        let children = self.open.pop().unwrap_or_default();
        RuleNode::Sequence {
            children,
            rule: rule.map(Into::into),
        }
    }

    fn push(&mut self, node: RuleNode) {
        if let Some(sequence) = self.open.last_mut() {
            sequence.push(node);
        }
    }
}

impl Combinators for RuleRecorder {
    fn consume_in(&mut self, token: &'static str, _goal: LexicalGoal) -> Parsed {
        self.push(RuleNode::consume(token));
        Ok(())
    }

    fn subrule(&mut self, name: &'static str, rule: RuleFn<Self>) -> Parsed {
        self.push(RuleNode::subrule(name));
        if self.seen.insert(name) {
            self.pending.push_back((name, rule));
        }
        Ok(())
    }

    fn or(&mut self, alternatives: &[Alt<'_, Self>]) -> Parsed {
        let branches = alternatives
            .iter()
            .map(|alternative| self.record(None, |r| alternative(r)))
            .collect();
        self.push(RuleNode::OrderedChoice { branches });
        Ok(())
    }

    fn many<F>(&mut self, body: F) -> Parsed
    where
        F: FnMut(&mut Self) -> Parsed,
    {
        let body = self.record(None, body);
        self.push(RuleNode::ZeroOrMore(Box::new(body)));
        Ok(())
    }

    fn at_least_one<F>(&mut self, body: F) -> Parsed
    where
        F: FnMut(&mut Self) -> Parsed,
    {
        let body = self.record(None, body);
        self.push(RuleNode::OneOrMore(Box::new(body)));
        Ok(())
    }

    fn option<F>(&mut self, body: F) -> Parsed
    where
        F: FnOnce(&mut Self) -> Parsed,
    {
        let body = self.record(None, body);
        self.push(RuleNode::Optional(Box::new(body)));
        Ok(())
    }

    fn not_followed_by(&mut self, _token: &'static str, _goal: LexicalGoal) -> Parsed {
        Ok(())
    }

    fn no_line_break(&mut self) -> Parsed {
        Ok(())
    }

    fn is_recording(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::syntax::TextRange;

    fn sum<P: Combinators>(p: &mut P) -> Parsed {
        p.subrule("Num", num)?;
        p.many(|p| {
            p.or(&[&|p| p.consume("Plus"), &|p| p.consume("Minus")])?;
            p.subrule("Num", num)
        })
    }

    fn num<P: Combinators>(p: &mut P) -> Parsed {
        p.consume("Number")
    }

    fn failing<P: Combinators>(p: &mut P) -> Parsed {
        p.consume("A")?;
        if p.is_recording() {
            return Err(ParseError::custom(TextRange::default(), "semantic check").into());
        }
        p.consume("B")
    }

    #[test]
    fn test_collects_reachable_rules_once() {
        let grammar = RuleRecorder::collect("Sum", sum, Vec::new());
        let names: Vec<_> = grammar.rules().map(|(name, _)| name).collect();
        assert_eq!(names, ["Sum", "Num"]);
        assert_eq!(grammar.to_string(), "Sum := <Num> {(Plus | Minus) <Num>}\nNum := Number\n");
    }

    #[test]
    fn test_top_level_sequence_carries_rule_name() {
        let grammar = RuleRecorder::collect("Num", num, Vec::new());
        assert!(matches!(
            grammar.rule("Num"),
            Some(RuleNode::Sequence { rule: Some(name), .. }) if name == "Num"
        ));
    }

    #[test]
    fn test_errors_keep_partial_structure() {
        let grammar = RuleRecorder::collect("Failing", failing, Vec::new());
        assert_eq!(grammar.rule("Failing").map(ToString::to_string).as_deref(), Some("A"));
    }
}
