use crate::lexer::TokenDefinition;
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::fmt;

/// Declarative structure of a rule, as recorded from its combinator calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleNode {
    Consume {
        token: CompactString,
    },
    /// Ordered list of children; `rule` is set for a rule's top-level sequence.
    Sequence {
        children: Vec<RuleNode>,
        rule: Option<CompactString>,
    },
    /// Branches are sequences, tried in order.
    OrderedChoice {
        branches: Vec<RuleNode>,
    },
    Optional(Box<RuleNode>),
    ZeroOrMore(Box<RuleNode>),
    OneOrMore(Box<RuleNode>),
    Subrule {
        rule: CompactString,
    },
}

impl RuleNode {
    #[must_use]
    pub fn sequence(children: Vec<Self>) -> Self {
        Self::Sequence {
            children,
            rule: None,
        }
    }

    #[must_use]
    pub fn consume(token: &str) -> Self {
        Self::Consume {
            token: token.into(),
        }
    }

    #[must_use]
    pub fn subrule(rule: &str) -> Self {
        Self::Subrule { rule: rule.into() }
    }

    /// Direct children in order.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Sequence { children, .. } => children,
            Self::OrderedChoice { branches } => branches,
            Self::Optional(body) | Self::ZeroOrMore(body) | Self::OneOrMore(body) => {
                std::slice::from_ref(body)
            }
            Self::Consume { .. } | Self::Subrule { .. } => &[],
        }
    }

    /// Calls `f` on every node in pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Ordered choices in pre-order; the position is the choice index.
    #[must_use]
    pub fn choices(&self) -> Vec<&[Self]> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Self::OrderedChoice { branches } = node {
                out.push(branches.as_slice());
            }
        });
        out
    }

    /// Whether the node can match without consuming, given the nullable rules.
    #[must_use]
    pub fn is_nullable(&self, nullable_rule: &impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Consume { .. } => false,
            Self::Subrule { rule } => nullable_rule(rule),
            Self::Sequence { children, .. } => children.iter().all(|c| c.is_nullable(nullable_rule)),
            Self::OrderedChoice { branches } => branches.iter().any(|b| b.is_nullable(nullable_rule)),
            Self::Optional(_) | Self::ZeroOrMore(_) => true,
            Self::OneOrMore(body) => body.is_nullable(nullable_rule),
        }
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consume { token } => f.write_str(token),
            Self::Subrule { rule } => write!(f, "<{rule}>"),
            Self::Sequence { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{child}")?;
                }
                Ok(())
            }
            Self::OrderedChoice { branches } => {
                f.write_str("(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{branch}")?;
                }
                f.write_str(")")
            }
            Self::Optional(body) => write!(f, "[{body}]"),
            Self::ZeroOrMore(body) => write!(f, "{{{body}}}"),
            Self::OneOrMore(body) => write!(f, "{{{body}}}+"),
        }
    }
}

/// Rules and tokens reachable from an entry rule.
#[derive(Debug, Clone)]
pub struct CollectedGrammar {
    pub entry: CompactString,
    rules: HashMap<CompactString, RuleNode, RandomState>,
    order: Vec<CompactString>,
    tokens: Vec<TokenDefinition>,
}

impl CollectedGrammar {
    #[must_use]
    pub fn new(entry: impl Into<CompactString>, tokens: Vec<TokenDefinition>) -> Self {
        Self {
            entry: entry.into(),
            rules: HashMap::with_hasher(RandomState::new()),
            order: Vec::new(),
            tokens,
        }
    }

    /// Add or replace a rule; the first insertion fixes its position.
    pub fn insert_rule(&mut self, name: impl Into<CompactString>, body: RuleNode) {
        let name = name.into();
        if self.rules.insert(name.clone(), body).is_none() {
            self.order.push(name);
        }
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&RuleNode> {
        self.rules.get(name)
    }

    /// Rules in discovery order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &RuleNode)> {
        self.order
            .iter()
            .filter_map(|name| self.rules.get(name).map(|body| (name.as_str(), body)))
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn tokens(&self) -> &[TokenDefinition] {
        &self.tokens
    }

    #[must_use]
    pub fn has_token(&self, name: &str) -> bool {
        self.tokens.iter().any(|def| def.name == name)
    }
}

impl fmt::Display for CollectedGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, body) in self.rules() {
            writeln!(f, "{name} := {body}")?;
        }
        Ok(())
    }
}
