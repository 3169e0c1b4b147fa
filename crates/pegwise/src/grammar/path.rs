use compact_str::CompactString;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;

/// Element of a path: a token, or a rule left unexpanded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Token(CompactString),
    Rule(CompactString),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(name) => f.write_str(name),
            Self::Rule(name) => write!(f, "<{name}>"),
        }
    }
}

/// Sequence of symbols a grammar fragment can begin with.
///
/// The canonical form is the comma-joined display, e.g. `a,b,<Expr>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Path(SmallVec<[Symbol; 4]>);

/// Deterministically ordered set of paths.
pub type PathSet = BTreeSet<Path>;

impl Path {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(name: &str) -> Self {
        Self(smallvec::smallvec![Symbol::Token(name.into())])
    }

    #[must_use]
    pub fn rule(name: &str) -> Self {
        Self(smallvec::smallvec![Symbol::Rule(name.into())])
    }

    /// Path of tokens, for tests and examples.
    #[must_use]
    pub fn of(tokens: &[&str]) -> Self {
        Self(tokens.iter().map(|t| Symbol::Token((*t).into())).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    /// `self` followed by `other`, cut to at most `limit` symbols.
    #[must_use]
    pub fn concat(&self, other: &Self, limit: usize) -> Self {
        Self(
            self.0
                .iter()
                .chain(other.0.iter())
                .take(limit)
                .cloned()
                .collect(),
        )
    }

    /// True when `self` is shorter than `other` and matches its beginning.
    #[must_use]
    pub fn is_strict_prefix_of(&self, other: &Self) -> bool {
        self.len() < other.len() && other.0.starts_with(&self.0)
    }

    /// Whether any unexpanded rule occurs in the path.
    #[must_use]
    pub fn has_rules(&self) -> bool {
        self.0.iter().any(|s| matches!(s, Symbol::Rule(_)))
    }
}

impl FromIterator<Symbol> for Path {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("ε");
        }
        for (i, symbol) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{symbol}")?;
        }
        Ok(())
    }
}

/// Concatenate every path of `left` with every path of `right`.
///
/// Paths of `left` already `limit` long are kept unchanged.
#[must_use]
pub fn product(left: &PathSet, right: &PathSet, limit: usize) -> PathSet {
    let mut out = PathSet::new();
    for prefix in left {
        if prefix.len() >= limit {
            out.insert(prefix.clone());
            continue;
        }
        for suffix in right {
            out.insert(prefix.concat(suffix, limit));
        }
    }
    out
}
