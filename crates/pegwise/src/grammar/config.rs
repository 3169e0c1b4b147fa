#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for static grammar analysis
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct AnalyzerConfig {
    /// Number of leading tokens compared when looking for identical branches (at least 1)
    pub first_k: usize,
    /// How many rule references deep expansions follow before leaving a placeholder (at least 1)
    pub max_depth: usize,
    /// Cap on the number of paths a breadth expansion may hold
    pub max_paths: usize,
    /// Wall-clock budget for one validation
    pub timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            first_k: 3,
            max_depth: 6,
            max_paths: 2_048,
            timeout: Duration::from_secs(10),
        }
    }
}

impl AnalyzerConfig {
    /// Set K; zero is raised to one, since every branch shares the empty
    /// First-0 set.
    #[must_use]
    pub const fn with_first_k(mut self, k: usize) -> Self {
        self.first_k = at_least_one(k);
        self
    }

    /// Set the expansion depth; zero is raised to one.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = at_least_one(depth);
        self
    }

    /// The same configuration with `first_k` and `max_depth` raised to
    /// at least one, for values assigned to the fields directly.
    #[must_use]
    pub const fn normalized(mut self) -> Self {
        self.first_k = at_least_one(self.first_k);
        self.max_depth = at_least_one(self.max_depth);
        self
    }

    #[must_use]
    pub const fn with_max_paths(mut self, paths: usize) -> Self {
        self.max_paths = paths;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

const fn at_least_one(value: usize) -> usize {
    if value == 0 { 1 } else { value }
}
