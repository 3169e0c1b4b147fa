use crate::grammar::AnalyzerConfig;
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Configuration for the [`Parser`](super::Parser)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct ParserConfig {
    /// Enable packrat memoization of rule results
    pub enable_memoization: bool,
    /// Maximum number of memoized rule results (least recently used are evicted)
    pub max_memo_size: usize,
    /// Enable error recovery inside repetitions
    pub error_recovery: bool,
    /// Token names recovery skips up to (inclusive); empty means skip to end of input
    pub sync_tokens: Vec<CompactString>,
    /// Maximum number of errors recovered from before recovery is disabled
    pub max_errors: usize,
    /// Maximum rule nesting depth
    pub max_rule_depth: usize,
    /// Log rule entry and exit at `debug` level
    pub debug: bool,
    /// Include the full rule path in debug logs
    pub show_path: bool,
    /// Settings used by [`Parser::validate`](super::Parser::validate)
    pub analyzer: AnalyzerConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            enable_memoization: true,
            max_memo_size: 10_000,
            error_recovery: false,
            sync_tokens: Vec::new(),
            max_errors: 100,
            max_rule_depth: 1_000,
            debug: false,
            show_path: false,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn with_sync_tokens(mut self, names: &[&str]) -> Self {
        self.sync_tokens = names.iter().map(|n| CompactString::from(*n)).collect();
        self
    }

    #[must_use]
    pub fn with_memoization(mut self, enable: bool) -> Self {
        self.enable_memoization = enable;
        self
    }

    #[must_use]
    pub fn with_error_recovery(mut self, enable: bool) -> Self {
        self.error_recovery = enable;
        self
    }

    #[must_use]
    pub fn with_max_memo_size(mut self, size: usize) -> Self {
        self.max_memo_size = size;
        self
    }

    #[must_use]
    pub fn with_max_rule_depth(mut self, depth: usize) -> Self {
        self.max_rule_depth = depth;
        self
    }

    #[must_use]
    pub fn is_sync_token(&self, name: &str) -> bool {
        self.sync_tokens.iter().any(|t| t == name)
    }
}
