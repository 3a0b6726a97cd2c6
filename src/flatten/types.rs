use crate::flatten::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A nested filter document, as decoded from JSON
pub type Document = Map<String, Value>;

/// The dot-path keyed output of flattening
pub type FlatDocument = Map<String, Value>;

/// Leading character of every query operator key
pub const OPERATOR_SIGIL: char = '$';

pub const OR_OPERATOR: &str = "$or";
pub const AND_OPERATOR: &str = "$and";

/// Returns true for keys reserved for query-language semantics (`$gte`, `$or`, ...)
pub fn is_operator_key(key: &str) -> bool {
    key.starts_with(OPERATOR_SIGIL)
}

/// Returns true for the boolean combinators whose clauses are flattened recursively
pub fn is_combinator_key(key: &str) -> bool {
    key == OR_OPERATOR || key == AND_OPERATOR
}

/// What to do with keys that share a document with `$or` / `$and`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingPolicy {
    /// The combinator becomes the sole content of its document; siblings are dropped
    #[default]
    Discard,
    /// Fail with `FlattenError::CombinatorWithSiblings`
    Reject,
}

/// Configuration for the flattening process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Maximum document nesting depth (the root document is depth 0)
    pub max_depth: usize,

    /// Separator placed between path segments
    pub separator: String,

    /// Handling of keys next to a boolean combinator
    pub sibling_policy: SiblingPolicy,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            max_depth: 100,
            separator: String::from("."),
            sibling_policy: SiblingPolicy::Discard,
        }
    }
}

impl FlattenConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_sibling_policy(mut self, policy: SiblingPolicy) -> Self {
        self.sibling_policy = policy;
        self
    }

    /// Check the settings that would make flattened paths ambiguous
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(FlattenError::EmptySeparator);
        }
        Ok(())
    }

    /// Join a parent path and a child key; an empty parent yields the bare key
    pub(crate) fn join(&self, prefix: &str, key: &str) -> String {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", prefix, self.separator, key)
        }
    }
}
