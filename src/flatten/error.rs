use thiserror::Error;

/// Errors raised while flattening a filter document
///
/// All of these indicate malformed caller input; none are retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlattenError {
    /// `$or` / `$and` held something other than an array of documents
    #[error("the value of $or and $and must be an array (at `{path}`)")]
    OrAndMustBeArray {
        /// Path of the offending value, including the element index when an element was at fault
        path: String,
    },

    /// Document nesting exceeds the configured maximum
    #[error("document nesting depth {depth} exceeds maximum of {max} levels")]
    NestingTooDeep {
        /// Depth that was reached
        depth: usize,
        /// Maximum allowed depth
        max: usize,
    },

    /// A boolean combinator shares its document with other keys
    #[error("{operator} must be the only key of its document, found siblings: {}", .siblings.join(", "))]
    CombinatorWithSiblings {
        operator: String,
        siblings: Vec<String>,
    },

    /// Distinct paths would collide without a separator
    #[error("path separator must not be empty")]
    EmptySeparator,

    /// The top-level input was not a document
    #[error("expected a JSON object to flatten, found {found}")]
    NotADocument { found: &'static str },
}

pub type Result<T> = std::result::Result<T, FlattenError>;
