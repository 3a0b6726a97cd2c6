//! Query filter flattening
//!
//! This module turns nested filter documents into the dot-notation a
//! document-store query engine expects, while keeping query operators intact.

pub mod error;
pub mod flattener;
pub mod types;

pub use error::FlattenError;
pub use flattener::Flattener;
pub use types::{
    is_combinator_key, is_operator_key, Document, FlatDocument, FlattenConfig, SiblingPolicy,
    AND_OPERATOR, OPERATOR_SIGIL, OR_OPERATOR,
};
