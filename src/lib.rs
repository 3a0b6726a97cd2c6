//! # docflat - Query Filter Flattening
//!
//! Converts nested, JSON-like filter documents into flat documents keyed by
//! dot-joined paths, the addressing convention document databases use for
//! nested fields.
//!
//! Query operators (keys starting with `$`) are handled specially:
//!
//! - `$or` / `$and` hold arrays of clauses; each clause is flattened recursively.
//! - Any other operator object, such as `{"$gte": 5}`, is kept whole under the
//!   path of the field it applies to.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::{json, Value};
//!
//! # fn main() -> Result<(), docflat::FlattenError> {
//! let filter = json!({
//!     "person": {"age": {"$gte": 5}},
//!     "$or": [{"a": {"b": 1}}, {"c": 2}]
//! });
//!
//! let flat = docflat::Flattener::default().flatten_value(&filter)?;
//!
//! // A document holding `$or` reduces to the combinator alone
//! assert_eq!(Value::Object(flat), json!({"$or": [{"a.b": 1}, {"c": 2}]}));
//!
//! let filter = json!({"person": {"age": {"$gte": 5}}});
//! let flat = docflat::flatten(filter.as_object().unwrap())?;
//! assert_eq!(Value::Object(flat), json!({"person.age": {"$gte": 5}}));
//! # Ok(())
//! # }
//! ```

pub mod flatten;

pub use flatten::{
    is_combinator_key, is_operator_key, Document, FlatDocument, FlattenConfig, FlattenError,
    Flattener, SiblingPolicy,
};

/// Flatten a filter document using the default configuration
pub fn flatten(document: &Document) -> Result<FlatDocument, FlattenError> {
    Flattener::default().flatten(document)
}

/// Flatten a filter document as if it were nested under `prefix`
pub fn flatten_with_prefix(prefix: &str, document: &Document) -> Result<FlatDocument, FlattenError> {
    Flattener::default().flatten_with_prefix(prefix, document)
}
