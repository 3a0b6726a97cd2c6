use crate::flatten::error::{FlattenError, Result};
use crate::flatten::types::{
    is_operator_key, Document, FlatDocument, FlattenConfig, SiblingPolicy, AND_OPERATOR,
    OR_OPERATOR,
};
use serde_json::Value;

/// Turns nested filter documents into dot-path keyed documents
///
/// Keys of nested documents are joined with the configured separator. Query
/// operators get special treatment:
///
/// - `$or` / `$and` must hold an array of documents. Each clause is flattened on
///   its own and the combinator becomes the only entry of its document. When
///   both are present, `$and` is kept.
/// - Any other `$` key is never descended into. A document made up only of such
///   keys (e.g. `{"$gte": 5}`) is kept verbatim under its field path.
#[derive(Debug, Clone, Default)]
pub struct Flattener {
    config: FlattenConfig,
}

impl Flattener {
    pub fn new(config: FlattenConfig) -> Self {
        Flattener { config }
    }

    /// Create a flattener after validating `config`
    pub fn try_new(config: FlattenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    /// Flatten a document with no path prefix
    pub fn flatten(&self, document: &Document) -> Result<FlatDocument> {
        self.flatten_document("", document, "", 0)
    }

    /// Flatten a document as if it were nested one level under `prefix`
    ///
    /// A combinator at the top of `document` is not prefixed.
    pub fn flatten_with_prefix(&self, prefix: &str, document: &Document) -> Result<FlatDocument> {
        self.flatten_document(prefix, document, prefix, 0)
    }

    /// Flatten a decoded JSON value, which must be an object
    pub fn flatten_value(&self, value: &Value) -> Result<FlatDocument> {
        match value {
            Value::Object(document) => self.flatten(document),
            other => Err(FlattenError::NotADocument {
                found: kind_name(other),
            }),
        }
    }

    /// Flatten a single value under `prefix`
    ///
    /// Anything that is not a document is a leaf and comes back as `{prefix: value}`.
    fn flatten_entry(
        &self,
        prefix: &str,
        value: &Value,
        location: &str,
        depth: usize,
    ) -> Result<FlatDocument> {
        match value {
            Value::Object(document) => self.flatten_document(prefix, document, location, depth),
            leaf => {
                let mut flat = FlatDocument::new();
                flat.insert(prefix.to_string(), leaf.clone());
                Ok(flat)
            }
        }
    }

    /// Flatten the entries of a document
    ///
    /// `prefix` is prepended to every produced path except a combinator key.
    /// `location` is the full path of the document, used only in errors.
    fn flatten_document(
        &self,
        prefix: &str,
        document: &Document,
        location: &str,
        depth: usize,
    ) -> Result<FlatDocument> {
        if depth > self.config.max_depth {
            return Err(FlattenError::NestingTooDeep {
                depth,
                max: self.config.max_depth,
            });
        }

        // Fixed precedence; map iteration order depends on serde_json features
        let combinator = [AND_OPERATOR, OR_OPERATOR]
            .into_iter()
            .find_map(|operator| document.get(operator).map(|clauses| (operator, clauses)));

        if let Some((operator, clauses)) = combinator {
            if self.config.sibling_policy == SiblingPolicy::Reject && document.len() > 1 {
                return Err(FlattenError::CombinatorWithSiblings {
                    operator: operator.to_string(),
                    siblings: document
                        .keys()
                        .filter(|key| key.as_str() != operator)
                        .cloned()
                        .collect(),
                });
            }

            let path = self.config.join(location, operator);
            let mut flat = FlatDocument::new();
            flat.insert(operator.to_string(), self.flatten_clauses(clauses, &path, depth)?);
            return Ok(flat);
        }

        let mut flat = FlatDocument::new();

        for (key, value) in document.iter() {
            // Operators other than the combinators surface one level up
            if is_operator_key(key) {
                continue;
            }

            let child_location = self.config.join(location, key);
            let nested = self.flatten_entry(key, value, &child_location, depth + 1)?;

            // Only operators (or nothing) inside: keep the original value at parent.key
            if nested.is_empty() {
                flat.insert(self.config.join(prefix, key), value.clone());
                continue;
            }

            for (nested_key, nested_value) in nested {
                flat.insert(self.config.join(prefix, &nested_key), nested_value);
            }
        }

        Ok(flat)
    }

    /// Flatten every clause of an `$or` / `$and` array
    fn flatten_clauses(&self, clauses: &Value, path: &str, depth: usize) -> Result<Value> {
        let Value::Array(items) = clauses else {
            return Err(FlattenError::OrAndMustBeArray {
                path: path.to_string(),
            });
        };

        let mut flattened = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let clause_path = format!("{}[{}]", path, idx);
            let Value::Object(clause) = item else {
                return Err(FlattenError::OrAndMustBeArray { path: clause_path });
            };

            let flat = self.flatten_document("", clause, &clause_path, depth + 1)?;
            flattened.push(Value::Object(flat));
        }

        Ok(Value::Array(flattened))
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
