//! Query option, filter, and result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chunk::Chunk;

/// Comparison operator for metadata filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Strict equality.
    Eq,
    /// Strict inequality. Vacuously true for a missing field.
    Neq,
    /// Membership in an array `value`.
    In,
    /// Absence from an array `value`. A missing field passes.
    Nin,
    /// Numeric greater-or-equal. Non-numeric operands exclude the chunk.
    Gte,
    /// Numeric less-or-equal. Non-numeric operands exclude the chunk.
    Lte,
    /// Field is present and non-null.
    Exists,
}

/// A predicate over chunk metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Dot-notation path into the chunk metadata, e.g. `source_plugin` or
    /// `review.status`.
    pub field: String,
    /// The comparison operator.
    pub op: FilterOp,
    /// The comparison value. Required by `in`/`nin` (an array) and
    /// `gte`/`lte` (a number); ignored by `exists`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl MetadataFilter {
    /// Shorthand for an equality filter.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), op: FilterOp::Eq, value: Some(value.into()) }
    }

    /// Shorthand for an existence filter.
    #[must_use]
    pub fn exists(field: impl Into<String>) -> Self {
        Self { field: field.into(), op: FilterOp::Exists, value: None }
    }
}

/// Options controlling a single query.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryOptions {
    /// Number of results to return.
    pub top_k: usize,
    /// Minimum score; results scoring below are dropped after ranking.
    pub min_score: Option<f32>,
    /// Metadata filter applied before ranking.
    pub filter: Option<MetadataFilter>,
    /// When true, each result carries a copy of the chunk's vector.
    pub include_vectors: bool,
    /// Explicit beam-width override for approximate search. When unset the
    /// engine derives it from `top_k` and an over-fetch factor.
    pub ef_search: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { top_k: 10, min_score: None, filter: None, include_vectors: false, ef_search: None }
    }
}

impl QueryOptions {
    /// Set the number of results to return.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the minimum score threshold.
    #[must_use]
    pub const fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Set the metadata filter.
    #[must_use]
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Request vectors in the results.
    #[must_use]
    pub const fn with_vectors(mut self) -> Self {
        self.include_vectors = true;
        self
    }
}

/// One ranked query result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// The matching chunk.
    pub chunk: Chunk,
    /// Similarity score under the index's metric; higher is better.
    pub score: f32,
    /// 0-indexed position in the ranked result list.
    pub rank: usize,
    /// The chunk's vector, present only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let options = QueryOptions::default();
        assert_eq!(options.top_k, 10);
        assert!(options.min_score.is_none());
        assert!(options.filter.is_none());
        assert!(!options.include_vectors);
    }

    #[test]
    fn test_options_deserialize_camel_case() {
        let options: QueryOptions = serde_json::from_value(json!({
            "topK": 5,
            "minScore": 0.25,
            "includeVectors": true,
            "filter": { "field": "category", "op": "eq", "value": "finance" }
        }))
        .unwrap();
        assert_eq!(options.top_k, 5);
        assert_eq!(options.min_score, Some(0.25));
        assert!(options.include_vectors);
        assert_eq!(options.filter.unwrap().op, FilterOp::Eq);
    }

    #[test]
    fn test_filter_op_wire_names() {
        let filter: MetadataFilter =
            serde_json::from_value(json!({ "field": "f", "op": "nin", "value": [1, 2] })).unwrap();
        assert_eq!(filter.op, FilterOp::Nin);
    }
}
