//! Metadata filter evaluation.
//!
//! Filters address chunk metadata as a JSON object (provenance fields and
//! plugin-defined extras flattened together) via dotted paths. Evaluation is
//! total: a filter never errors, it only includes or excludes a chunk.
//!
//! Missing-field semantics: a missing field fails every operator except
//! `neq` (vacuously true — the field is certainly not equal) and `nin` (the
//! missing value is certainly not in the array).

use serde_json::Value;

use vpack_core::{Chunk, FilterOp, MetadataFilter};

/// Evaluate a filter against one chunk.
#[must_use]
pub fn matches_filter(chunk: &Chunk, filter: &MetadataFilter) -> bool {
    let Ok(metadata) = serde_json::to_value(&chunk.metadata) else {
        return false;
    };
    let field = lookup_path(&metadata, &filter.field);

    match filter.op {
        FilterOp::Eq => match (field, filter.value.as_ref()) {
            (Some(v), Some(expected)) => v == expected,
            (Some(v), None) => v.is_null(),
            (None, _) => false,
        },
        FilterOp::Neq => match (field, filter.value.as_ref()) {
            (Some(v), Some(expected)) => v != expected,
            (Some(v), None) => !v.is_null(),
            (None, _) => true,
        },
        FilterOp::In => match (field, filter.value.as_ref()) {
            (Some(v), Some(Value::Array(items))) => items.iter().any(|item| item == v),
            _ => false,
        },
        FilterOp::Nin => match (field, filter.value.as_ref()) {
            (Some(v), Some(Value::Array(items))) => items.iter().all(|item| item != v),
            (None, Some(Value::Array(_))) => true,
            _ => false,
        },
        FilterOp::Gte => compare_numeric(field, filter.value.as_ref(), |a, b| a >= b),
        FilterOp::Lte => compare_numeric(field, filter.value.as_ref(), |a, b| a <= b),
        FilterOp::Exists => matches!(field, Some(v) if !v.is_null()),
    }
}

/// Numeric comparison; any non-numeric operand excludes the chunk.
fn compare_numeric(field: Option<&Value>, expected: Option<&Value>, cmp: fn(f64, f64) -> bool) -> bool {
    match (field.and_then(Value::as_f64), expected.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Walk a dotted path through nested JSON objects.
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}
