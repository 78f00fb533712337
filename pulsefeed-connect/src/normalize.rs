//! JSON shape normalizer
//!
//! The downstream columnar warehouse rejects arrays that directly contain
//! arrays. This module rewrites any such shape, at any nesting depth, into
//! an array of named objects:
//!
//! - a field listed in the shape mappings gets its declared column names,
//! - an unmapped series of two-element arrays becomes timestamp/value pairs,
//! - anything else degrades to positional `val_N` keys and emits a
//!   [`ShapeWarning`] so an explicit mapping can be added later.
//!
//! The function is pure and idempotent: normalized output contains objects
//! where inner arrays used to be, so a second pass finds nothing to rewrite.
//! Leaf values are never dropped; the only lossy case is zip truncation
//! against a declared mapping.

use crate::models::ShapeWarning;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Array field name → ordered column names
pub type ShapeMappings = HashMap<String, Vec<String>>;

/// Rewrite `value` so it contains no array-of-arrays at any depth.
///
/// Returns the normalized value together with one warning per site where an
/// unmapped array with inner arity above two degraded to positional keys.
pub fn normalize(value: Value, mappings: &ShapeMappings) -> (Value, Vec<ShapeWarning>) {
    let mut warnings = Vec::new();
    let normalized = normalize_value(value, mappings, "$", &mut warnings);
    (normalized, warnings)
}

fn normalize_value(
    value: Value,
    mappings: &ShapeMappings,
    path: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                let child_path = format!("{}.{}", path, key);
                let rewritten = if is_array_of_arrays(&val) {
                    match mappings.get(&key) {
                        Some(columns) => {
                            rewrite_with_columns(val, columns, mappings, &child_path, warnings)
                        }
                        // No declared mapping: fall through to the generic
                        // array-of-arrays rewrite.
                        None => normalize_value(val, mappings, &child_path, warnings),
                    }
                } else {
                    normalize_value(val, mappings, &child_path, warnings)
                };
                out.insert(key, rewritten);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            if matches!(items.first(), Some(Value::Array(_))) {
                rewrite_generic(items, mappings, path, warnings)
            } else {
                let out = items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        let child_path = format!("{}[{}]", path, idx);
                        normalize_value(item, mappings, &child_path, warnings)
                    })
                    .collect();
                Value::Array(out)
            }
        }
        primitive => primitive,
    }
}

fn is_array_of_arrays(value: &Value) -> bool {
    match value {
        Value::Array(items) => matches!(items.first(), Some(Value::Array(_))),
        _ => false,
    }
}

/// Rewrite each inner array into an object using the declared column names,
/// zipping to the shorter of the two lengths.
fn rewrite_with_columns(
    value: Value,
    columns: &[String],
    mappings: &ShapeMappings,
    path: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> Value {
    let items = match value {
        Value::Array(items) => items,
        other => return normalize_value(other, mappings, path, warnings),
    };

    let out = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let child_path = format!("{}[{}]", path, idx);
            match item {
                Value::Array(inner) => {
                    let mut object = Map::with_capacity(columns.len().min(inner.len()));
                    for (column, cell) in columns.iter().zip(inner) {
                        let cell_path = format!("{}.{}", child_path, column);
                        object.insert(
                            column.clone(),
                            normalize_value(cell, mappings, &cell_path, warnings),
                        );
                    }
                    Value::Object(object)
                }
                other => normalize_value(other, mappings, &child_path, warnings),
            }
        })
        .collect();
    Value::Array(out)
}

/// Generic fallback for an array whose first element is an array: arity-2
/// inner arrays become timestamp/value pairs, anything else gets positional
/// keys. Emits at most one warning per site.
fn rewrite_generic(
    items: Vec<Value>,
    mappings: &ShapeMappings,
    path: &str,
    warnings: &mut Vec<ShapeWarning>,
) -> Value {
    let mut warned = false;
    let out = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let child_path = format!("{}[{}]", path, idx);
            match item {
                Value::Array(inner) if inner.len() == 2 => {
                    let mut pair = inner.into_iter();
                    let timestamp = pair.next().unwrap_or(Value::Null);
                    let value = pair.next().unwrap_or(Value::Null);
                    let mut object = Map::with_capacity(2);
                    object.insert(
                        "timestamp".to_string(),
                        normalize_value(timestamp, mappings, &child_path, warnings),
                    );
                    object.insert(
                        "value".to_string(),
                        normalize_value(value, mappings, &child_path, warnings),
                    );
                    Value::Object(object)
                }
                Value::Array(inner) => {
                    if inner.len() > 2 && !warned {
                        warnings.push(ShapeWarning {
                            path: path.to_string(),
                            arity: inner.len(),
                        });
                        warned = true;
                    }
                    let mut object = Map::with_capacity(inner.len());
                    for (pos, cell) in inner.into_iter().enumerate() {
                        let key = format!("val_{}", pos);
                        let cell_path = format!("{}.{}", child_path, key);
                        object.insert(key, normalize_value(cell, mappings, &cell_path, warnings));
                    }
                    Value::Object(object)
                }
                other => normalize_value(other, mappings, &child_path, warnings),
            }
        })
        .collect();
    Value::Array(out)
}
