//! # Record Utilities

use burn::prelude::Backend;
use burn::record::{HalfPrecisionSettings, Record};
use serde_json::{Map, Value};

/// The shape of a (possibly nested) numeric JSON array.
///
/// Returns `None` for mixed or non-numeric arrays.
fn numeric_array_shape(values: &[Value]) -> Option<Vec<usize>> {
    match values.first() {
        None => Some(vec![0]),
        Some(Value::Number(_)) => Some(vec![values.len()]),
        Some(Value::Array(inner)) => {
            let inner_shape = numeric_array_shape(inner)?;
            Some(std::iter::once(values.len()).chain(inner_shape).collect())
        }
        Some(_) => None,
    }
}

fn summarize_value(value: Value) -> Value {
    match value {
        Value::Array(values) => match numeric_array_shape(&values) {
            Some(shape) => {
                let mut obj = Map::new();
                obj.insert(
                    "_shape".to_string(),
                    Value::Array(shape.into_iter().map(Value::from).collect()),
                );
                Value::Object(obj)
            }
            None => Value::Array(values.into_iter().map(summarize_value).collect()),
        },
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .filter(|(k, v)| k != "bytes" && !v.is_null())
                .map(|(k, v)| {
                    if k == "shape" {
                        (k, v)
                    } else {
                        (k, summarize_value(v))
                    }
                })
                .collect(),
        ),
        v => v,
    }
}

/// Render a module record as JSON, with tensor payloads dropped.
///
/// Parameter tensors keep their ``shape`` field; other numeric arrays are
/// replaced by ``{"_shape": [..]}``.
pub fn record_shape_summary<B: Backend, R: Record<B>>(record: R) -> serde_json::Result<Value> {
    let item = record.into_item::<HalfPrecisionSettings>();
    Ok(summarize_value(serde_json::to_value(&item)?))
}

/// Total number of scalar parameters listed in a [`record_shape_summary`] value.
pub fn summary_param_count(summary: &Value) -> usize {
    match summary {
        Value::Object(obj) => match obj.get("shape") {
            Some(Value::Array(dims)) if obj.contains_key("dtype") => {
                dims.iter().filter_map(Value::as_u64).product::<u64>() as usize
            }
            _ => obj.values().map(summary_param_count).sum(),
        },
        Value::Array(values) => values.iter().map(summary_param_count).sum(),
        _ => 0,
    }
}
