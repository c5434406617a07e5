//! JSON hygiene.
//!
//! The Pipeline Coordinator routes step-level id lists and error text
//! through [`sanitize_array`]/[`sanitize_object`] before they reach an
//! `ExecutionStep` row. Absent values become `[]`/`{}`, never `null`;
//! malformed strings are wrapped rather than rejected, so a single bad
//! payload never blocks the rest of the pipeline.

use serde_json::{Value as Json, json};

/// Sanitizes a value destined for a JSON array column.
///
/// `None` becomes `[]`. `Some` values are serialized as-is if they already
/// produce a JSON array; anything else is wrapped.
pub fn sanitize_array<T: serde::Serialize>(value: Option<&T>) -> Json {
    match value {
        None => json!([]),
        Some(v) => match serde_json::to_value(v) {
            Ok(Json::Array(arr)) => Json::Array(arr),
            Ok(other) => json!([other]),
            Err(_) => json!([]),
        },
    }
}

/// Sanitizes a value destined for a JSON object column (e.g. `ExecutionStep.metadata`).
///
/// `None` becomes `{}`. A string that isn't valid JSON is wrapped in
/// `{"message": <s>, "error": "invalid_json_format"}` per the design note.
pub fn sanitize_object(value: Option<&str>) -> Json {
    match value {
        None => json!({}),
        Some(s) => match serde_json::from_str::<Json>(s) {
            Ok(Json::Object(map)) => Json::Object(map),
            Ok(_) | Err(_) => json!({"message": s, "error": "invalid_json_format"}),
        },
    }
}

/// Builds step metadata from key/value summary pairs — always a valid JSON object.
pub fn step_metadata(pairs: &[(&str, Json)]) -> Json {
    let mut map = serde_json::Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    Json::Object(map)
}
