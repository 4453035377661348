//! Reconciles endpoint rows that use inconsistent column names.
//!
//! Imported rows come from spreadsheets, older exports and hand-written JSON, so the same field
//! shows up under several names (`http_method`, `verb`, `method`, ...). Normalization maps each
//! alias onto its canonical field before the row is deserialized and validated like any other
//! endpoint payload.

use serde_json::{Map, Value};

/// Canonical field followed by its aliases, in priority order
const ENDPOINT_ALIASES: &[(&str, &[&str])] = &[
    ("name", &["endpoint_name", "title"]),
    ("path", &["endpoint_path", "route", "url_path"]),
    ("method", &["http_method", "verb"]),
    ("group_id", &["endpoint_group_id", "group"]),
    ("plan_id", &["plan"]),
    ("is_primary", &["primary", "isPrimary"]),
    ("input_schema", &["request_schema", "inputSchema"]),
    ("output_schema", &["response_schema", "outputSchema"]),
    ("description", &["summary", "desc"]),
];

const SCHEMA_FIELDS: &[&str] = &["input_schema", "output_schema"];

/// Normalize an endpoint row.
///
/// For every canonical field that is absent or null, the first present non-null alias is
/// copied in. Alias keys are removed from the output so the result deserializes into the
/// endpoint payload type. Methods are upper-cased and schema objects are serialized to JSON
/// text so they go through the same parsing as schemas submitted as text.
pub fn normalize_endpoint_row(mut row: Map<String, Value>) -> Map<String, Value> {
    for (canonical, aliases) in ENDPOINT_ALIASES {
        let mut resolved = row.remove(*canonical).filter(|v| !v.is_null());
        for alias in *aliases {
            let value = row.remove(*alias).filter(|v| !v.is_null());
            if resolved.is_none() {
                resolved = value;
            }
        }
        if let Some(value) = resolved {
            row.insert(canonical.to_string(), value);
        }
    }

    if let Some(Value::String(method)) = row.get_mut("method") {
        *method = method.trim().to_ascii_uppercase();
    }

    for field in SCHEMA_FIELDS {
        if let Some(value) = row.get_mut(*field)
            && (value.is_object() || value.is_array())
        {
            *value = Value::String(value.to_string());
        }
    }

    if let Some(flag) = row.get_mut("is_primary") {
        *flag = coerce_bool(flag);
    }

    row
}

/// Spreadsheet exports carry booleans as text ("true", "yes", "1")
fn coerce_bool(value: &Value) -> Value {
    match value {
        Value::Bool(_) => value.clone(),
        Value::Number(n) => Value::Bool(n.as_i64().is_some_and(|n| n != 0)),
        Value::String(s) => Value::Bool(matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1")),
        _ => Value::Bool(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn test_aliases_fill_missing_canonical_fields() {
        let normalized = normalize_endpoint_row(row(json!({
            "endpoint_name": "Forecast",
            "route": "/v1/forecast",
            "http_method": "get",
            "endpoint_group_id": "b7c1f6a2-8d3e-4f50-9a1b-2c3d4e5f6a7b",
            "summary": "Seven day forecast",
        })));

        assert_eq!(
            Value::Object(normalized),
            json!({
                "name": "Forecast",
                "path": "/v1/forecast",
                "method": "GET",
                "group_id": "b7c1f6a2-8d3e-4f50-9a1b-2c3d4e5f6a7b",
                "description": "Seven day forecast",
            })
        );
    }

    #[test]
    fn test_canonical_field_wins_over_alias() {
        let normalized = normalize_endpoint_row(row(json!({
            "name": "Canonical",
            "title": "Alias",
        })));
        assert_eq!(normalized.get("name"), Some(&json!("Canonical")));
        assert!(!normalized.contains_key("title"));
    }

    #[test]
    fn test_null_canonical_is_replaced_by_alias() {
        let normalized = normalize_endpoint_row(row(json!({
            "path": null,
            "endpoint_path": null,
            "url_path": "/status",
        })));
        assert_eq!(normalized.get("path"), Some(&json!("/status")));
    }

    #[test]
    fn test_alias_priority_order() {
        let normalized = normalize_endpoint_row(row(json!({
            "verb": "post",
            "http_method": "put",
        })));
        assert_eq!(normalized.get("method"), Some(&json!("PUT")));
    }

    #[test]
    fn test_schema_objects_serialized_to_text() {
        let normalized = normalize_endpoint_row(row(json!({
            "name": "Forecast",
            "requestSchema": "ignored, not an alias",
            "inputSchema": { "type": "object" },
            "response_schema": "{\"type\":\"array\"}",
        })));
        assert_eq!(normalized.get("input_schema"), Some(&json!("{\"type\":\"object\"}")));
        assert_eq!(normalized.get("output_schema"), Some(&json!("{\"type\":\"array\"}")));
        assert!(normalized.contains_key("requestSchema"));
    }

    #[test]
    fn test_primary_flag_coerced() {
        let normalized = normalize_endpoint_row(row(json!({ "isPrimary": "Yes" })));
        assert_eq!(normalized.get("is_primary"), Some(&json!(true)));

        let normalized = normalize_endpoint_row(row(json!({ "primary": 0 })));
        assert_eq!(normalized.get("is_primary"), Some(&json!(false)));
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let normalized = normalize_endpoint_row(row(json!({ "name": "Only name" })));
        assert_eq!(normalized.len(), 1);
    }
}
