use super::{FieldErrors, canonicalize_json_object, check_name, require_text};
use crate::db::models::endpoints::EndpointFields;

/// Validate an endpoint, canonicalizing its input/output schemas to JSON objects.
///
/// A draft endpoint may be nothing but a name. Once it moves past draft it must be routable:
/// a path starting with `/`, an HTTP method and the group that carries its credentials.
pub fn validate_endpoint(fields: &mut EndpointFields) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    check_name(&mut errors, &fields.name);
    canonicalize_json_object(&mut errors, "input_schema", &mut fields.input_schema);
    canonicalize_json_object(&mut errors, "output_schema", &mut fields.output_schema);

    if let Some(path) = fields.path.as_deref().filter(|p| !p.trim().is_empty())
        && !path.starts_with('/')
    {
        errors.add("path", "Path must start with '/'");
    }

    if !fields.status.is_draft() {
        require_text(&mut errors, "path", fields.path.as_deref(), "Path");
        if fields.method.is_none() {
            errors.add("method", "HTTP method is required");
        }
        if fields.group_id.is_none() {
            errors.add("group_id", "Endpoint group is required");
        }
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::endpoints::{EndpointStatus, HttpMethod};
    use serde_json::{Value, json};
    use uuid::Uuid;

    fn named(status: EndpointStatus) -> EndpointFields {
        EndpointFields {
            name: "Current conditions".to_string(),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_endpoint_with_only_name_accepted() {
        assert!(validate_endpoint(&mut named(EndpointStatus::Draft)).is_ok());
    }

    #[test]
    fn test_public_endpoint_without_path_rejected() {
        let mut fields = EndpointFields {
            method: Some(HttpMethod::Get),
            group_id: Some(Uuid::new_v4()),
            ..named(EndpointStatus::Public)
        };
        let errors = validate_endpoint(&mut fields).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("path"), Some("Path is required"));
    }

    #[test]
    fn test_non_draft_requires_route_fields() {
        for status in [
            EndpointStatus::Preview,
            EndpointStatus::Public,
            EndpointStatus::Deprecated,
            EndpointStatus::Disabled,
        ] {
            let errors = validate_endpoint(&mut named(status)).unwrap_err();
            for field in ["path", "method", "group_id"] {
                assert!(errors.contains(field), "{status:?} should require {field}");
            }
        }
    }

    #[test]
    fn test_path_must_be_absolute() {
        let mut fields = EndpointFields {
            path: Some("v1/current".to_string()),
            ..named(EndpointStatus::Draft)
        };
        assert!(validate_endpoint(&mut fields).unwrap_err().contains("path"));
    }

    #[test]
    fn test_malformed_schema_rejected_even_for_drafts() {
        let mut fields = EndpointFields {
            output_schema: Some(Value::String("{\"type\": ".to_string())),
            ..named(EndpointStatus::Draft)
        };
        let errors = validate_endpoint(&mut fields).unwrap_err();
        assert!(errors.contains("output_schema"));
        assert!(!errors.contains("input_schema"));
    }

    #[test]
    fn test_schema_text_canonicalized() {
        let mut fields = EndpointFields {
            input_schema: Some(Value::String(r#"{"type":"object","properties":{}}"#.to_string())),
            ..named(EndpointStatus::Draft)
        };
        validate_endpoint(&mut fields).unwrap();
        assert_eq!(fields.input_schema, Some(json!({ "type": "object", "properties": {} })));
    }
}
