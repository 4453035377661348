use super::{FieldErrors, canonicalize_json_object, check_name, is_blank};
use crate::db::models::endpoint_groups::{AuthType, GroupFields, GroupStatus};

/// Validate an endpoint group, canonicalizing `injection_config` to a JSON object.
///
/// Active and disabled groups must say how the gateway authenticates upstream, and every
/// auth type other than `none` needs a secret reference to pull the credential from.
pub fn validate_group(fields: &mut GroupFields) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    check_name(&mut errors, &fields.name);
    canonicalize_json_object(&mut errors, "injection_config", &mut fields.injection_config);

    if fields.status != GroupStatus::Draft {
        match fields.auth_type {
            None => errors.add("auth_type", "Auth type is required"),
            Some(AuthType::None) => {}
            Some(_) => {
                if is_blank(fields.secret_ref.as_deref()) {
                    errors.add("secret_ref", "Secret reference is required for authenticated groups");
                }
            }
        }
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn group(status: GroupStatus) -> GroupFields {
        GroupFields {
            name: "Forecasts".to_string(),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_group_needs_only_name() {
        assert!(validate_group(&mut group(GroupStatus::Draft)).is_ok());
    }

    #[test]
    fn test_active_group_requires_auth_type() {
        let errors = validate_group(&mut group(GroupStatus::Active)).unwrap_err();
        assert!(errors.contains("auth_type"));
    }

    #[test]
    fn test_authenticated_group_requires_secret_ref() {
        let mut fields = GroupFields {
            auth_type: Some(AuthType::Bearer),
            ..group(GroupStatus::Disabled)
        };
        let errors = validate_group(&mut fields).unwrap_err();
        assert!(errors.contains("secret_ref"));

        fields.secret_ref = Some("vault://weather/upstream".to_string());
        assert!(validate_group(&mut fields).is_ok());
    }

    #[test]
    fn test_open_group_needs_no_secret() {
        let mut fields = GroupFields {
            auth_type: Some(AuthType::None),
            ..group(GroupStatus::Active)
        };
        assert!(validate_group(&mut fields).is_ok());
    }

    #[test]
    fn test_injection_config_text_is_parsed() {
        let mut fields = GroupFields {
            injection_config: Some(Value::String(r#"{"header": "X-Api-Key"}"#.to_string())),
            ..group(GroupStatus::Draft)
        };
        assert!(validate_group(&mut fields).is_ok());
        assert_eq!(fields.injection_config, Some(json!({ "header": "X-Api-Key" })));
    }

    #[test]
    fn test_injection_config_must_be_object() {
        let mut fields = GroupFields {
            injection_config: Some(Value::String("\"header\"".to_string())),
            ..group(GroupStatus::Draft)
        };
        let errors = validate_group(&mut fields).unwrap_err();
        assert!(errors.contains("injection_config"));
    }
}
