//! API request and response data models.
//!
//! These structures define the public HTTP contract and are kept separate from the database
//! models in [`crate::db::models`]. All models are annotated with `utoipa` for the generated
//! OpenAPI document.
//!
//! Create payloads convert into the entity's `*Fields` record; update payloads are applied on
//! top of the stored record, so validation always sees the merged result. Nullable fields in
//! updates use `serde_with::rust::double_option`: an omitted key leaves the column alone, an
//! explicit `null` clears it.
//!
//! - [`profiles`]: the caller and their profile
//! - [`products`]: creator products and catalog views
//! - [`plans`]: billing plans
//! - [`groups`]: endpoint groups
//! - [`endpoints`]: endpoints, bulk delete and import
//! - [`entitlements`]: buyer subscriptions
//! - [`api_keys`]: buyer keys and gateway verification
//! - [`pagination`]: shared `skip`/`limit` handling

pub mod api_keys;
pub mod config;
pub mod endpoints;
pub mod entitlements;
pub mod groups;
pub mod pagination;
pub mod plans;
pub mod products;
pub mod profiles;

/// Trim a free-text form value; blank becomes `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Apply a double-option patch to a nullable text column.
pub(crate) fn patch_text(target: &mut Option<String>, patch: Option<Option<String>>) {
    if let Some(value) = patch {
        *target = non_blank(value);
    }
}

/// Apply a double-option patch to any other nullable column.
pub(crate) fn patch<T>(target: &mut Option<T>, patch: Option<Option<T>>) {
    if let Some(value) = patch {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  weather ".to_string())), Some("weather".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_patch_text_distinguishes_omitted_from_null() {
        let mut value = Some("old".to_string());
        patch_text(&mut value, None);
        assert_eq!(value.as_deref(), Some("old"));
        patch_text(&mut value, Some(Some("new".to_string())));
        assert_eq!(value.as_deref(), Some("new"));
        patch_text(&mut value, Some(None));
        assert_eq!(value, None);
    }
}
