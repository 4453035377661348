use super::{FieldErrors, check_http_url, check_name, require_text};
use crate::db::models::products::{ProductFields, ProductStatus, ProductVisibility};

pub const SLUG_MIN_LENGTH: usize = 3;
pub const SLUG_MAX_LENGTH: usize = 64;

/// Validate a product record.
///
/// Drafts need a name. Any other status needs the listing details a buyer sees (slug,
/// description, category) plus the upstream URL the gateway forwards to. A public product
/// cannot be private.
pub fn validate_product(fields: &ProductFields) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    check_name(&mut errors, &fields.name);

    if let Some(slug) = fields.slug.as_deref().filter(|s| !s.is_empty()) {
        check_slug(&mut errors, slug);
    }

    check_http_url(&mut errors, "thumbnail_url", fields.thumbnail_url.as_deref());
    check_http_url(&mut errors, "homepage_url", fields.homepage_url.as_deref());
    check_http_url(&mut errors, "service_endpoint_url", fields.service_endpoint_url.as_deref());

    if let Some(limit) = fields.rate_limit
        && limit <= 0
    {
        errors.add("rate_limit", "Rate limit must be greater than zero");
    }

    if !fields.status.is_draft() {
        require_text(&mut errors, "slug", fields.slug.as_deref(), "Slug");
        require_text(&mut errors, "description", fields.description.as_deref(), "Description");
        require_text(&mut errors, "category", fields.category.as_deref(), "Category");
        require_text(
            &mut errors,
            "service_endpoint_url",
            fields.service_endpoint_url.as_deref(),
            "Service endpoint URL",
        );
    }

    if fields.status == ProductStatus::Public && fields.visibility == ProductVisibility::Private {
        errors.add("visibility", "A public product cannot have private visibility");
    }

    errors.into_result()
}

fn check_slug(errors: &mut FieldErrors, slug: &str) {
    let length = slug.len();
    if !(SLUG_MIN_LENGTH..=SLUG_MAX_LENGTH).contains(&length) {
        errors.add(
            "slug",
            format!("Slug must be between {SLUG_MIN_LENGTH} and {SLUG_MAX_LENGTH} characters"),
        );
    } else if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        errors.add("slug", "Slug may only contain lowercase letters, digits and hyphens");
    } else if slug.starts_with('-') || slug.ends_with('-') {
        errors.add("slug", "Slug cannot start or end with a hyphen");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed_product() -> ProductFields {
        ProductFields {
            name: "Weather API".to_string(),
            description: Some("Forecasts for any coordinate".to_string()),
            slug: Some("weather-api".to_string()),
            category: Some("data".to_string()),
            status: ProductStatus::Public,
            visibility: ProductVisibility::Public,
            service_endpoint_url: Some("https://weather.example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_needs_only_name() {
        let fields = ProductFields {
            name: "Scratch".to_string(),
            ..Default::default()
        };
        assert!(validate_product(&fields).is_ok());
    }

    #[test]
    fn test_blank_name_rejected() {
        let fields = ProductFields {
            name: "   ".to_string(),
            ..Default::default()
        };
        let errors = validate_product(&fields).unwrap_err();
        assert_eq!(errors.get("name"), Some("Name is required"));
    }

    #[test]
    fn test_complete_public_product_accepted() {
        assert!(validate_product(&listed_product()).is_ok());
    }

    #[test]
    fn test_non_draft_requires_listing_fields() {
        for status in [
            ProductStatus::Preview,
            ProductStatus::Public,
            ProductStatus::Deprecated,
            ProductStatus::Disabled,
        ] {
            let fields = ProductFields {
                name: "Weather API".to_string(),
                status,
                visibility: ProductVisibility::Public,
                ..Default::default()
            };
            let errors = validate_product(&fields).unwrap_err();
            for field in ["slug", "description", "category", "service_endpoint_url"] {
                assert!(errors.contains(field), "{status:?} should require {field}");
            }
        }
    }

    #[test]
    fn test_public_cannot_be_private() {
        let fields = ProductFields {
            visibility: ProductVisibility::Private,
            ..listed_product()
        };
        let errors = validate_product(&fields).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("visibility"));

        let preview = ProductFields {
            status: ProductStatus::Preview,
            ..fields
        };
        assert!(validate_product(&preview).is_ok());
    }

    #[test]
    fn test_slug_format() {
        let too_long = "a".repeat(65);
        for bad in ["ab", "Weather", "weather_api", "-weather", "weather-", too_long.as_str()] {
            let fields = ProductFields {
                slug: Some(bad.to_string()),
                ..listed_product()
            };
            assert!(validate_product(&fields).unwrap_err().contains("slug"), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rate_limit_must_be_positive() {
        let fields = ProductFields {
            rate_limit: Some(0),
            ..listed_product()
        };
        assert!(validate_product(&fields).unwrap_err().contains("rate_limit"));
    }
}
