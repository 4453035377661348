//! OpenAPI documentation for the management API at `/api/v1/*`.
//!
//! The gateway route under `/internal/v1` is not part of this document.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};
use crate::db::models as db_models;

/// Bearer JWTs for API clients, the session cookie for browsers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token issued by the identity provider:\n\n\
                            ```\nAuthorization: Bearer YOUR_ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "apimarket_access_token",
                    "Browser session cookie carrying the same access token",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Management API")
    ),
    modifiers(&SecurityAddon),
    paths(
        handlers::config::get_config,
        handlers::profiles::sync_current_profile,
        handlers::profiles::get_profile,
        handlers::profiles::update_profile,
        handlers::catalog::list_catalog_products,
        handlers::catalog::get_catalog_product,
        handlers::catalog::list_categories,
        handlers::products::list_products,
        handlers::products::create_product,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::plans::list_plans,
        handlers::plans::create_plan,
        handlers::plans::get_plan,
        handlers::plans::update_plan,
        handlers::plans::delete_plan,
        handlers::plans::list_plan_groups,
        handlers::plans::link_plan_group,
        handlers::plans::unlink_plan_group,
        handlers::groups::list_groups,
        handlers::groups::create_group,
        handlers::groups::get_group,
        handlers::groups::update_group,
        handlers::groups::delete_group,
        handlers::endpoints::list_endpoints,
        handlers::endpoints::list_group_endpoints,
        handlers::endpoints::create_endpoint,
        handlers::endpoints::get_endpoint,
        handlers::endpoints::update_endpoint,
        handlers::endpoints::delete_endpoint,
        handlers::endpoints::bulk_delete_endpoints,
        handlers::endpoints::import_endpoints,
        handlers::entitlements::subscribe,
        handlers::entitlements::list_my_entitlements,
        handlers::entitlements::cancel_entitlement,
        handlers::api_keys::create_api_key,
        handlers::api_keys::list_my_api_keys,
        handlers::api_keys::update_api_key,
        handlers::api_keys::revoke_api_key,
    ),
    components(
        schemas(
            models::config::ConfigResponse,
            models::profiles::ProfileResponse,
            models::profiles::ProfileUpdate,
            models::products::ProductCreate,
            models::products::ProductUpdate,
            models::products::ProductResponse,
            models::products::CatalogProduct,
            models::products::CatalogProductDetail,
            models::plans::PlanCreate,
            models::plans::PlanUpdate,
            models::plans::PlanResponse,
            models::groups::GroupCreate,
            models::groups::GroupUpdate,
            models::groups::GroupResponse,
            models::groups::GroupDeleteResponse,
            models::endpoints::EndpointCreate,
            models::endpoints::EndpointUpdate,
            models::endpoints::EndpointResponse,
            models::endpoints::CatalogEndpoint,
            models::endpoints::BulkDeleteRequest,
            models::endpoints::BulkDeleteResponse,
            models::endpoints::BulkDeleteFailure,
            models::endpoints::EndpointImportRequest,
            models::endpoints::EndpointImportResponse,
            models::endpoints::EndpointImportResult,
            models::entitlements::SubscriptionCreate,
            models::entitlements::EntitlementResponse,
            models::entitlements::EntitlementCancelResponse,
            models::api_keys::ApiKeyCreate,
            models::api_keys::ApiKeyUpdate,
            models::api_keys::ApiKeyResponse,
            models::api_keys::ApiKeyCreatedResponse,
            db_models::products::ProductStatus,
            db_models::products::ProductVisibility,
            db_models::plans::PlanStatus,
            db_models::plans::BillingType,
            db_models::plans::BillingInterval,
            db_models::endpoint_groups::GroupStatus,
            db_models::endpoint_groups::AuthType,
            db_models::endpoints::HttpMethod,
            db_models::endpoints::EndpointVisibility,
            db_models::entitlements::EntitlementStatus,
            db_models::api_keys::ApiKeyStatus,
        )
    ),
    tags(
        (name = "config", description = "Public deployment settings for frontends."),
        (name = "profile", description = "The caller's marketplace profile, mirrored from the identity provider."),
        (name = "catalog", description = "Public, unauthenticated browsing of listed products.

Listings show products in `preview` or `public` state with `public` visibility. Unlisted products resolve by slug only. Creator-only fields such as the upstream service URL are never exposed."),
        (name = "products", description = "Create and manage the products you sell.

Products start as `draft` and only need a name. Moving a product out of draft requires a slug, description, category and service endpoint URL."),
        (name = "plans", description = "Billing plans attached to a product, and the endpoint groups each plan grants access to."),
        (name = "groups", description = "Endpoint groups bundle endpoints under one upstream authentication scheme."),
        (name = "endpoints", description = "Individual API endpoints, including bulk delete and row-by-row import."),
        (name = "subscriptions", description = "Buyer entitlements. A buyer holds at most one open entitlement per product."),
        (name = "api_keys", description = "Keys buyers present to the gateway. The full key is shown once, at creation."),
    ),
    info(
        title = "API Marketplace",
        version = "1.0.0",
        description = "Management API for a two-sided API marketplace.

Creators publish products, plans, endpoint groups and endpoints. Buyers browse the catalog, subscribe to plans and mint API keys.

## Authentication

Send the identity provider's access token as `Authorization: Bearer <token>`, or as the session cookie in a browser.

## Errors

Validation failures return `422` with per-field messages:

```json
{
  \"message\": \"Validation failed\",
  \"field_errors\": { \"slug\": \"This slug is already taken by another product\" }
}
```",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_management_routes_only() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/products/{id}"));
        assert!(doc.paths.paths.contains_key("/catalog/products/{slug}"));
        assert!(!doc.paths.paths.keys().any(|path| path.contains("verify")));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("BearerAuth"));
        assert!(components.security_schemes.contains_key("CookieAuth"));
    }
}
