//! API request/response models for products and the public catalog.

use super::pagination::Pagination;
use super::{non_blank, patch, patch_text};
use crate::api::models::endpoints::CatalogEndpoint;
use crate::api::models::plans::PlanResponse;
use crate::db::models::products::{ProductDBResponse, ProductFields, ProductStatus, ProductVisibility};
use crate::types::{ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

/// Request body for creating a product
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductCreate {
    #[serde(default)]
    #[schema(example = "Weather API")]
    pub name: String,
    pub description: Option<String>,
    /// Lowercase letters, digits and dashes; unique across the marketplace
    #[schema(example = "weather-api")]
    pub slug: Option<String>,
    pub category: Option<String>,
    /// Defaults to `draft`
    pub status: Option<ProductStatus>,
    /// Defaults to `private`
    pub visibility: Option<ProductVisibility>,
    pub thumbnail_url: Option<String>,
    pub homepage_url: Option<String>,
    /// Upstream base URL the gateway forwards to
    pub service_endpoint_url: Option<String>,
    /// Requests per minute per key
    pub rate_limit: Option<i32>,
}

impl From<ProductCreate> for ProductFields {
    fn from(create: ProductCreate) -> Self {
        Self {
            name: create.name.trim().to_string(),
            description: non_blank(create.description),
            slug: non_blank(create.slug),
            category: non_blank(create.category),
            status: create.status.unwrap_or_default(),
            visibility: create.visibility.unwrap_or_default(),
            thumbnail_url: non_blank(create.thumbnail_url),
            homepage_url: non_blank(create.homepage_url),
            service_endpoint_url: non_blank(create.service_endpoint_url),
            rate_limit: create.rate_limit,
        }
    }
}

/// Request body for updating a product. Only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductUpdate {
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub slug: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub category: Option<Option<String>>,
    pub status: Option<ProductStatus>,
    pub visibility: Option<ProductVisibility>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub thumbnail_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub homepage_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub service_endpoint_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub rate_limit: Option<Option<i32>>,
}

impl ProductUpdate {
    pub fn apply(self, fields: &mut ProductFields) {
        if let Some(name) = self.name {
            fields.name = name.trim().to_string();
        }
        patch_text(&mut fields.description, self.description);
        patch_text(&mut fields.slug, self.slug);
        patch_text(&mut fields.category, self.category);
        if let Some(status) = self.status {
            fields.status = status;
        }
        if let Some(visibility) = self.visibility {
            fields.visibility = visibility;
        }
        patch_text(&mut fields.thumbnail_url, self.thumbnail_url);
        patch_text(&mut fields.homepage_url, self.homepage_url);
        patch_text(&mut fields.service_endpoint_url, self.service_endpoint_url);
        patch(&mut fields.rate_limit, self.rate_limit);
    }
}

/// Product as seen by its creator
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProductId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub status: ProductStatus,
    pub visibility: ProductVisibility,
    pub thumbnail_url: Option<String>,
    pub homepage_url: Option<String>,
    pub service_endpoint_url: Option<String>,
    pub rate_limit: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductDBResponse> for ProductResponse {
    fn from(db: ProductDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            name: db.name,
            description: db.description,
            slug: db.slug,
            category: db.category,
            status: db.status,
            visibility: db.visibility,
            thumbnail_url: db.thumbnail_url,
            homepage_url: db.homepage_url,
            service_endpoint_url: db.service_endpoint_url,
            rate_limit: db.rate_limit,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing the caller's products
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListProductsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<ProductStatus>,

    /// Case-insensitive substring match on name or description
    pub search: Option<String>,
}

/// Query parameters for browsing the catalog
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct CatalogQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub category: Option<String>,

    /// Case-insensitive substring match on name or description
    pub search: Option<String>,
}

/// Product as listed in the catalog. Upstream details stay private to the creator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogProduct {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub status: ProductStatus,
    pub thumbnail_url: Option<String>,
    pub homepage_url: Option<String>,
    pub rate_limit: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductDBResponse> for CatalogProduct {
    fn from(db: ProductDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            slug: db.slug,
            category: db.category,
            status: db.status,
            thumbnail_url: db.thumbnail_url,
            homepage_url: db.homepage_url,
            rate_limit: db.rate_limit,
            updated_at: db.updated_at,
        }
    }
}

/// Catalog detail page: the product, its purchasable plans and its published endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogProductDetail {
    #[serde(flatten)]
    pub product: CatalogProduct,
    pub plans: Vec<PlanResponse>,
    pub endpoints: Vec<CatalogEndpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_applies_only_provided_fields() {
        let mut fields = ProductFields {
            name: "Weather".to_string(),
            description: Some("Forecasts".to_string()),
            category: Some("data".to_string()),
            ..Default::default()
        };
        let update: ProductUpdate = serde_json::from_value(json!({
            "name": " Weather Pro ",
            "description": null,
            "status": "preview"
        }))
        .unwrap();
        update.apply(&mut fields);

        assert_eq!(fields.name, "Weather Pro");
        assert_eq!(fields.description, None);
        assert_eq!(fields.category.as_deref(), Some("data"));
        assert_eq!(fields.status, ProductStatus::Preview);
    }

    #[test]
    fn test_create_defaults_to_private_draft() {
        let fields = ProductFields::from(ProductCreate {
            name: "Weather".to_string(),
            slug: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(fields.status, ProductStatus::Draft);
        assert_eq!(fields.visibility, ProductVisibility::Private);
        assert_eq!(fields.slug, None);
    }
}
