//! Database models for products.

use crate::types::{ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Product lifecycle status. Only `draft` products may omit their listing details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Preview,
    Public,
    Deprecated,
    Disabled,
}

impl ProductStatus {
    pub fn is_draft(&self) -> bool {
        matches!(self, ProductStatus::Draft)
    }

    /// Statuses under which a product appears in the catalog and accepts subscriptions
    pub fn is_listed(&self) -> bool {
        matches!(self, ProductStatus::Preview | ProductStatus::Public)
    }
}

/// Who can discover a product in the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductVisibility {
    Public,
    Unlisted,
    #[default]
    Private,
}

/// Every editable column of a product. Creates insert it, updates overwrite it after merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFields {
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
}

/// Database request for creating a new product
#[derive(Debug, Clone)]
pub struct ProductCreateDBRequest {
    pub owner_id: UserId,
    pub fields: ProductFields,
}

/// Database request for updating a product
#[derive(Debug, Clone)]
pub struct ProductUpdateDBRequest {
    pub fields: ProductFields,
}

/// Database response for a product
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductDBResponse {
    pub id: ProductId,
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

impl ProductDBResponse {
    pub fn fields(&self) -> ProductFields {
        ProductFields {
            name: self.name.clone(),
            description: self.description.clone(),
            slug: self.slug.clone(),
            category: self.category.clone(),
            status: self.status,
            visibility: self.visibility,
            thumbnail_url: self.thumbnail_url.clone(),
            homepage_url: self.homepage_url.clone(),
            service_endpoint_url: self.service_endpoint_url.clone(),
            rate_limit: self.rate_limit,
        }
    }
}
