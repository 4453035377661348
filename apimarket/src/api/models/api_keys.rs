//! API request/response models for buyer API keys and gateway verification.

use super::pagination::Pagination;
use crate::db::models::api_keys::{ApiKeyDBResponse, ApiKeyStatus};
use crate::types::{ApiKeyId, EntitlementId, PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreate {
    #[serde(default)]
    #[schema(example = "production")]
    pub name: String,
    /// Lifetime such as `30days` or `12h`; the configured default applies when omitted
    #[serde(default, with = "humantime_serde")]
    #[schema(value_type = Option<String>, example = "90days")]
    pub expires_in: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyUpdate {
    pub name: Option<String>,
}

/// Key metadata. The secret is never returned after creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ApiKeyId,
    #[schema(value_type = String, format = "uuid")]
    pub entitlement_id: EntitlementId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub name: String,
    #[schema(example = "mk_live_Xk3f9A…")]
    pub key_preview: String,
    pub status: ApiKeyStatus,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKeyDBResponse> for ApiKeyResponse {
    fn from(db: ApiKeyDBResponse) -> Self {
        Self {
            id: db.id,
            entitlement_id: db.entitlement_id,
            user_id: db.user_id,
            name: db.name,
            key_preview: db.key_preview,
            status: db.status,
            last_used_at: db.last_used_at,
            expires_at: db.expires_at,
            created_at: db.created_at,
        }
    }
}

/// Returned once, at creation: the only time the full key is visible
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreatedResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub key: String,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListApiKeysQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<ApiKeyStatus>,
}

/// Gateway request: the raw key presented by a buyer
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KeyVerifyRequest {
    pub key: String,
}

/// Why a key was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyRejection {
    Unknown,
    Revoked,
    Expired,
    EntitlementInactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KeyVerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<KeyRejection>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub product_id: Option<ProductId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<PlanId>,
    /// Requests per minute, from the product
    pub rate_limit: Option<i32>,
}

impl KeyVerifyResponse {
    pub fn rejected(reason: KeyRejection) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            user_id: None,
            product_id: None,
            plan_id: None,
            rate_limit: None,
        }
    }
}
