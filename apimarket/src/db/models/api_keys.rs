//! Database models for API keys.

use crate::types::{ApiKeyId, EntitlementId, PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    #[default]
    Active,
    Revoked,
}

/// Database request for creating a new API key. The secret itself is never stored.
#[derive(Debug, Clone)]
pub struct ApiKeyCreateDBRequest {
    pub entitlement_id: EntitlementId,
    pub user_id: UserId,
    pub name: String,
    pub key_hash: String,
    pub key_preview: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Database request for updating an API key
#[derive(Debug, Clone)]
pub struct ApiKeyUpdateDBRequest {
    pub name: Option<String>,
}

/// Database response for an API key
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyDBResponse {
    pub id: ApiKeyId,
    pub entitlement_id: EntitlementId,
    pub user_id: UserId,
    pub name: String,
    pub key_preview: String,
    pub status: ApiKeyStatus,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Everything the gateway needs to decide whether a presented key may be used
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeyVerificationRow {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub status: ApiKeyStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub entitlement_status: crate::db::models::entitlements::EntitlementStatus,
    pub product_id: ProductId,
    pub plan_id: PlanId,
    pub rate_limit: Option<i32>,
}
