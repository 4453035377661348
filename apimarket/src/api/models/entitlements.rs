//! API request/response models for entitlements (buyer subscriptions).

use super::pagination::Pagination;
use crate::db::models::entitlements::{EntitlementDBResponse, EntitlementStatus};
use crate::types::{EntitlementId, PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Subscribe the caller to a plan
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionCreate {
    #[schema(value_type = String, format = "uuid")]
    pub plan_id: PlanId,
    /// Start in `trialing` rather than `active`
    #[serde(default)]
    pub trial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntitlementResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EntitlementId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    #[schema(value_type = String, format = "uuid")]
    pub plan_id: PlanId,
    pub status: EntitlementStatus,
    pub product_name: String,
    pub plan_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<EntitlementDBResponse> for EntitlementResponse {
    fn from(db: EntitlementDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            product_id: db.product_id,
            plan_id: db.plan_id,
            status: db.status,
            product_name: db.product_name,
            plan_name: db.plan_name,
            created_at: db.created_at,
            updated_at: db.updated_at,
            cancelled_at: db.cancelled_at,
        }
    }
}

/// Cancellation result, including how many keys were revoked with it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntitlementCancelResponse {
    #[serde(flatten)]
    pub entitlement: EntitlementResponse,
    pub revoked_keys: u64,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListEntitlementsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<EntitlementStatus>,
}
