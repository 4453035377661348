//! Database models for entitlements (buyer subscriptions).

use crate::types::{EntitlementId, PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    #[default]
    Active,
    Trialing,
    Cancelled,
}

impl EntitlementStatus {
    /// Whether keys minted against the entitlement may be used
    pub fn is_open(&self) -> bool {
        matches!(self, EntitlementStatus::Active | EntitlementStatus::Trialing)
    }
}

/// Database request for creating a new entitlement
#[derive(Debug, Clone)]
pub struct EntitlementCreateDBRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub plan_id: PlanId,
    pub status: EntitlementStatus,
}

/// Database response for an entitlement, joined with product and plan names for display
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntitlementDBResponse {
    pub id: EntitlementId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub plan_id: PlanId,
    pub status: EntitlementStatus,
    pub product_name: String,
    pub plan_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Outcome of cancelling an entitlement
#[derive(Debug, Clone)]
pub struct EntitlementCancellation {
    pub entitlement: EntitlementDBResponse,
    pub revoked_keys: u64,
}
