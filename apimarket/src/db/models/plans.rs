//! Database models for plans.

use crate::types::{PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How a plan charges its buyers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    /// Recurring flat fee billed through a Stripe price
    #[default]
    Subscription,
    /// Up-front payment for a fixed request quota
    Prepaid,
    /// Pay per request, optionally capped
    Metered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanFields {
    pub name: String,
    pub description: Option<String>,
    pub billing_type: BillingType,
    pub status: PlanStatus,
    pub stripe_price_id: Option<String>,
    pub billing_interval: Option<BillingInterval>,
    pub price: Option<Decimal>,
    pub included_quota: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub spend_cap: Option<Decimal>,
    pub quota_cap: Option<i64>,
}

/// Database request for creating a new plan
#[derive(Debug, Clone)]
pub struct PlanCreateDBRequest {
    pub product_id: ProductId,
    pub owner_id: UserId,
    pub fields: PlanFields,
}

/// Database request for updating a plan
#[derive(Debug, Clone)]
pub struct PlanUpdateDBRequest {
    pub fields: PlanFields,
}

/// Database response for a plan
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanDBResponse {
    pub id: PlanId,
    pub product_id: ProductId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub billing_type: BillingType,
    pub status: PlanStatus,
    pub stripe_price_id: Option<String>,
    pub billing_interval: Option<BillingInterval>,
    pub price: Option<Decimal>,
    pub included_quota: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub spend_cap: Option<Decimal>,
    pub quota_cap: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanDBResponse {
    pub fn fields(&self) -> PlanFields {
        PlanFields {
            name: self.name.clone(),
            description: self.description.clone(),
            billing_type: self.billing_type,
            status: self.status,
            stripe_price_id: self.stripe_price_id.clone(),
            billing_interval: self.billing_interval,
            price: self.price,
            included_quota: self.included_quota,
            unit_price: self.unit_price,
            spend_cap: self.spend_cap,
            quota_cap: self.quota_cap,
        }
    }
}
