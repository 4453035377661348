//! API request/response models for plans.

use super::{non_blank, patch, patch_text};
use crate::db::models::plans::{BillingInterval, BillingType, PlanDBResponse, PlanFields, PlanStatus};
use crate::types::{PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

/// Request body for creating a plan under a product
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PlanCreate {
    #[serde(default)]
    #[schema(example = "Starter")]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `subscription`
    pub billing_type: Option<BillingType>,
    /// Defaults to `draft`
    pub status: Option<PlanStatus>,
    #[schema(example = "price_1PqXYZ")]
    pub stripe_price_id: Option<String>,
    pub billing_interval: Option<BillingInterval>,
    #[schema(value_type = Option<String>, example = "19.00")]
    pub price: Option<Decimal>,
    pub included_quota: Option<i64>,
    #[schema(value_type = Option<String>, example = "0.002")]
    pub unit_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub spend_cap: Option<Decimal>,
    pub quota_cap: Option<i64>,
}

impl From<PlanCreate> for PlanFields {
    fn from(create: PlanCreate) -> Self {
        Self {
            name: create.name.trim().to_string(),
            description: non_blank(create.description),
            billing_type: create.billing_type.unwrap_or_default(),
            status: create.status.unwrap_or_default(),
            stripe_price_id: non_blank(create.stripe_price_id),
            billing_interval: create.billing_interval,
            price: create.price,
            included_quota: create.included_quota,
            unit_price: create.unit_price,
            spend_cap: create.spend_cap,
            quota_cap: create.quota_cap,
        }
    }
}

/// Request body for updating a plan. Only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PlanUpdate {
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub billing_type: Option<BillingType>,
    pub status: Option<PlanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub stripe_price_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<BillingInterval>)]
    pub billing_interval: Option<Option<BillingInterval>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub price: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub included_quota: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub spend_cap: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub quota_cap: Option<Option<i64>>,
}

impl PlanUpdate {
    pub fn apply(self, fields: &mut PlanFields) {
        if let Some(name) = self.name {
            fields.name = name.trim().to_string();
        }
        patch_text(&mut fields.description, self.description);
        if let Some(billing_type) = self.billing_type {
            fields.billing_type = billing_type;
        }
        if let Some(status) = self.status {
            fields.status = status;
        }
        patch_text(&mut fields.stripe_price_id, self.stripe_price_id);
        patch(&mut fields.billing_interval, self.billing_interval);
        patch(&mut fields.price, self.price);
        patch(&mut fields.included_quota, self.included_quota);
        patch(&mut fields.unit_price, self.unit_price);
        patch(&mut fields.spend_cap, self.spend_cap);
        patch(&mut fields.quota_cap, self.quota_cap);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PlanId,
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub billing_type: BillingType,
    pub status: PlanStatus,
    pub stripe_price_id: Option<String>,
    pub billing_interval: Option<BillingInterval>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub included_quota: Option<i64>,
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub spend_cap: Option<Decimal>,
    pub quota_cap: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanDBResponse> for PlanResponse {
    fn from(db: PlanDBResponse) -> Self {
        Self {
            id: db.id,
            product_id: db.product_id,
            owner_id: db.owner_id,
            name: db.name,
            description: db.description,
            billing_type: db.billing_type,
            status: db.status,
            stripe_price_id: db.stripe_price_id,
            billing_interval: db.billing_interval,
            price: db.price,
            included_quota: db.included_quota,
            unit_price: db.unit_price,
            spend_cap: db.spend_cap,
            quota_cap: db.quota_cap,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prices_accept_numbers_and_strings() {
        let create: PlanCreate = serde_json::from_value(json!({
            "name": "Pay as you go",
            "billing_type": "metered",
            "unit_price": "0.002",
            "spend_cap": 50
        }))
        .unwrap();
        let fields = PlanFields::from(create);
        assert_eq!(fields.unit_price, Some(Decimal::new(2, 3)));
        assert_eq!(fields.spend_cap, Some(Decimal::new(50, 0)));
        assert_eq!(fields.status, PlanStatus::Draft);
    }

    #[test]
    fn test_update_clears_nullable_fields() {
        let mut fields = PlanFields {
            name: "Pro".to_string(),
            spend_cap: Some(Decimal::new(10, 0)),
            quota_cap: Some(100),
            ..Default::default()
        };
        let update: PlanUpdate = serde_json::from_value(json!({ "spend_cap": null })).unwrap();
        update.apply(&mut fields);
        assert_eq!(fields.spend_cap, None);
        assert_eq!(fields.quota_cap, Some(100));
    }
}
