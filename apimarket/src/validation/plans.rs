use super::{FieldErrors, check_name};
use crate::db::models::plans::{BillingType, PlanFields, PlanStatus};
use rust_decimal::Decimal;

pub const STRIPE_PRICE_PREFIX: &str = "price_";

/// Validate a plan record against the rule set for its (status, billing type) pair.
pub fn validate_plan(fields: &PlanFields) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    check_name(&mut errors, &fields.name);

    check_non_negative(&mut errors, "price", fields.price);
    check_non_negative(&mut errors, "unit_price", fields.unit_price);
    check_positive_decimal(&mut errors, "spend_cap", fields.spend_cap);
    check_positive_count(&mut errors, "included_quota", fields.included_quota);
    check_positive_count(&mut errors, "quota_cap", fields.quota_cap);

    if let Some(price_id) = fields.stripe_price_id.as_deref().filter(|p| !p.trim().is_empty())
        && !price_id.starts_with(STRIPE_PRICE_PREFIX)
    {
        errors.add("stripe_price_id", format!("Stripe price ID must start with '{STRIPE_PRICE_PREFIX}'"));
    }

    match (fields.status, fields.billing_type) {
        (PlanStatus::Draft, _) => {}
        (_, BillingType::Subscription) => {
            if super::is_blank(fields.stripe_price_id.as_deref()) {
                errors.add("stripe_price_id", "Stripe price ID is required for subscription plans");
            }
            if fields.billing_interval.is_none() {
                errors.add("billing_interval", "Billing interval is required for subscription plans");
            }
            if fields.price.is_none() {
                errors.add("price", "Price is required for subscription plans");
            }
        }
        (_, BillingType::Prepaid) => {
            if fields.price.is_none() {
                errors.add("price", "Price is required for prepaid plans");
            }
            if fields.included_quota.is_none() {
                errors.add("included_quota", "Included quota is required for prepaid plans");
            }
        }
        (_, BillingType::Metered) => {
            if fields.unit_price.is_none() {
                errors.add("unit_price", "Unit price is required for metered plans");
            }
        }
    }

    errors.into_result()
}

fn check_non_negative(errors: &mut FieldErrors, field: &str, value: Option<Decimal>) {
    if let Some(v) = value
        && v < Decimal::ZERO
    {
        errors.add(field, "Must not be negative");
    }
}

fn check_positive_decimal(errors: &mut FieldErrors, field: &str, value: Option<Decimal>) {
    if let Some(v) = value
        && v <= Decimal::ZERO
    {
        errors.add(field, "Must be greater than zero");
    }
}

fn check_positive_count(errors: &mut FieldErrors, field: &str, value: Option<i64>) {
    if let Some(v) = value
        && v <= 0
    {
        errors.add(field, "Must be greater than zero");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::plans::BillingInterval;

    fn plan(status: PlanStatus, billing_type: BillingType) -> PlanFields {
        PlanFields {
            name: "Starter".to_string(),
            status,
            billing_type,
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_plans_need_only_name() {
        for billing_type in [BillingType::Subscription, BillingType::Prepaid, BillingType::Metered] {
            assert!(validate_plan(&plan(PlanStatus::Draft, billing_type)).is_ok());
        }
        let unnamed = PlanFields {
            name: String::new(),
            ..plan(PlanStatus::Draft, BillingType::Metered)
        };
        assert!(validate_plan(&unnamed).unwrap_err().contains("name"));
    }

    #[test]
    fn test_active_subscription_requirements() {
        let errors = validate_plan(&plan(PlanStatus::Active, BillingType::Subscription)).unwrap_err();
        assert!(errors.contains("stripe_price_id"));
        assert!(errors.contains("billing_interval"));
        assert!(errors.contains("price"));
        assert!(!errors.contains("unit_price"));

        let complete = PlanFields {
            stripe_price_id: Some("price_123".to_string()),
            billing_interval: Some(BillingInterval::Month),
            price: Some(Decimal::new(1999, 2)),
            ..plan(PlanStatus::Active, BillingType::Subscription)
        };
        assert!(validate_plan(&complete).is_ok());
    }

    #[test]
    fn test_stripe_price_id_prefix() {
        let fields = PlanFields {
            stripe_price_id: Some("prod_123".to_string()),
            billing_interval: Some(BillingInterval::Year),
            price: Some(Decimal::new(100, 0)),
            ..plan(PlanStatus::Active, BillingType::Subscription)
        };
        let errors = validate_plan(&fields).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.get("stripe_price_id").unwrap().contains("price_"));
    }

    #[test]
    fn test_archived_prepaid_requirements() {
        let errors = validate_plan(&plan(PlanStatus::Archived, BillingType::Prepaid)).unwrap_err();
        assert!(errors.contains("price"));
        assert!(errors.contains("included_quota"));
        assert!(!errors.contains("stripe_price_id"));
    }

    #[test]
    fn test_metered_requires_unit_price_only() {
        let errors = validate_plan(&plan(PlanStatus::Active, BillingType::Metered)).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("unit_price"));

        let fields = PlanFields {
            unit_price: Some(Decimal::new(2, 3)),
            ..plan(PlanStatus::Active, BillingType::Metered)
        };
        assert!(validate_plan(&fields).is_ok());
    }

    #[test]
    fn test_numeric_bounds() {
        let fields = PlanFields {
            price: Some(Decimal::new(-1, 0)),
            spend_cap: Some(Decimal::ZERO),
            quota_cap: Some(0),
            included_quota: Some(-5),
            ..plan(PlanStatus::Draft, BillingType::Metered)
        };
        let errors = validate_plan(&fields).unwrap_err();
        for field in ["price", "spend_cap", "quota_cap", "included_quota"] {
            assert!(errors.contains(field), "{field} should be rejected");
        }

        let free = PlanFields {
            price: Some(Decimal::ZERO),
            ..plan(PlanStatus::Draft, BillingType::Prepaid)
        };
        assert!(validate_plan(&free).is_ok());
    }
}
