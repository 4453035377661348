pub mod api_keys;
pub mod endpoint_groups;
pub mod endpoints;
pub mod entitlements;
pub mod plans;
pub mod products;
pub mod profiles;
