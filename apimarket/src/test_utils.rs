//! Test utilities for integration testing (available with `test-utils` feature).

use crate::config::{AuthConfig, Config, DatabaseConfig, GatewayConfig, PoolSettings};
use crate::db::handlers::{EndpointGroups, Endpoints, Entitlements, Plans, Products, Profiles, Repository};
use crate::db::models::{
    endpoint_groups::{AuthType, GroupCreateDBRequest, GroupDBResponse, GroupFields, GroupStatus},
    endpoints::{EndpointCreateDBRequest, EndpointDBResponse, EndpointFields},
    entitlements::{EntitlementCreateDBRequest, EntitlementDBResponse, EntitlementStatus},
    plans::{BillingType, PlanCreateDBRequest, PlanDBResponse, PlanFields, PlanStatus},
    products::{ProductCreateDBRequest, ProductDBResponse, ProductFields, ProductStatus, ProductVisibility},
    profiles::{ProfileDBResponse, ProfileUpsertDBRequest},
};
use crate::types::{GroupId, ProductId, UserId};
use crate::{AppState, Application};
use axum_test::TestServer;
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub const TEST_GATEWAY_SECRET: &str = "test-gateway-secret";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            // Will get overriden by the sqlx::test pool
            url: "Something".to_string(),
            pool: PoolSettings {
                max_connections: 2,
                min_connections: 0,
                ..Default::default()
            },
        },
        auth: AuthConfig {
            jwt_secret: Some("test-jwt-secret-for-testing-only".to_string()),
            audience: Some("authenticated".to_string()),
            ..Default::default()
        },
        gateway: GatewayConfig {
            enabled: true,
            shared_secret: Some(TEST_GATEWAY_SECRET.to_string()),
        },
        ..Default::default()
    }
}

pub fn create_test_state(pool: PgPool) -> AppState {
    AppState::builder().db(pool.clone()).admin_db(pool).config(create_test_config()).build()
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let app = Application::new_with_pool(create_test_config(), Some(pool))
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

/// Sign an access token the way the identity provider would
pub fn sign_test_token(config: &Config, user_id: UserId, email: &str, role: Option<&str>) -> String {
    let claims = json!({
        "sub": user_id,
        "email": email,
        "role": role,
        "aud": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
        "user_metadata": { "full_name": "Test User" },
    });
    let secret = config.auth.jwt_secret.as_deref().expect("test config has a jwt secret");
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).expect("Failed to sign test token")
}

pub fn auth_header(profile: &ProfileDBResponse) -> (String, String) {
    let token = sign_test_token(&create_test_config(), profile.id, &profile.email, None);
    ("authorization".to_string(), format!("Bearer {token}"))
}

pub fn admin_auth_header(profile: &ProfileDBResponse) -> (String, String) {
    let config = create_test_config();
    let token = sign_test_token(&config, profile.id, &profile.email, Some(&config.auth.admin_role));
    ("authorization".to_string(), format!("Bearer {token}"))
}

fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub async fn create_test_profile(pool: &PgPool) -> ProfileDBResponse {
    let id = Uuid::new_v4();
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Profiles::new(&mut conn)
        .create(&ProfileUpsertDBRequest {
            id,
            email: format!("user-{}@example.com", crate::types::abbrev_uuid(&id)),
            display_name: Some("Test User".to_string()),
            avatar_url: None,
        })
        .await
        .expect("Failed to create test profile")
}

/// A listed product with every field a public product needs
pub async fn create_test_product(pool: &PgPool, owner_id: UserId) -> ProductDBResponse {
    let suffix = unique_suffix();
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Products::new(&mut conn)
        .create(&ProductCreateDBRequest {
            owner_id,
            fields: ProductFields {
                name: format!("Weather API {suffix}"),
                description: Some("Forecasts and current conditions".to_string()),
                slug: Some(format!("weather-{suffix}")),
                category: Some("weather".to_string()),
                status: ProductStatus::Public,
                visibility: ProductVisibility::Public,
                service_endpoint_url: Some("https://api.example.com".to_string()),
                ..Default::default()
            },
        })
        .await
        .expect("Failed to create test product")
}

pub async fn create_test_active_plan(pool: &PgPool, owner_id: UserId, product_id: ProductId) -> PlanDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Plans::new(&mut conn)
        .create(&PlanCreateDBRequest {
            product_id,
            owner_id,
            fields: PlanFields {
                name: format!("Pay as you go {}", unique_suffix()),
                billing_type: BillingType::Metered,
                status: PlanStatus::Active,
                unit_price: Some(Decimal::new(5, 3)),
                ..Default::default()
            },
        })
        .await
        .expect("Failed to create test plan")
}

pub async fn create_test_group(pool: &PgPool, owner_id: UserId, product_id: ProductId) -> GroupDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    EndpointGroups::new(&mut conn)
        .create(&GroupCreateDBRequest {
            product_id,
            owner_id,
            fields: GroupFields {
                name: format!("Forecast endpoints {}", unique_suffix()),
                status: GroupStatus::Active,
                auth_type: Some(AuthType::None),
                ..Default::default()
            },
        })
        .await
        .expect("Failed to create test group")
}

/// A draft endpoint carrying only a name and its group link
pub async fn create_test_endpoint(pool: &PgPool, owner_id: UserId, group_id: Option<GroupId>, name: &str) -> EndpointDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Endpoints::new(&mut conn)
        .create(&EndpointCreateDBRequest {
            owner_id,
            fields: EndpointFields {
                group_id,
                name: name.to_string(),
                ..Default::default()
            },
        })
        .await
        .expect("Failed to create test endpoint")
}

/// An active entitlement for `buyer_id` on a freshly created creator's product
pub async fn create_test_entitlement(pool: &PgPool, buyer_id: UserId) -> EntitlementDBResponse {
    let creator = create_test_profile(pool).await;
    let product = create_test_product(pool, creator.id).await;
    let plan = create_test_active_plan(pool, creator.id, product.id).await;

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Entitlements::new(&mut conn)
        .create(&EntitlementCreateDBRequest {
            user_id: buyer_id,
            product_id: product.id,
            plan_id: plan.id,
            status: EntitlementStatus::Active,
        })
        .await
        .expect("Failed to create test entitlement")
}
