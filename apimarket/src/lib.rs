//! # apimarket: a self-hostable API marketplace backend
//!
//! `apimarket` is the server side of a two-sided API marketplace. Creators publish **products**,
//! split them into **plans** (billing offers) and **endpoint groups** (endpoints that share an
//! upstream credential), and document the individual **endpoints** buyers can call. Buyers
//! browse the public catalog, subscribe to a plan (which creates an **entitlement**) and mint
//! **API keys** against it. A gateway sitting in front of the creators' services verifies
//! those keys through an internal route.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence.
//!
//! ### Request Flow
//!
//! Every mutating request follows the same shape:
//!
//! 1. The [`CurrentUser`](api::models::profiles::CurrentUser) extractor verifies the identity
//!    provider's access token (Bearer header or session cookie) and, when enabled, upserts the
//!    caller's profile with the elevated pool.
//! 2. The handler merges the payload onto the stored record and runs the entity's
//!    [`validation`] rules. Failures return a field-keyed map and nothing is written.
//! 3. Ownership, duplicate-name and dependency checks run against the database.
//! 4. A single statement (or one short transaction) performs the write.
//!
//! The catalog routes need no authentication and only ever expose listed products.
//!
//! ### Data Clients
//!
//! [`AppState`] carries two pools. `db` serves ordinary per-request work, where handlers check
//! `owner_id` against the caller before mutating. `admin_db` may be configured with an elevated
//! credential and is used for profile sync and gateway key verification.
//!
//! ## Modules
//!
//! - [`api`]: HTTP handlers and request/response models
//! - [`auth`]: token verification, the `CurrentUser` extractor and ownership checks
//! - [`config`]: figment-based configuration
//! - [`db`]: repositories, models and database errors
//! - [`validation`]: status-gated form rules per entity
//! - [`normalize`]: column alias mapping for endpoint imports
//! - [`crypto`]: API key generation and hashing
//! - [`telemetry`]: tracing subscriber and OTLP export
//!
//! ## Getting Started
//!
//! ```no_run
//! use apimarket::{Application, config::{Args, Config}};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args::parse();
//!     let config = Config::load(&args)?;
//!     apimarket::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async { tokio::signal::ctrl_c().await.unwrap_or_default() }).await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod normalize;
mod openapi;
pub mod telemetry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod validation;

use crate::{
    db::handlers::{EndpointGroups, Endpoints, Plans, Products, Profiles, Repository},
    db::models::{
        endpoint_groups::{AuthType, GroupCreateDBRequest, GroupFields, GroupStatus},
        endpoints::{EndpointCreateDBRequest, EndpointFields, EndpointStatus, HttpMethod},
        plans::{BillingInterval, BillingType, PlanCreateDBRequest, PlanFields, PlanStatus},
        products::{ProductCreateDBRequest, ProductFields, ProductStatus, ProductVisibility},
        profiles::ProfileUpsertDBRequest,
    },
    openapi::ApiDoc,
};
use axum::{
    Router, http,
    http::HeaderValue,
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use config::CorsOrigin;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};
use uuid::Uuid;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool.clone())
///     .admin_db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    /// Elevated pool for profile sync and gateway lookups; the same pool as `db` unless
    /// `admin_database_url` is configured
    pub admin_db: PgPool,
    pub config: Config,
}

/// Get the apimarket database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Owner of the demo catalog
pub const DEMO_CREATOR_ID: Uuid = Uuid::from_u128(0x5eed_0000_0000_4000_8000_0000_0000_de30);

/// Insert a small demo catalog: one creator, one public product with a subscription and a
/// metered plan, one active group and two public endpoints.
///
/// Runs at most once per database, guarded by the `demo_catalog_seeded` flag, so edits or
/// deletions made afterwards are never overwritten.
pub async fn seed_demo_catalog(db: &PgPool) -> Result<(), anyhow::Error> {
    let mut tx = db.begin().await?;

    let seeded: Option<bool> = sqlx::query_scalar("SELECT value FROM system_config WHERE key = 'demo_catalog_seeded'")
        .fetch_optional(&mut *tx)
        .await?;

    if let Some(true) = seeded {
        info!("Demo catalog already seeded, skipping");
        tx.commit().await?;
        return Ok(());
    }

    info!("Seeding demo catalog");

    let creator = Profiles::new(&mut tx)
        .create(&ProfileUpsertDBRequest {
            id: DEMO_CREATOR_ID,
            email: "demo-creator@apimarket.local".to_string(),
            display_name: Some("Demo Creator".to_string()),
            avatar_url: None,
        })
        .await?;

    let product = Products::new(&mut tx)
        .create(&ProductCreateDBRequest {
            owner_id: creator.id,
            fields: ProductFields {
                name: "Open Weather".to_string(),
                description: Some("Current conditions and hourly forecasts for any coordinate.".to_string()),
                slug: Some("open-weather".to_string()),
                category: Some("weather".to_string()),
                status: ProductStatus::Public,
                visibility: ProductVisibility::Public,
                homepage_url: Some("https://weather.example.com".to_string()),
                service_endpoint_url: Some("https://api.weather.example.com".to_string()),
                rate_limit: Some(600),
                ..Default::default()
            },
        })
        .await?;

    let mut plan_ids = Vec::new();
    {
        let mut plans = Plans::new(&mut tx);
        let monthly = plans
            .create(&PlanCreateDBRequest {
                product_id: product.id,
                owner_id: creator.id,
                fields: PlanFields {
                    name: "Demo Monthly".to_string(),
                    description: Some("Unlimited calls, billed monthly".to_string()),
                    billing_type: BillingType::Subscription,
                    status: PlanStatus::Active,
                    stripe_price_id: Some("price_demo_monthly".to_string()),
                    billing_interval: Some(BillingInterval::Month),
                    price: Some(Decimal::new(1900, 2)),
                    ..Default::default()
                },
            })
            .await?;
        let metered = plans
            .create(&PlanCreateDBRequest {
                product_id: product.id,
                owner_id: creator.id,
                fields: PlanFields {
                    name: "Demo Pay As You Go".to_string(),
                    description: Some("Pay per request".to_string()),
                    billing_type: BillingType::Metered,
                    status: PlanStatus::Active,
                    unit_price: Some(Decimal::new(2, 3)),
                    spend_cap: Some(Decimal::new(5000, 2)),
                    ..Default::default()
                },
            })
            .await?;
        plan_ids.push(monthly.id);
        plan_ids.push(metered.id);
    }

    let group = EndpointGroups::new(&mut tx)
        .create(&GroupCreateDBRequest {
            product_id: product.id,
            owner_id: creator.id,
            fields: GroupFields {
                plan_id: plan_ids.first().copied(),
                name: "Forecast".to_string(),
                description: Some("Conditions and forecasts".to_string()),
                status: GroupStatus::Active,
                is_default: true,
                auth_type: Some(AuthType::ApiKey),
                injection_config: Some(json!({ "header": "X-Upstream-Key" })),
                secret_ref: Some("demo/open-weather-upstream".to_string()),
            },
        })
        .await?;

    {
        let mut plans = Plans::new(&mut tx);
        for plan_id in &plan_ids {
            plans.link_group(*plan_id, group.id).await?;
        }
    }

    {
        let mut endpoints = Endpoints::new(&mut tx);
        for (name, path, is_primary) in [("Current conditions", "/v1/current", true), ("Hourly forecast", "/v1/forecast/hourly", false)] {
            endpoints
                .create(&EndpointCreateDBRequest {
                    owner_id: creator.id,
                    fields: EndpointFields {
                        group_id: Some(group.id),
                        name: name.to_string(),
                        path: Some(path.to_string()),
                        method: Some(HttpMethod::Get),
                        status: EndpointStatus::Public,
                        is_primary,
                        input_schema: Some(json!({
                            "type": "object",
                            "properties": { "lat": { "type": "number" }, "lon": { "type": "number" } },
                            "required": ["lat", "lon"]
                        })),
                        ..Default::default()
                    },
                })
                .await?;
        }
    }

    sqlx::query("UPDATE system_config SET value = true, updated_at = NOW() WHERE key = 'demo_catalog_seeded'")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!("Demo catalog seeded");
    Ok(())
}

/// Connect the main and elevated pools and run migrations
async fn setup_database(config: &Config, pool: Option<PgPool>) -> anyhow::Result<(PgPool, PgPool)> {
    let pool = match pool {
        Some(pool) => pool,
        None => {
            info!("Connecting to database");
            config.database.pool.pool_options().connect(&config.database.url).await?
        }
    };

    migrator().run(&pool).await?;

    let admin_pool = match &config.admin_database_url {
        Some(url) => {
            info!("Using separate elevated database credential");
            config.database.pool.pool_options().connect(url).await?
        }
        None => pool.clone(),
    };

    if config.seed_demo_catalog {
        seed_demo_catalog(&pool).await?;
    }

    Ok((pool, admin_pool))
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - Management API routes under `/api/v1` (products, plans, groups, endpoints, subscriptions, keys)
/// - Public catalog routes under `/api/v1/catalog`
/// - The gateway key verification route under `/internal/v1` (when the gateway is enabled)
/// - OpenAPI docs at `/api/docs`
/// - Optional Prometheus metrics
/// - CORS configuration
/// - Tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers;

    let api_routes = Router::new()
        .route("/config", get(handlers::config::get_config))
        // Profile of the calling user
        .route("/profile", get(handlers::profiles::get_profile))
        .route("/profile", patch(handlers::profiles::update_profile))
        .route("/profile/sync", post(handlers::profiles::sync_current_profile))
        // Public catalog
        .route("/catalog/products", get(handlers::catalog::list_catalog_products))
        .route("/catalog/products/{slug}", get(handlers::catalog::get_catalog_product))
        .route("/catalog/categories", get(handlers::catalog::list_categories))
        // Creator products
        .route("/products", get(handlers::products::list_products))
        .route("/products", post(handlers::products::create_product))
        .route("/products/{id}", get(handlers::products::get_product))
        .route("/products/{id}", patch(handlers::products::update_product))
        .route("/products/{id}", delete(handlers::products::delete_product))
        // Plans
        .route("/products/{product_id}/plans", get(handlers::plans::list_plans))
        .route("/products/{product_id}/plans", post(handlers::plans::create_plan))
        .route("/plans/{id}", get(handlers::plans::get_plan))
        .route("/plans/{id}", patch(handlers::plans::update_plan))
        .route("/plans/{id}", delete(handlers::plans::delete_plan))
        // Plan-group links
        .route("/plans/{id}/groups", get(handlers::plans::list_plan_groups))
        .route("/plans/{id}/groups/{group_id}", post(handlers::plans::link_plan_group))
        .route("/plans/{id}/groups/{group_id}", delete(handlers::plans::unlink_plan_group))
        // Endpoint groups
        .route("/products/{product_id}/groups", get(handlers::groups::list_groups))
        .route("/groups", post(handlers::groups::create_group))
        .route("/groups/{id}", get(handlers::groups::get_group))
        .route("/groups/{id}", patch(handlers::groups::update_group))
        .route("/groups/{id}", delete(handlers::groups::delete_group))
        .route("/groups/{group_id}/endpoints", get(handlers::endpoints::list_group_endpoints))
        // Endpoints
        .route("/endpoints", get(handlers::endpoints::list_endpoints))
        .route("/endpoints", post(handlers::endpoints::create_endpoint))
        .route("/endpoints/bulk-delete", post(handlers::endpoints::bulk_delete_endpoints))
        .route("/endpoints/import", post(handlers::endpoints::import_endpoints))
        .route("/endpoints/{id}", get(handlers::endpoints::get_endpoint))
        .route("/endpoints/{id}", patch(handlers::endpoints::update_endpoint))
        .route("/endpoints/{id}", delete(handlers::endpoints::delete_endpoint))
        // Buyer subscriptions and keys
        .route("/subscriptions", post(handlers::entitlements::subscribe))
        .route("/me/entitlements", get(handlers::entitlements::list_my_entitlements))
        .route("/entitlements/{id}/cancel", post(handlers::entitlements::cancel_entitlement))
        .route("/entitlements/{id}/api-keys", post(handlers::api_keys::create_api_key))
        .route("/me/api-keys", get(handlers::api_keys::list_my_api_keys))
        .route("/api-keys/{id}", patch(handlers::api_keys::update_api_key))
        .route("/api-keys/{id}", delete(handlers::api_keys::revoke_api_key))
        .with_state(state.clone());

    let mut router = Router::new().route("/healthz", get(|| async { "OK" })).nest("/api/v1", api_routes);

    if state.config.gateway.enabled {
        let internal_routes = Router::new()
            .route("/keys/verify", post(handlers::keys::verify_key))
            .with_state(state.clone());
        router = router.nest("/internal/v1", internal_routes);
    }

    let router = router.merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    // Add Prometheus metrics if enabled
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled service: pools, state and router, ready to serve
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool (migrations still run)
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting apimarket with configuration: {:#?}", config);

        let (pool, admin_pool) = setup_database(&config, pool).await?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .admin_db(admin_pool)
            .config(config.clone())
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            config,
            pool,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "{} listening on http://{}, available at http://localhost:{}",
            self.config.metadata.name, bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Close database connections
        info!("Closing database connections...");
        self.pool.close().await;
        if !self.app_state.admin_db.is_closed() {
            self.app_state.admin_db.close().await;
        }

        // Shutdown telemetry
        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
