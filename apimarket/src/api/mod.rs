//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Catalog** (`/api/v1/catalog/*`): Listed products for buyers, no authentication
//! - **Products** (`/api/v1/products/*`): Creator product management
//! - **Plans** (`/api/v1/plans/*`): Billing plans and their group links
//! - **Groups** (`/api/v1/groups/*`): Endpoint groups
//! - **Endpoints** (`/api/v1/endpoints/*`): Endpoints, bulk delete and import
//! - **Subscriptions** (`/api/v1/subscriptions`, `/api/v1/me/*`): Buyer entitlements and keys
//! - **Gateway** (`/internal/v1/keys/verify`): API key verification for the proxy
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/api/docs` when the server is running.

pub mod handlers;
pub mod models;
