//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request deserialization and form validation
//! - Authentication and ownership checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`api_keys`]: Buyer API key creation, listing, renaming and revocation
//! - [`catalog`]: Public product catalog
//! - [`config`]: Marketplace metadata
//! - [`endpoints`]: Endpoint CRUD, bulk delete and import
//! - [`entitlements`]: Subscribing to plans and cancelling
//! - [`groups`]: Endpoint group CRUD
//! - [`keys`]: Gateway key verification
//! - [`plans`]: Plan CRUD and plan-group links
//! - [`products`]: Creator product CRUD
//! - [`profiles`]: The caller's profile
//!
//! # Authentication
//!
//! Handlers taking a [`crate::api::models::profiles::CurrentUser`] argument require a valid
//! access token. Ownership is checked with [`crate::auth::permissions::ensure_owner`] after
//! the row is loaded.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

pub mod api_keys;
pub mod catalog;
pub mod config;
pub mod endpoints;
pub mod entitlements;
pub mod groups;
pub mod keys;
pub mod plans;
pub mod products;
pub mod profiles;
