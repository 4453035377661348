//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection or transaction and owns the queries for one table.
//! Repositories return models from [`crate::db::models`] and never check ownership; the API
//! layer authorizes against the returned `owner_id` / `user_id`.
//!
//! # Available Repositories
//!
//! - [`Profiles`]: identity-provider user mirror
//! - [`Products`]: creator products and the public catalog
//! - [`Plans`]: billing plans and their group links
//! - [`EndpointGroups`]: endpoint groups, including unlink-on-delete
//! - [`Endpoints`]: individual endpoints
//! - [`Entitlements`]: buyer subscriptions (not a [`Repository`])
//! - [`ApiKeys`]: buyer API keys and gateway lookups
//!
//! # Common Pattern
//!
//! ```ignore
//! use apimarket::db::handlers::{Products, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Products::new(&mut tx);
//!     let product = repo.get_by_id(product_id).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod api_keys;
pub mod endpoint_groups;
pub mod endpoints;
pub mod entitlements;
pub mod plans;
pub mod products;
pub mod profiles;
pub mod repository;

pub use api_keys::ApiKeys;
pub use endpoint_groups::EndpointGroups;
pub use endpoints::Endpoints;
pub use entitlements::Entitlements;
pub use plans::Plans;
pub use products::Products;
pub use profiles::Profiles;
pub use repository::Repository;
