//! Authentication and authorization.
//!
//! Identity is owned by an external identity provider. It issues HS256 access tokens signed
//! with a secret shared with this service; we only verify them.
//!
//! # Authentication
//!
//! The [`CurrentUser`](crate::api::models::profiles::CurrentUser) extractor accepts the token
//! from either place a client may send it:
//!
//! - `Authorization: Bearer <token>` for programmatic clients
//! - the configured session cookie (`auth.cookie_name`) for browsers
//!
//! When `auth.auto_sync_profiles` is enabled the caller's profile row is upserted on every
//! authenticated request, so rows that reference the caller always have a profile to point at.
//!
//! # Authorization
//!
//! Every write is checked against the row's owner with [`permissions::ensure_owner`]. Callers
//! whose token carries the configured admin role act with elevated rights and pass every
//! ownership check.
//!
//! # Modules
//!
//! - [`current_user`]: the request extractor
//! - [`permissions`]: ownership checks
//! - [`session`]: token claim decoding and verification

pub mod current_user;
pub mod permissions;
pub mod session;
