//! Database models for profiles.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Upsert of a profile from identity-provider claims
#[derive(Debug, Clone)]
pub struct ProfileUpsertDBRequest {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Database request for updating a profile
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
    pub display_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

/// Database response for a profile
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileDBResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
