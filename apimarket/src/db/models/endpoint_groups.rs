//! Database models for endpoint groups.

use crate::types::{GroupId, PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    #[default]
    Draft,
    Active,
    Disabled,
}

/// How the gateway authenticates against the creator's upstream for this group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    None,
    ApiKey,
    Bearer,
    Basic,
    Oauth2,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupFields {
    pub plan_id: Option<PlanId>,
    pub name: String,
    pub description: Option<String>,
    pub status: GroupStatus,
    pub is_default: bool,
    pub auth_type: Option<AuthType>,
    pub injection_config: Option<Value>,
    pub secret_ref: Option<String>,
}

/// Database request for creating a new endpoint group
#[derive(Debug, Clone)]
pub struct GroupCreateDBRequest {
    pub product_id: ProductId,
    pub owner_id: UserId,
    pub fields: GroupFields,
}

/// Database request for updating an endpoint group
#[derive(Debug, Clone)]
pub struct GroupUpdateDBRequest {
    pub fields: GroupFields,
}

/// Database response for an endpoint group
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupDBResponse {
    pub id: GroupId,
    pub product_id: ProductId,
    pub plan_id: Option<PlanId>,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub status: GroupStatus,
    pub is_default: bool,
    pub auth_type: Option<AuthType>,
    pub injection_config: Option<Value>,
    pub secret_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupDBResponse {
    pub fn fields(&self) -> GroupFields {
        GroupFields {
            plan_id: self.plan_id,
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            is_default: self.is_default,
            auth_type: self.auth_type,
            injection_config: self.injection_config.clone(),
            secret_ref: self.secret_ref.clone(),
        }
    }
}

/// Outcome of deleting a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDeletion {
    pub unlinked_endpoints: u64,
}
