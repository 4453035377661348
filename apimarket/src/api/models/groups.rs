//! API request/response models for endpoint groups.

use super::pagination::Pagination;
use super::{non_blank, patch, patch_text};
use crate::db::models::endpoint_groups::{AuthType, GroupDBResponse, GroupFields, GroupStatus};
use crate::types::{GroupId, PlanId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

/// Request body for creating an endpoint group
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupCreate {
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    /// Home plan; the group is also linked to it
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<PlanId>,
    #[serde(default)]
    #[schema(example = "Forecast endpoints")]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `draft`
    pub status: Option<GroupStatus>,
    /// Make this the product's default group
    pub is_default: Option<bool>,
    pub auth_type: Option<AuthType>,
    /// JSON object, or JSON text encoding one
    #[schema(value_type = Option<Object>)]
    pub injection_config: Option<Value>,
    /// Reference to the upstream credential in the secret store
    pub secret_ref: Option<String>,
}

impl GroupCreate {
    pub fn into_fields(self) -> (ProductId, GroupFields) {
        (
            self.product_id,
            GroupFields {
                plan_id: self.plan_id,
                name: self.name.trim().to_string(),
                description: non_blank(self.description),
                status: self.status.unwrap_or_default(),
                is_default: self.is_default.unwrap_or(false),
                auth_type: self.auth_type,
                injection_config: self.injection_config,
                secret_ref: non_blank(self.secret_ref),
            },
        )
    }
}

/// Request body for updating an endpoint group. Only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GroupUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<Option<PlanId>>,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub status: Option<GroupStatus>,
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<AuthType>)]
    pub auth_type: Option<Option<AuthType>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<Object>)]
    pub injection_config: Option<Option<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub secret_ref: Option<Option<String>>,
}

impl GroupUpdate {
    pub fn apply(self, fields: &mut GroupFields) {
        patch(&mut fields.plan_id, self.plan_id);
        if let Some(name) = self.name {
            fields.name = name.trim().to_string();
        }
        patch_text(&mut fields.description, self.description);
        if let Some(status) = self.status {
            fields.status = status;
        }
        if let Some(is_default) = self.is_default {
            fields.is_default = is_default;
        }
        patch(&mut fields.auth_type, self.auth_type);
        patch(&mut fields.injection_config, self.injection_config);
        patch_text(&mut fields.secret_ref, self.secret_ref);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GroupId,
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<PlanId>,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub status: GroupStatus,
    pub is_default: bool,
    pub auth_type: Option<AuthType>,
    #[schema(value_type = Option<Object>)]
    pub injection_config: Option<Value>,
    pub secret_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GroupDBResponse> for GroupResponse {
    fn from(db: GroupDBResponse) -> Self {
        Self {
            id: db.id,
            product_id: db.product_id,
            plan_id: db.plan_id,
            owner_id: db.owner_id,
            name: db.name,
            description: db.description,
            status: db.status,
            is_default: db.is_default,
            auth_type: db.auth_type,
            injection_config: db.injection_config,
            secret_ref: db.secret_ref,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing a product's groups
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListGroupsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<GroupStatus>,
}

/// Result of deleting a group. The caller's endpoints survive, unlinked.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupDeleteResponse {
    pub deleted: bool,
    pub unlinked_endpoints: u64,
}
