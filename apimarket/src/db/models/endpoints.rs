//! Database models for endpoints.

use crate::db::models::products::ProductStatus;
use crate::types::{EndpointId, GroupId, PlanId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::ToSchema;

/// Endpoints share the product lifecycle
pub type EndpointStatus = ProductStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("Unsupported HTTP method '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EndpointVisibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointFields {
    pub group_id: Option<GroupId>,
    pub plan_id: Option<PlanId>,
    pub name: String,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub status: EndpointStatus,
    pub is_primary: bool,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub visibility: EndpointVisibility,
}

/// Database request for creating a new endpoint
#[derive(Debug, Clone)]
pub struct EndpointCreateDBRequest {
    pub owner_id: UserId,
    pub fields: EndpointFields,
}

/// Database request for updating an endpoint
#[derive(Debug, Clone)]
pub struct EndpointUpdateDBRequest {
    pub fields: EndpointFields,
}

/// Database response for an endpoint
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EndpointDBResponse {
    pub id: EndpointId,
    pub owner_id: UserId,
    pub group_id: Option<GroupId>,
    pub plan_id: Option<PlanId>,
    pub name: String,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub status: EndpointStatus,
    pub is_primary: bool,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub visibility: EndpointVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EndpointDBResponse {
    pub fn fields(&self) -> EndpointFields {
        EndpointFields {
            group_id: self.group_id,
            plan_id: self.plan_id,
            name: self.name.clone(),
            path: self.path.clone(),
            method: self.method,
            status: self.status,
            is_primary: self.is_primary,
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
            visibility: self.visibility,
        }
    }
}
