//! API request/response models for endpoints, bulk delete and import.

use super::pagination::Pagination;
use super::{non_blank, patch, patch_text};
use crate::db::models::endpoints::{EndpointDBResponse, EndpointFields, EndpointStatus, EndpointVisibility, HttpMethod};
use crate::types::{EndpointId, GroupId, PlanId, UserId};
use crate::validation::FieldErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

/// Parse a free-text method, recording a field error when it is not a supported verb
fn parse_method(raw: Option<String>, errors: &mut FieldErrors) -> Option<HttpMethod> {
    let raw = non_blank(raw)?;
    match raw.parse::<HttpMethod>() {
        Ok(method) => Some(method),
        Err(message) => {
            errors.add("method", message);
            None
        }
    }
}

/// Request body for creating an endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EndpointCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<PlanId>,
    #[serde(default)]
    #[schema(example = "Current conditions")]
    pub name: String,
    #[schema(example = "/v1/current")]
    pub path: Option<String>,
    /// Case-insensitive HTTP verb
    #[schema(example = "GET")]
    pub method: Option<String>,
    /// Defaults to `draft`
    pub status: Option<EndpointStatus>,
    pub is_primary: Option<bool>,
    pub description: Option<String>,
    /// JSON object, or JSON text encoding one
    #[schema(value_type = Option<Object>)]
    pub input_schema: Option<Value>,
    /// JSON object, or JSON text encoding one
    #[schema(value_type = Option<Object>)]
    pub output_schema: Option<Value>,
    /// Defaults to `public`
    pub visibility: Option<EndpointVisibility>,
}

impl EndpointCreate {
    /// Convert into a record. Conversion problems (an unknown method) come back as field
    /// errors so they can be reported alongside validation errors.
    pub fn into_fields(self) -> (EndpointFields, FieldErrors) {
        let mut errors = FieldErrors::default();
        let method = parse_method(self.method, &mut errors);
        let fields = EndpointFields {
            group_id: self.group_id,
            plan_id: self.plan_id,
            name: self.name.trim().to_string(),
            path: non_blank(self.path),
            method,
            status: self.status.unwrap_or_default(),
            is_primary: self.is_primary.unwrap_or(false),
            description: non_blank(self.description),
            input_schema: self.input_schema,
            output_schema: self.output_schema,
            visibility: self.visibility.unwrap_or_default(),
        };
        (fields, errors)
    }
}

/// Request body for updating an endpoint. Only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EndpointUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<Option<GroupId>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<Option<PlanId>>,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub path: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub method: Option<Option<String>>,
    pub status: Option<EndpointStatus>,
    pub is_primary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<Object>)]
    pub input_schema: Option<Option<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<Object>)]
    pub output_schema: Option<Option<Value>>,
    pub visibility: Option<EndpointVisibility>,
}

impl EndpointUpdate {
    /// Apply onto the stored record, returning any conversion errors
    pub fn apply(self, fields: &mut EndpointFields) -> FieldErrors {
        let mut errors = FieldErrors::default();
        patch(&mut fields.group_id, self.group_id);
        patch(&mut fields.plan_id, self.plan_id);
        if let Some(name) = self.name {
            fields.name = name.trim().to_string();
        }
        patch_text(&mut fields.path, self.path);
        if let Some(method) = self.method {
            fields.method = parse_method(method, &mut errors);
        }
        if let Some(status) = self.status {
            fields.status = status;
        }
        if let Some(is_primary) = self.is_primary {
            fields.is_primary = is_primary;
        }
        patch_text(&mut fields.description, self.description);
        patch(&mut fields.input_schema, self.input_schema);
        patch(&mut fields.output_schema, self.output_schema);
        if let Some(visibility) = self.visibility {
            fields.visibility = visibility;
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EndpointResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EndpointId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<PlanId>,
    pub name: String,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub status: EndpointStatus,
    pub is_primary: bool,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub input_schema: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub output_schema: Option<Value>,
    pub visibility: EndpointVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EndpointDBResponse> for EndpointResponse {
    fn from(db: EndpointDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            group_id: db.group_id,
            plan_id: db.plan_id,
            name: db.name,
            path: db.path,
            method: db.method,
            status: db.status,
            is_primary: db.is_primary,
            description: db.description,
            input_schema: db.input_schema,
            output_schema: db.output_schema,
            visibility: db.visibility,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Endpoint as documented on a catalog page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogEndpoint {
    #[schema(value_type = String, format = "uuid")]
    pub id: EndpointId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
    pub name: String,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub status: EndpointStatus,
    pub is_primary: bool,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub input_schema: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub output_schema: Option<Value>,
}

impl From<EndpointDBResponse> for CatalogEndpoint {
    fn from(db: EndpointDBResponse) -> Self {
        Self {
            id: db.id,
            group_id: db.group_id,
            name: db.name,
            path: db.path,
            method: db.method,
            status: db.status,
            is_primary: db.is_primary,
            description: db.description,
            input_schema: db.input_schema,
            output_schema: db.output_schema,
        }
    }
}

/// Query parameters for listing the caller's endpoints
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListEndpointsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[schema(value_type = Option<String>, format = "uuid")]
    #[param(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,

    #[schema(value_type = Option<String>, format = "uuid")]
    #[param(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<PlanId>,

    pub status: Option<EndpointStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    #[schema(value_type = Vec<String>)]
    pub ids: Vec<EndpointId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteFailure {
    #[schema(value_type = String, format = "uuid")]
    pub id: EndpointId,
    pub message: String,
}

/// Outcome of a bulk delete. Each id succeeds or fails on its own.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteResponse {
    pub requested: usize,
    pub deleted: usize,
    pub failed: Vec<BulkDeleteFailure>,
}

/// Loosely-shaped endpoint rows, e.g. exported from a spreadsheet or another catalog.
/// Column aliases are normalized before each row is validated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EndpointImportRequest {
    /// Group applied to rows that do not name one
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Map<String, Value>>,
}

/// Per-row import outcome: either the created endpoint id or why the row was rejected
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EndpointImportResult {
    pub row: usize,
    #[schema(value_type = Option<String>, format = "uuid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EndpointId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EndpointImportResponse {
    pub created: usize,
    pub failed: usize,
    pub results: Vec<EndpointImportResult>,
}
