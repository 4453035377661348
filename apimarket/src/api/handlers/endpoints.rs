//! HTTP handlers for endpoints, including bulk delete and spreadsheet-style import.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::Value;
use sqlx::PgConnection;

use super::{groups::owned_group, plans::owned_plan};
use crate::{
    AppState,
    api::models::{
        endpoints::{
            BulkDeleteFailure, BulkDeleteRequest, BulkDeleteResponse, EndpointCreate, EndpointImportRequest, EndpointImportResponse,
            EndpointImportResult, EndpointResponse, EndpointUpdate, ListEndpointsQuery,
        },
        pagination::{PaginatedResponse, Pagination},
        profiles::CurrentUser,
    },
    auth::permissions::ensure_owner,
    db::{
        handlers::{Endpoints, Repository, endpoints::EndpointFilter},
        models::endpoints::{EndpointCreateDBRequest, EndpointDBResponse, EndpointFields, EndpointUpdateDBRequest},
    },
    errors::{Error, Result},
    normalize::normalize_endpoint_row,
    types::{EndpointId, GroupId, Operation, Resource, abbrev_uuid},
    validation::{FieldErrors, validate_endpoint},
};

/// Load an endpoint and check the caller may perform `operation` on it
async fn owned_endpoint(conn: &mut PgConnection, user: &CurrentUser, id: EndpointId, operation: Operation) -> Result<EndpointDBResponse> {
    let endpoint = Endpoints::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Endpoint".to_string(),
        id: id.to_string(),
    })?;
    ensure_owner(user, endpoint.owner_id, Resource::Endpoints, operation)?;
    Ok(endpoint)
}

/// Validate a merged endpoint record before it is written.
///
/// `parse_errors` carries problems found while decoding the payload (e.g. an unknown method);
/// they are reported together with the validation errors. Newly referenced groups and plans
/// must belong to the caller, and a non-draft endpoint's name must be unique in its group.
async fn check_endpoint(
    conn: &mut PgConnection,
    user: &CurrentUser,
    fields: &mut EndpointFields,
    parse_errors: FieldErrors,
    existing: Option<&EndpointDBResponse>,
) -> Result<()> {
    let mut errors = parse_errors;
    if let Err(validation) = validate_endpoint(fields) {
        errors.merge(validation);
    }
    errors.into_result()?;

    if let Some(group_id) = fields.group_id
        && existing.is_none_or(|e| e.group_id != Some(group_id))
    {
        owned_group(conn, user, group_id, Operation::UpdateOwn).await?;
    }
    if let Some(plan_id) = fields.plan_id
        && existing.is_none_or(|e| e.plan_id != Some(plan_id))
    {
        owned_plan(conn, user, plan_id, Operation::ReadOwn).await?;
    }

    if let Some(group_id) = fields.group_id
        && !fields.status.is_draft()
        && Endpoints::new(conn)
            .name_taken_in_group(group_id, &fields.name, existing.map(|e| e.id))
            .await?
    {
        return Err(FieldErrors::single("name", "An endpoint with this name already exists in the group").into());
    }
    Ok(())
}

/// Only one endpoint per group is primary
async fn settle_primary(conn: &mut PgConnection, endpoint: &EndpointDBResponse) -> Result<()> {
    if endpoint.is_primary
        && let Some(group_id) = endpoint.group_id
    {
        Endpoints::new(conn).clear_primary(group_id, endpoint.id).await?;
    }
    Ok(())
}

/// Validate and insert one endpoint owned by the caller
async fn create_one(
    conn: &mut PgConnection,
    user: &CurrentUser,
    mut fields: EndpointFields,
    parse_errors: FieldErrors,
) -> Result<EndpointDBResponse> {
    check_endpoint(conn, user, &mut fields, parse_errors, None).await?;
    let endpoint = Endpoints::new(conn)
        .create(&EndpointCreateDBRequest {
            owner_id: user.id,
            fields,
        })
        .await?;
    settle_primary(conn, &endpoint).await?;
    Ok(endpoint)
}

async fn list_page(conn: &mut PgConnection, filter: EndpointFilter) -> Result<PaginatedResponse<EndpointResponse>> {
    let mut repo = Endpoints::new(conn);
    let endpoints = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;
    Ok(PaginatedResponse::new(
        endpoints.into_iter().map(EndpointResponse::from).collect(),
        total_count,
        filter.skip,
        filter.limit,
    ))
}

#[utoipa::path(
    get,
    path = "/endpoints",
    tag = "endpoints",
    summary = "List endpoints",
    description = "The caller's endpoints, newest first. Admins see every endpoint.",
    params(ListEndpointsQuery),
    responses(
        (status = 200, description = "Paginated list of endpoints", body = PaginatedResponse<EndpointResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_endpoints(
    State(state): State<AppState>,
    Query(query): Query<ListEndpointsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<EndpointResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = EndpointFilter::new(skip, limit);
    if !current_user.is_admin {
        filter = filter.owned_by(current_user.id);
    }
    if let Some(group_id) = query.group_id {
        filter = filter.in_group(group_id);
    }
    filter.plan_id = query.plan_id;
    filter.status = query.status;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(list_page(&mut conn, filter).await?))
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}/endpoints",
    tag = "endpoints",
    summary = "List group endpoints",
    description = "Every endpoint in a group the caller owns.",
    params(
        ("group_id" = uuid::Uuid, Path, description = "Endpoint group ID"),
        Pagination
    ),
    responses(
        (status = 200, description = "Paginated list of endpoints", body = PaginatedResponse<EndpointResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the group owner"),
        (status = 404, description = "Group not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(group_id = %abbrev_uuid(&group_id)))]
pub async fn list_group_endpoints(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<EndpointResponse>>> {
    let (skip, limit) = pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_group(&mut conn, &current_user, group_id, Operation::ReadOwn).await?;
    Ok(Json(list_page(&mut conn, EndpointFilter::new(skip, limit).in_group(group_id)).await?))
}

#[utoipa::path(
    post,
    path = "/endpoints",
    tag = "endpoints",
    summary = "Create endpoint",
    description = "A draft endpoint may carry only a name. Preview and public endpoints need a path, a method and a group.",
    request_body = EndpointCreate,
    responses(
        (status = 201, description = "Endpoint created", body = EndpointResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Group or plan belongs to another user"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_endpoint(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<EndpointCreate>,
) -> Result<(StatusCode, Json<EndpointResponse>)> {
    let (fields, parse_errors) = create.into_fields();

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let endpoint = create_one(&mut tx, &current_user, fields, parse_errors).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(endpoint_id = %abbrev_uuid(&endpoint.id), "Endpoint created");
    Ok((StatusCode::CREATED, Json(EndpointResponse::from(endpoint))))
}

#[utoipa::path(
    get,
    path = "/endpoints/{id}",
    tag = "endpoints",
    summary = "Get endpoint",
    params(
        ("id" = uuid::Uuid, Path, description = "Endpoint ID"),
    ),
    responses(
        (status = 200, description = "Endpoint details", body = EndpointResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the endpoint owner"),
        (status = 404, description = "Endpoint not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(endpoint_id = %abbrev_uuid(&id)))]
pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(id): Path<EndpointId>,
    current_user: CurrentUser,
) -> Result<Json<EndpointResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let endpoint = owned_endpoint(&mut conn, &current_user, id, Operation::ReadOwn).await?;
    Ok(Json(EndpointResponse::from(endpoint)))
}

#[utoipa::path(
    patch,
    path = "/endpoints/{id}",
    tag = "endpoints",
    summary = "Update endpoint",
    params(
        ("id" = uuid::Uuid, Path, description = "Endpoint ID"),
    ),
    request_body = EndpointUpdate,
    responses(
        (status = 200, description = "Endpoint updated", body = EndpointResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the endpoint owner"),
        (status = 404, description = "Endpoint not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(endpoint_id = %abbrev_uuid(&id)))]
pub async fn update_endpoint(
    State(state): State<AppState>,
    Path(id): Path<EndpointId>,
    current_user: CurrentUser,
    Json(update): Json<EndpointUpdate>,
) -> Result<Json<EndpointResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let existing = owned_endpoint(&mut tx, &current_user, id, Operation::UpdateOwn).await?;

    let mut fields = existing.fields();
    let parse_errors = update.apply(&mut fields);
    check_endpoint(&mut tx, &current_user, &mut fields, parse_errors, Some(&existing)).await?;

    let endpoint = Endpoints::new(&mut tx).update(id, &EndpointUpdateDBRequest { fields }).await?;
    settle_primary(&mut tx, &endpoint).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(EndpointResponse::from(endpoint)))
}

#[utoipa::path(
    delete,
    path = "/endpoints/{id}",
    tag = "endpoints",
    summary = "Delete endpoint",
    params(
        ("id" = uuid::Uuid, Path, description = "Endpoint ID"),
    ),
    responses(
        (status = 204, description = "Endpoint deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the endpoint owner"),
        (status = 404, description = "Endpoint not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(endpoint_id = %abbrev_uuid(&id)))]
pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<EndpointId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_endpoint(&mut conn, &current_user, id, Operation::DeleteOwn).await?;
    Endpoints::new(&mut conn).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/endpoints/bulk-delete",
    tag = "endpoints",
    summary = "Bulk delete endpoints",
    description = "Deletes each endpoint independently. Failures are reported per ID and do not roll back the others.",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Per-endpoint outcome", body = BulkDeleteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(count = request.ids.len()))]
pub async fn bulk_delete_endpoints(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let requested = request.ids.len();
    let mut deleted = 0;
    let mut failed = Vec::new();
    for id in request.ids {
        let outcome = match owned_endpoint(&mut conn, &current_user, id, Operation::DeleteOwn).await {
            Ok(_) => Endpoints::new(&mut conn).delete(id).await.map_err(Error::from),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(_) => deleted += 1,
            Err(e) => failed.push(BulkDeleteFailure {
                id,
                message: e.user_message(),
            }),
        }
    }

    tracing::info!(requested, deleted, failed = failed.len(), "Bulk endpoint delete finished");
    Ok(Json(BulkDeleteResponse { requested, deleted, failed }))
}

#[utoipa::path(
    post,
    path = "/endpoints/import",
    tag = "endpoints",
    summary = "Import endpoints",
    description = "Create endpoints from loosely formatted rows. Column aliases are normalized, `group_id` fills in for rows without one, and every row is validated and stored independently.",
    request_body = EndpointImportRequest,
    responses(
        (status = 200, description = "Per-row outcome", body = EndpointImportResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(rows = request.rows.len()))]
pub async fn import_endpoints(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<EndpointImportRequest>,
) -> Result<Json<EndpointImportResponse>> {
    let mut results = Vec::with_capacity(request.rows.len());

    for (row_number, row) in request.rows.into_iter().enumerate() {
        let mut row = normalize_endpoint_row(row);
        if let Some(group_id) = request.group_id
            && row.get("group_id").is_none_or(Value::is_null)
        {
            row.insert("group_id".to_string(), Value::String(group_id.to_string()));
        }

        let create = match serde_json::from_value::<EndpointCreate>(Value::Object(row)) {
            Ok(create) => create,
            Err(e) => {
                results.push(EndpointImportResult {
                    row: row_number,
                    id: None,
                    message: Some(format!("Invalid row: {e}")),
                    field_errors: None,
                });
                continue;
            }
        };
        let (fields, parse_errors) = create.into_fields();

        let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
        let outcome = create_one(&mut tx, &current_user, fields, parse_errors).await;
        let result = match outcome {
            Ok(endpoint) => {
                tx.commit().await.map_err(|e| Error::Database(e.into()))?;
                EndpointImportResult {
                    row: row_number,
                    id: Some(endpoint.id),
                    message: None,
                    field_errors: None,
                }
            }
            Err(Error::Validation(field_errors)) => EndpointImportResult {
                row: row_number,
                id: None,
                message: Some("Validation failed".to_string()),
                field_errors: Some(field_errors),
            },
            Err(e) => EndpointImportResult {
                row: row_number,
                id: None,
                message: Some(e.user_message()),
                field_errors: None,
            },
        };
        results.push(result);
    }

    let created = results.iter().filter(|r| r.id.is_some()).count();
    let failed = results.len() - created;
    tracing::info!(created, failed, "Endpoint import finished");
    Ok(Json(EndpointImportResponse { created, failed, results }))
}
