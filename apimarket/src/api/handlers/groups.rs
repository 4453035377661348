//! HTTP handlers for endpoint groups.
//!
//! A group belongs to one product and carries the upstream auth settings its endpoints share.
//! At most one group per product is the default; setting the flag clears it elsewhere in the
//! same transaction.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use super::{plans::owned_plan, products::owned_product};
use crate::{
    AppState,
    api::models::{
        groups::{GroupCreate, GroupDeleteResponse, GroupResponse, GroupUpdate, ListGroupsQuery},
        pagination::PaginatedResponse,
        profiles::CurrentUser,
    },
    auth::permissions::ensure_owner,
    db::{
        handlers::{EndpointGroups, Plans, Repository, endpoint_groups::GroupFilter},
        models::endpoint_groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{GroupId, Operation, PlanId, ProductId, Resource, abbrev_uuid},
    validation::{FieldErrors, validate_group},
};

/// Load a group and check the caller may perform `operation` on it
pub(crate) async fn owned_group(conn: &mut PgConnection, user: &CurrentUser, id: GroupId, operation: Operation) -> Result<GroupDBResponse> {
    let group = EndpointGroups::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Endpoint group".to_string(),
        id: id.to_string(),
    })?;
    ensure_owner(user, group.owner_id, Resource::Groups, operation)?;
    Ok(group)
}

/// A group may only point at a plan of its own product that the caller controls
async fn check_plan_link(conn: &mut PgConnection, user: &CurrentUser, product_id: ProductId, plan_id: PlanId) -> Result<()> {
    let plan = owned_plan(conn, user, plan_id, Operation::UpdateOwn).await?;
    if plan.product_id != product_id {
        return Err(FieldErrors::single("plan_id", "Plan belongs to a different product").into());
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/products/{product_id}/groups",
    tag = "groups",
    summary = "List groups",
    description = "Endpoint groups of a product, default group first.",
    params(
        ("product_id" = uuid::Uuid, Path, description = "Product ID"),
        ListGroupsQuery
    ),
    responses(
        (status = 200, description = "Paginated list of groups", body = PaginatedResponse<GroupResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the product owner"),
        (status = 404, description = "Product not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(product_id = %abbrev_uuid(&product_id)))]
pub async fn list_groups(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Query(query): Query<ListGroupsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<GroupResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_product(&mut conn, &current_user, product_id, Operation::ReadOwn).await?;

    let mut filter = GroupFilter::new(skip, limit).for_product(product_id);
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }

    let mut repo = EndpointGroups::new(&mut conn);
    let groups = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        groups.into_iter().map(GroupResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/groups",
    tag = "groups",
    summary = "Create group",
    description = "Create an endpoint group under a product. When `plan_id` is given the group is also linked to that plan.",
    request_body = GroupCreate,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the product owner"),
        (status = 404, description = "Product or plan not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_group(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>)> {
    let (product_id, mut fields) = create.into_fields();
    validate_group(&mut fields)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let product = owned_product(&mut tx, &current_user, product_id, Operation::UpdateOwn).await?;
    if let Some(plan_id) = fields.plan_id {
        check_plan_link(&mut tx, &current_user, product_id, plan_id).await?;
    }

    let group = EndpointGroups::new(&mut tx)
        .create(&GroupCreateDBRequest {
            product_id,
            owner_id: product.owner_id,
            fields,
        })
        .await?;

    if group.is_default {
        EndpointGroups::new(&mut tx).clear_default(product_id, group.id).await?;
    }
    if let Some(plan_id) = group.plan_id {
        Plans::new(&mut tx).link_group(plan_id, group.id).await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(group_id = %abbrev_uuid(&group.id), "Endpoint group created");
    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

#[utoipa::path(
    get,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Get group",
    params(
        ("id" = uuid::Uuid, Path, description = "Endpoint group ID"),
    ),
    responses(
        (status = 200, description = "Group details", body = GroupResponse),
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
#[tracing::instrument(skip_all, fields(group_id = %abbrev_uuid(&id)))]
pub async fn get_group(State(state): State<AppState>, Path(id): Path<GroupId>, current_user: CurrentUser) -> Result<Json<GroupResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let group = owned_group(&mut conn, &current_user, id, Operation::ReadOwn).await?;
    Ok(Json(GroupResponse::from(group)))
}

#[utoipa::path(
    patch,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Update group",
    params(
        ("id" = uuid::Uuid, Path, description = "Endpoint group ID"),
    ),
    request_body = GroupUpdate,
    responses(
        (status = 200, description = "Group updated", body = GroupResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the group owner"),
        (status = 404, description = "Group not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(group_id = %abbrev_uuid(&id)))]
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    current_user: CurrentUser,
    Json(update): Json<GroupUpdate>,
) -> Result<Json<GroupResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let existing = owned_group(&mut tx, &current_user, id, Operation::UpdateOwn).await?;

    let mut fields = existing.fields();
    update.apply(&mut fields);
    validate_group(&mut fields)?;

    let relinked = fields.plan_id.filter(|plan_id| existing.plan_id != Some(*plan_id));
    if let Some(plan_id) = relinked {
        check_plan_link(&mut tx, &current_user, existing.product_id, plan_id).await?;
    }

    let group = EndpointGroups::new(&mut tx).update(id, &GroupUpdateDBRequest { fields }).await?;

    if group.is_default && !existing.is_default {
        EndpointGroups::new(&mut tx).clear_default(group.product_id, group.id).await?;
    }
    // Moving the group to another home plan drops the previous plan's grant
    if group.plan_id != existing.plan_id
        && let Some(previous) = existing.plan_id
    {
        Plans::new(&mut tx).unlink_group(previous, group.id).await?;
    }
    if let Some(plan_id) = relinked {
        Plans::new(&mut tx).link_group(plan_id, group.id).await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(GroupResponse::from(group)))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Delete group",
    description = "Deletes the group and its plan links. The owner's endpoints are kept, unlinked and returned to draft. Refused while endpoints owned by other users still reference the group.",
    params(
        ("id" = uuid::Uuid, Path, description = "Endpoint group ID"),
    ),
    responses(
        (status = 200, description = "Group deleted", body = GroupDeleteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the group owner"),
        (status = 404, description = "Group not found"),
        (status = 409, description = "Other users' endpoints reference the group"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(group_id = %abbrev_uuid(&id)))]
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    current_user: CurrentUser,
) -> Result<Json<GroupDeleteResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let group = owned_group(&mut tx, &current_user, id, Operation::DeleteOwn).await?;

    let deletion = EndpointGroups::new(&mut tx).delete_unlinking_endpoints(id, group.owner_id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(unlinked = deletion.unlinked_endpoints, "Endpoint group deleted");
    Ok(Json(GroupDeleteResponse {
        deleted: true,
        unlinked_endpoints: deletion.unlinked_endpoints,
    }))
}
