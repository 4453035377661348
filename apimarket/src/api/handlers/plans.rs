//! HTTP handlers for plans and the plan/group links that decide which endpoints a plan grants.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use super::products::owned_product;
use crate::{
    AppState,
    api::models::{
        groups::GroupResponse,
        plans::{PlanCreate, PlanResponse, PlanUpdate},
        profiles::CurrentUser,
    },
    auth::permissions::ensure_owner,
    db::{
        handlers::{EndpointGroups, Entitlements, Plans, Repository, plans::PlanFilter},
        models::plans::{PlanCreateDBRequest, PlanDBResponse, PlanFields, PlanUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{GroupId, Operation, PlanId, ProductId, Resource, UserId, abbrev_uuid},
    validation::{FieldErrors, validate_plan},
};

/// Load a plan and check the caller may perform `operation` on it
pub(crate) async fn owned_plan(conn: &mut PgConnection, user: &CurrentUser, id: PlanId, operation: Operation) -> Result<PlanDBResponse> {
    let plan = Plans::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Plan".to_string(),
        id: id.to_string(),
    })?;
    ensure_owner(user, plan.owner_id, Resource::Plans, operation)?;
    Ok(plan)
}

/// Validate the merged record and check the creator has no other plan with the same name
async fn check_plan(conn: &mut PgConnection, owner_id: UserId, fields: &PlanFields, exclude: Option<PlanId>) -> Result<()> {
    validate_plan(fields)?;
    if Plans::new(conn).name_taken(owner_id, &fields.name, exclude).await? {
        return Err(FieldErrors::single("name", "You already have a plan with this name").into());
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/products/{product_id}/plans",
    tag = "plans",
    summary = "List plans",
    description = "Every plan of a product, any status, oldest first.",
    params(
        ("product_id" = uuid::Uuid, Path, description = "Product ID"),
    ),
    responses(
        (status = 200, description = "Plans of the product", body = Vec<PlanResponse>),
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
pub async fn list_plans(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<PlanResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_product(&mut conn, &current_user, product_id, Operation::ReadOwn).await?;

    let plans = Plans::new(&mut conn)
        .list(&PlanFilter::new(0, i64::MAX).for_product(product_id))
        .await?;
    Ok(Json(plans.into_iter().map(PlanResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/products/{product_id}/plans",
    tag = "plans",
    summary = "Create plan",
    params(
        ("product_id" = uuid::Uuid, Path, description = "Product ID"),
    ),
    request_body = PlanCreate,
    responses(
        (status = 201, description = "Plan created", body = PlanResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the product owner"),
        (status = 404, description = "Product not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(product_id = %abbrev_uuid(&product_id)))]
pub async fn create_plan(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    current_user: CurrentUser,
    Json(create): Json<PlanCreate>,
) -> Result<(StatusCode, Json<PlanResponse>)> {
    let fields = PlanFields::from(create);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = owned_product(&mut conn, &current_user, product_id, Operation::UpdateOwn).await?;
    check_plan(&mut conn, product.owner_id, &fields, None).await?;

    let plan = Plans::new(&mut conn)
        .create(&PlanCreateDBRequest {
            product_id,
            owner_id: product.owner_id,
            fields,
        })
        .await?;

    tracing::info!(plan_id = %abbrev_uuid(&plan.id), "Plan created");
    Ok((StatusCode::CREATED, Json(PlanResponse::from(plan))))
}

#[utoipa::path(
    get,
    path = "/plans/{id}",
    tag = "plans",
    summary = "Get plan",
    params(
        ("id" = uuid::Uuid, Path, description = "Plan ID"),
    ),
    responses(
        (status = 200, description = "Plan details", body = PlanResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the plan owner"),
        (status = 404, description = "Plan not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(plan_id = %abbrev_uuid(&id)))]
pub async fn get_plan(State(state): State<AppState>, Path(id): Path<PlanId>, current_user: CurrentUser) -> Result<Json<PlanResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plan = owned_plan(&mut conn, &current_user, id, Operation::ReadOwn).await?;
    Ok(Json(PlanResponse::from(plan)))
}

#[utoipa::path(
    patch,
    path = "/plans/{id}",
    tag = "plans",
    summary = "Update plan",
    description = "Partial update. The merged record is validated against its resulting status and billing type.",
    params(
        ("id" = uuid::Uuid, Path, description = "Plan ID"),
    ),
    request_body = PlanUpdate,
    responses(
        (status = 200, description = "Plan updated", body = PlanResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the plan owner"),
        (status = 404, description = "Plan not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(plan_id = %abbrev_uuid(&id)))]
pub async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<PlanId>,
    current_user: CurrentUser,
    Json(update): Json<PlanUpdate>,
) -> Result<Json<PlanResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let existing = owned_plan(&mut conn, &current_user, id, Operation::UpdateOwn).await?;

    let mut fields = existing.fields();
    update.apply(&mut fields);
    check_plan(&mut conn, existing.owner_id, &fields, Some(id)).await?;

    let plan = Plans::new(&mut conn).update(id, &PlanUpdateDBRequest { fields }).await?;
    Ok(Json(PlanResponse::from(plan)))
}

#[utoipa::path(
    delete,
    path = "/plans/{id}",
    tag = "plans",
    summary = "Delete plan",
    description = "Refused while buyers hold open subscriptions to the plan.",
    params(
        ("id" = uuid::Uuid, Path, description = "Plan ID"),
    ),
    responses(
        (status = 204, description = "Plan deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the plan owner"),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "Plan has open subscriptions"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(plan_id = %abbrev_uuid(&id)))]
pub async fn delete_plan(State(state): State<AppState>, Path(id): Path<PlanId>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    owned_plan(&mut tx, &current_user, id, Operation::DeleteOwn).await?;

    let open = Entitlements::new(&mut tx).count_open_for_plan(id).await?;
    if open > 0 {
        return Err(Error::Conflict {
            message: format!("Cannot delete plan: {open} open subscription(s) reference it"),
        });
    }

    Plans::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/plans/{id}/groups",
    tag = "plans",
    summary = "List plan groups",
    description = "Endpoint groups linked to the plan.",
    params(
        ("id" = uuid::Uuid, Path, description = "Plan ID"),
    ),
    responses(
        (status = 200, description = "Linked groups", body = Vec<GroupResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the plan owner"),
        (status = 404, description = "Plan not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(plan_id = %abbrev_uuid(&id)))]
pub async fn list_plan_groups(
    State(state): State<AppState>,
    Path(id): Path<PlanId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<GroupResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_plan(&mut conn, &current_user, id, Operation::ReadOwn).await?;
    let groups = Plans::new(&mut conn).list_groups(id).await?;
    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/plans/{id}/groups/{group_id}",
    tag = "plans",
    summary = "Link group to plan",
    description = "Grant the group's endpoints to subscribers of the plan. The group must belong to the same product. Linking twice is a no-op.",
    params(
        ("id" = uuid::Uuid, Path, description = "Plan ID"),
        ("group_id" = uuid::Uuid, Path, description = "Endpoint group ID"),
    ),
    responses(
        (status = 204, description = "Group linked"),
        (status = 400, description = "Group belongs to another product"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller does not own the plan or the group"),
        (status = 404, description = "Plan or group not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(plan_id = %abbrev_uuid(&id), group_id = %abbrev_uuid(&group_id)))]
pub async fn link_plan_group(
    State(state): State<AppState>,
    Path((id, group_id)): Path<(PlanId, GroupId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plan = owned_plan(&mut conn, &current_user, id, Operation::UpdateOwn).await?;

    let group = EndpointGroups::new(&mut conn)
        .get_by_id(group_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Endpoint group".to_string(),
            id: group_id.to_string(),
        })?;
    ensure_owner(&current_user, group.owner_id, Resource::Groups, Operation::UpdateOwn)?;
    if group.product_id != plan.product_id {
        return Err(Error::BadRequest {
            message: "Group and plan belong to different products".to_string(),
        });
    }

    Plans::new(&mut conn).link_group(id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/plans/{id}/groups/{group_id}",
    tag = "plans",
    summary = "Unlink group from plan",
    params(
        ("id" = uuid::Uuid, Path, description = "Plan ID"),
        ("group_id" = uuid::Uuid, Path, description = "Endpoint group ID"),
    ),
    responses(
        (status = 204, description = "Group unlinked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the plan owner"),
        (status = 404, description = "Plan not found or group not linked"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(plan_id = %abbrev_uuid(&id), group_id = %abbrev_uuid(&group_id)))]
pub async fn unlink_plan_group(
    State(state): State<AppState>,
    Path((id, group_id)): Path<(PlanId, GroupId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_plan(&mut conn, &current_user, id, Operation::UpdateOwn).await?;

    if !Plans::new(&mut conn).unlink_group(id, group_id).await? {
        return Err(Error::NotFound {
            resource: "Plan group link".to_string(),
            id: group_id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::groups::GroupResponse;
    use crate::api::models::plans::PlanResponse;
    use crate::db::handlers::{Profiles, Repository};
    use crate::db::models::plans::{BillingType, PlanStatus};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_active_subscription_plan(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        let (name, value) = auth_header(&creator);

        let response = app
            .post(&format!("/api/v1/products/{}/plans", product.id))
            .add_header(name, value)
            .json(&json!({
                "name": "Starter",
                "status": "active",
                "billing_type": "subscription",
                "stripe_price_id": "price_starter",
                "billing_interval": "month",
                "price": "9.00"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let plan: PlanResponse = response.json();
        assert_eq!(plan.product_id, product.id);
        assert_eq!(plan.owner_id, creator.id);
        assert_eq!(plan.billing_type, BillingType::Subscription);
        assert_eq!(plan.status, PlanStatus::Active);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_active_metered_plan_requires_unit_price(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        let (name, value) = auth_header(&creator);

        let response = app
            .post(&format!("/api/v1/products/{}/plans", product.id))
            .add_header(name, value)
            .json(&json!({ "name": "Usage", "status": "active", "billing_type": "metered" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert!(body["field_errors"]["unit_price"].is_string());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_plan_name_rejected_case_insensitively(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let first = create_test_product(&pool, creator.id).await;
        let second = create_test_product(&pool, creator.id).await;
        let (name, value) = auth_header(&creator);

        app.post(&format!("/api/v1/products/{}/plans", first.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "name": "Free" }))
            .await
            .assert_status(StatusCode::CREATED);

        // Names are unique per creator, across products
        let response = app
            .post(&format!("/api/v1/products/{}/plans", second.id))
            .add_header(name, value)
            .json(&json!({ "name": "FREE" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["field_errors"]["name"], "You already have a plan with this name");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_other_user_cannot_add_plans(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_profile(&pool).await;
        let intruder = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let plan = create_test_active_plan(&pool, owner.id, product.id).await;
        let (name, value) = auth_header(&intruder);

        app.post(&format!("/api/v1/products/{}/plans", product.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "name": "Sneaky" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.patch(&format!("/api/v1/plans/{}", plan.id))
            .add_header(name, value)
            .json(&json!({ "name": "Renamed" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_link_and_unlink_group(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        let plan = create_test_active_plan(&pool, creator.id, product.id).await;
        let group = create_test_group(&pool, creator.id, product.id).await;
        let (name, value) = auth_header(&creator);
        let link = format!("/api/v1/plans/{}/groups/{}", plan.id, group.id);

        app.post(&link)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        // Second link is a no-op
        app.post(&link)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let groups: Vec<GroupResponse> = app
            .get(&format!("/api/v1/plans/{}/groups", plan.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, group.id);

        app.delete(&link)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&link).add_header(name, value).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_link_rejects_group_of_another_product(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        let other_product = create_test_product(&pool, creator.id).await;
        let plan = create_test_active_plan(&pool, creator.id, product.id).await;
        let group = create_test_group(&pool, creator.id, other_product.id).await;
        let (name, value) = auth_header(&creator);

        app.post(&format!("/api/v1/plans/{}/groups/{}", plan.id, group.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_plan_refused_with_open_subscription(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let buyer = create_test_profile(&pool).await;
        let entitlement = create_test_entitlement(&pool, buyer.id).await;

        let owner_id: uuid::Uuid = sqlx::query_scalar("SELECT owner_id FROM plans WHERE id = $1")
            .bind(entitlement.plan_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = Profiles::new(&mut conn).get_by_id(owner_id).await.unwrap().unwrap();
        let (name, value) = auth_header(&owner);

        app.delete(&format!("/api/v1/plans/{}", entitlement.plan_id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}
