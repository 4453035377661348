//! HTTP handlers for buyer subscriptions.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        entitlements::{EntitlementCancelResponse, EntitlementResponse, ListEntitlementsQuery, SubscriptionCreate},
        pagination::PaginatedResponse,
        profiles::CurrentUser,
    },
    auth::permissions::ensure_owner,
    db::{
        handlers::{Entitlements, Plans, Products, Repository, entitlements::EntitlementFilter},
        models::{
            entitlements::{EntitlementCreateDBRequest, EntitlementStatus},
            plans::PlanStatus,
            products::ProductVisibility,
        },
    },
    errors::{Error, Result},
    types::{EntitlementId, Operation, Resource, abbrev_uuid},
};

#[utoipa::path(
    post,
    path = "/subscriptions",
    tag = "subscriptions",
    summary = "Subscribe to a plan",
    description = "Grants the caller an entitlement on the plan's product. The plan must be active and the product listed. A buyer holds at most one open entitlement per product.",
    request_body = SubscriptionCreate,
    responses(
        (status = 201, description = "Entitlement created", body = EntitlementResponse),
        (status = 400, description = "Plan or product is not available"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "Already subscribed to this product"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), plan_id = %abbrev_uuid(&request.plan_id)))]
pub async fn subscribe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<SubscriptionCreate>,
) -> Result<(StatusCode, Json<EntitlementResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let plan = Plans::new(&mut tx)
        .get_by_id(request.plan_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Plan".to_string(),
            id: request.plan_id.to_string(),
        })?;
    if plan.status != PlanStatus::Active {
        return Err(Error::BadRequest {
            message: "This plan is not available for purchase".to_string(),
        });
    }

    let product = Products::new(&mut tx)
        .get_by_id(plan.product_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Product".to_string(),
            id: plan.product_id.to_string(),
        })?;
    if !product.status.is_listed() || product.visibility == ProductVisibility::Private {
        return Err(Error::BadRequest {
            message: "This product is not available for purchase".to_string(),
        });
    }

    let mut repo = Entitlements::new(&mut tx);
    if repo.has_open(current_user.id, product.id).await? {
        return Err(Error::Conflict {
            message: "You already have an active subscription to this product".to_string(),
        });
    }

    let status = if request.trial {
        EntitlementStatus::Trialing
    } else {
        EntitlementStatus::Active
    };
    let entitlement = repo
        .create(&EntitlementCreateDBRequest {
            user_id: current_user.id,
            product_id: product.id,
            plan_id: plan.id,
            status,
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(entitlement_id = %abbrev_uuid(&entitlement.id), ?status, "Subscription created");
    Ok((StatusCode::CREATED, Json(EntitlementResponse::from(entitlement))))
}

#[utoipa::path(
    get,
    path = "/me/entitlements",
    tag = "subscriptions",
    summary = "List my entitlements",
    params(ListEntitlementsQuery),
    responses(
        (status = 200, description = "The caller's entitlements, newest first", body = PaginatedResponse<EntitlementResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_entitlements(
    State(state): State<AppState>,
    Query(query): Query<ListEntitlementsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<EntitlementResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = EntitlementFilter::new(skip, limit).for_user(current_user.id);
    filter.status = query.status;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Entitlements::new(&mut conn);
    let entitlements = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        entitlements.into_iter().map(EntitlementResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/entitlements/{id}/cancel",
    tag = "subscriptions",
    summary = "Cancel entitlement",
    description = "Cancels the subscription and revokes every active API key minted against it.",
    params(
        ("id" = uuid::Uuid, Path, description = "Entitlement ID"),
    ),
    responses(
        (status = 200, description = "Entitlement cancelled", body = EntitlementCancelResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the caller's entitlement"),
        (status = 404, description = "Entitlement not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(entitlement_id = %abbrev_uuid(&id)))]
pub async fn cancel_entitlement(
    State(state): State<AppState>,
    Path(id): Path<EntitlementId>,
    current_user: CurrentUser,
) -> Result<Json<EntitlementCancelResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Entitlements::new(&mut tx);

    let entitlement = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Entitlement".to_string(),
        id: id.to_string(),
    })?;
    ensure_owner(&current_user, entitlement.user_id, Resource::Entitlements, Operation::UpdateOwn)?;

    let cancellation = repo.cancel(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(revoked_keys = cancellation.revoked_keys, "Entitlement cancelled");
    Ok(Json(EntitlementCancelResponse {
        entitlement: EntitlementResponse::from(cancellation.entitlement),
        revoked_keys: cancellation.revoked_keys,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::entitlements::{EntitlementCancelResponse, EntitlementResponse};
    use crate::api::models::pagination::PaginatedResponse;
    use crate::db::handlers::{Plans, Repository};
    use crate::db::models::entitlements::EntitlementStatus;
    use crate::db::models::plans::{PlanStatus, PlanUpdateDBRequest};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_subscribe_creates_entitlement(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let buyer = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        let plan = create_test_active_plan(&pool, creator.id, product.id).await;
        let (name, value) = auth_header(&buyer);

        let response = app
            .post("/api/v1/subscriptions")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "plan_id": plan.id, "trial": true }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let entitlement: EntitlementResponse = response.json();
        assert_eq!(entitlement.user_id, buyer.id);
        assert_eq!(entitlement.product_id, product.id);
        assert_eq!(entitlement.status, EntitlementStatus::Trialing);
        assert_eq!(entitlement.plan_name, plan.name);

        // Second subscription to the same product is refused
        app.post("/api/v1/subscriptions")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "plan_id": plan.id }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let page: PaginatedResponse<EntitlementResponse> = app.get("/api/v1/me/entitlements").add_header(name, value).await.json();
        assert_eq!(page.total_count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_subscribe_to_draft_plan(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let buyer = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        let plan = create_test_active_plan(&pool, creator.id, product.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut fields = plan.fields();
        fields.status = PlanStatus::Draft;
        Plans::new(&mut conn)
            .update(plan.id, &PlanUpdateDBRequest { fields })
            .await
            .unwrap();

        let (name, value) = auth_header(&buyer);
        app.post("/api/v1/subscriptions")
            .add_header(name, value)
            .json(&json!({ "plan_id": plan.id }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_and_resubscribe(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let buyer = create_test_profile(&pool).await;
        let entitlement = create_test_entitlement(&pool, buyer.id).await;
        let (name, value) = auth_header(&buyer);

        let response = app
            .post(&format!("/api/v1/entitlements/{}/cancel", entitlement.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let cancelled: EntitlementCancelResponse = response.json();
        assert_eq!(cancelled.entitlement.status, EntitlementStatus::Cancelled);
        assert!(cancelled.entitlement.cancelled_at.is_some());

        app.post("/api/v1/subscriptions")
            .add_header(name, value)
            .json(&json!({ "plan_id": entitlement.plan_id }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_cancel_someone_elses_entitlement(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let buyer = create_test_profile(&pool).await;
        let stranger = create_test_profile(&pool).await;
        let entitlement = create_test_entitlement(&pool, buyer.id).await;
        let (name, value) = auth_header(&stranger);

        app.post(&format!("/api/v1/entitlements/{}/cancel", entitlement.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
