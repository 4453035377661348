//! HTTP handlers for creator product management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        products::{ListProductsQuery, ProductCreate, ProductResponse, ProductUpdate},
        profiles::CurrentUser,
    },
    auth::permissions::ensure_owner,
    db::{
        handlers::{EndpointGroups, Entitlements, Products, Repository, products::ProductFilter},
        models::products::{ProductCreateDBRequest, ProductDBResponse, ProductFields, ProductUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, ProductId, Resource, abbrev_uuid},
    validation::{FieldErrors, validate_product},
};

/// Load a product and check the caller may perform `operation` on it
pub(crate) async fn owned_product(
    conn: &mut PgConnection,
    user: &CurrentUser,
    id: ProductId,
    operation: Operation,
) -> Result<ProductDBResponse> {
    let product = Products::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Product".to_string(),
        id: id.to_string(),
    })?;
    ensure_owner(user, product.owner_id, Resource::Products, operation)?;
    Ok(product)
}

/// Validate the merged record and check slug uniqueness
async fn check_product(conn: &mut PgConnection, fields: &ProductFields, exclude: Option<ProductId>) -> Result<()> {
    validate_product(fields)?;
    if let Some(slug) = fields.slug.as_deref()
        && Products::new(conn).slug_taken(slug, exclude).await?
    {
        return Err(FieldErrors::single("slug", "This slug is already taken by another product").into());
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    summary = "List products",
    description = "List the caller's products. Admins see every product.",
    params(ListProductsQuery),
    responses(
        (status = 200, description = "Paginated list of products", body = PaginatedResponse<ProductResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<ProductResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut filter = ProductFilter::new(skip, limit);
    if !current_user.is_admin {
        filter = filter.owned_by(current_user.id);
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
        filter = filter.with_search(search.trim().to_string());
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Products::new(&mut conn);
    let products = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        products.into_iter().map(ProductResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    summary = "Create product",
    request_body = ProductCreate,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Slug already taken"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<ProductCreate>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let fields = ProductFields::from(create);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_product(&mut conn, &fields, None).await?;

    let product = Products::new(&mut conn)
        .create(&ProductCreateDBRequest {
            owner_id: current_user.id,
            fields,
        })
        .await?;

    tracing::info!(product_id = %abbrev_uuid(&product.id), "Product created");
    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    summary = "Get product",
    params(
        ("id" = uuid::Uuid, Path, description = "Product ID"),
    ),
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
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
#[tracing::instrument(skip_all, fields(product_id = %abbrev_uuid(&id)))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    current_user: CurrentUser,
) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = owned_product(&mut conn, &current_user, id, Operation::ReadOwn).await?;
    Ok(Json(ProductResponse::from(product)))
}

#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "products",
    summary = "Update product",
    description = "Partial update. The merged record is validated against the rules of its resulting status.",
    params(
        ("id" = uuid::Uuid, Path, description = "Product ID"),
    ),
    request_body = ProductUpdate,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
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
#[tracing::instrument(skip_all, fields(product_id = %abbrev_uuid(&id)))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    current_user: CurrentUser,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let existing = owned_product(&mut conn, &current_user, id, Operation::UpdateOwn).await?;

    let mut fields = existing.fields();
    update.apply(&mut fields);
    check_product(&mut conn, &fields, Some(id)).await?;

    let product = Products::new(&mut conn).update(id, &ProductUpdateDBRequest { fields }).await?;
    Ok(Json(ProductResponse::from(product)))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    summary = "Delete product",
    description = "Deletes the product with its plans, groups and group links. The owner's endpoints in those groups are kept, unlinked and returned to draft. Refused while buyers hold open subscriptions or while other users' endpoints reference its groups.",
    params(
        ("id" = uuid::Uuid, Path, description = "Product ID"),
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the product owner"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product has open subscriptions or other users' endpoints in its groups"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(product_id = %abbrev_uuid(&id)))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let product = owned_product(&mut tx, &current_user, id, Operation::DeleteOwn).await?;

    let open = Entitlements::new(&mut tx).count_open_for_product(id).await?;
    if open > 0 {
        return Err(Error::Conflict {
            message: format!("Cannot delete product: {open} open subscription(s) reference it"),
        });
    }

    // Groups cascade with the product, so their endpoints are released first
    let unlinked = EndpointGroups::new(&mut tx).release_product_groups(id, product.owner_id).await?;

    if !Products::new(&mut tx).delete(id).await? {
        return Err(Error::NotFound {
            resource: "Product".to_string(),
            id: id.to_string(),
        });
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(unlinked_endpoints = unlinked, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::products::ProductResponse;
    use crate::db::handlers::{EndpointGroups, Endpoints, Products, Profiles, Repository};
    use crate::db::models::products::{ProductStatus, ProductVisibility};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_draft_with_only_a_name(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let (name, value) = auth_header(&creator);

        let response = app
            .post("/api/v1/products")
            .add_header(name, value)
            .json(&json!({ "name": "  Geocoder  " }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let product: ProductResponse = response.json();
        assert_eq!(product.name, "Geocoder");
        assert_eq!(product.owner_id, creator.id);
        assert_eq!(product.status, ProductStatus::Draft);
        assert_eq!(product.visibility, ProductVisibility::Private);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_name_is_rejected_without_writing(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let (name, value) = auth_header(&creator);

        let response = app
            .post("/api/v1/products")
            .add_header(name, value)
            .json(&json!({ "description": "No name here" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["field_errors"]["name"], "Name is required");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_public_product_requires_listing_details(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let (name, value) = auth_header(&creator);

        let response = app
            .post("/api/v1/products")
            .add_header(name, value)
            .json(&json!({ "name": "Weather", "status": "public", "visibility": "public" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        for field in ["slug", "description", "category", "service_endpoint_url"] {
            assert!(body["field_errors"][field].is_string(), "expected an error for {field}");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_slug_is_a_field_error(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let existing = create_test_product(&pool, creator.id).await;
        let (name, value) = auth_header(&creator);

        let response = app
            .post("/api/v1/products")
            .add_header(name, value)
            .json(&json!({ "name": "Copycat", "slug": existing.slug }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert!(body["field_errors"]["slug"].is_string());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_other_user_cannot_modify_product(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_profile(&pool).await;
        let intruder = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let (name, value) = auth_header(&intruder);

        app.patch(&format!("/api/v1/products/{}", product.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "name": "Hijacked" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.delete(&format!("/api/v1/products/{}", product.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let mut conn = pool.acquire().await.unwrap();
        let unchanged = Products::new(&mut conn).get_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.name, product.name);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_validates_merged_record(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let (name, value) = auth_header(&owner);

        // Clearing the category of a public product is refused
        let response = app
            .patch(&format!("/api/v1/products/{}", product.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "category": null }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        // Moving it back to draft makes the same change acceptable
        let response = app
            .patch(&format!("/api/v1/products/{}", product.id))
            .add_header(name, value)
            .json(&json!({ "category": null, "status": "draft" }))
            .await;
        response.assert_status_ok();
        let updated: ProductResponse = response.json();
        assert_eq!(updated.category, None);
        assert_eq!(updated.status, ProductStatus::Draft);
        assert_eq!(updated.slug, product.slug);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_is_scoped_to_owner_unless_admin(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let alice = create_test_profile(&pool).await;
        let bob = create_test_profile(&pool).await;
        let admin = create_test_profile(&pool).await;
        let mine = create_test_product(&pool, alice.id).await;
        create_test_product(&pool, bob.id).await;

        let (name, value) = auth_header(&alice);
        let page: PaginatedResponse<ProductResponse> = app.get("/api/v1/products").add_header(name, value).await.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, mine.id);

        let (name, value) = admin_auth_header(&admin);
        let page: PaginatedResponse<ProductResponse> = app.get("/api/v1/products").add_header(name, value).await.json();
        assert_eq!(page.total_count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_refused_while_subscriptions_are_open(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let buyer = create_test_profile(&pool).await;
        let entitlement = create_test_entitlement(&pool, buyer.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let product = Products::new(&mut conn).get_by_id(entitlement.product_id).await.unwrap().unwrap();
        let owner = Profiles::new(&mut conn)
            .get_by_id(product.owner_id)
            .await
            .unwrap()
            .unwrap();
        let (name, value) = auth_header(&owner);

        app.delete(&format!("/api/v1/products/{}", product.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_refused_while_other_users_endpoints_use_its_groups(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_profile(&pool).await;
        let other = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let group = create_test_group(&pool, owner.id, product.id).await;
        let theirs = create_test_endpoint(&pool, other.id, Some(group.id), "Theirs").await;
        let (name, value) = auth_header(&owner);

        app.delete(&format!("/api/v1/products/{}", product.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::CONFLICT);

        let mut conn = pool.acquire().await.unwrap();
        assert!(Products::new(&mut conn).get_by_id(product.id).await.unwrap().is_some());
        assert!(EndpointGroups::new(&mut conn).get_by_id(group.id).await.unwrap().is_some());
        let kept = Endpoints::new(&mut conn).get_by_id(theirs.id).await.unwrap().unwrap();
        assert_eq!(kept.group_id, Some(group.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_releases_owner_endpoints_as_drafts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let group = create_test_group(&pool, owner.id, product.id).await;
        let mine = create_test_endpoint(&pool, owner.id, Some(group.id), "Mine").await;
        sqlx::query("UPDATE endpoints SET status = 'public', path = '/v1/mine', method = 'GET' WHERE id = $1")
            .bind(mine.id)
            .execute(&pool)
            .await
            .unwrap();
        let (name, value) = auth_header(&owner);

        app.delete(&format!("/api/v1/products/{}", product.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let mut conn = pool.acquire().await.unwrap();
        assert!(EndpointGroups::new(&mut conn).get_by_id(group.id).await.unwrap().is_none());
        let kept = Endpoints::new(&mut conn).get_by_id(mine.id).await.unwrap().expect("endpoint kept");
        assert_eq!(kept.group_id, None);
        assert_eq!(kept.status, ProductStatus::Draft);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_removes_product(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let (name, value) = auth_header(&owner);

        app.delete(&format!("/api/v1/products/{}", product.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        app.get(&format!("/api/v1/products/{}", product.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
