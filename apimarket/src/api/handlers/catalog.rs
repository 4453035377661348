//! HTTP handlers for the public catalog. No authentication; only listed products are visible.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        endpoints::CatalogEndpoint,
        pagination::PaginatedResponse,
        plans::PlanResponse,
        products::{CatalogProduct, CatalogProductDetail, CatalogQuery},
    },
    db::{
        handlers::{
            EndpointGroups, Endpoints, Plans, Products, Repository, endpoint_groups::GroupFilter, plans::PlanFilter,
            products::CatalogFilter,
        },
        models::{endpoint_groups::GroupStatus, plans::PlanStatus},
    },
    errors::{Error, Result},
};

#[utoipa::path(
    get,
    path = "/catalog/products",
    tag = "catalog",
    summary = "Browse the catalog",
    description = "Products in preview or public status with public visibility, ordered by name.",
    params(CatalogQuery),
    responses(
        (status = 200, description = "A page of listed products", body = PaginatedResponse<CatalogProduct>),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_catalog_products(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<PaginatedResponse<CatalogProduct>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit_or(i64::from(state.config.metadata.catalog_page_size));
    let filter = CatalogFilter {
        skip,
        limit,
        category: query.category.filter(|c| !c.trim().is_empty()),
        search: query.search.filter(|s| !s.trim().is_empty()),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Products::new(&mut conn);
    let products = repo.list_catalog(&filter).await?;
    let total_count = repo.count_catalog(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        products.into_iter().map(CatalogProduct::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    get,
    path = "/catalog/products/{slug}",
    tag = "catalog",
    summary = "Get catalog product",
    description = "Product detail page: the product, its active plans and the public endpoints of its active groups.",
    params(
        ("slug" = String, Path, description = "Product slug"),
    ),
    responses(
        (status = 200, description = "Product detail", body = CatalogProductDetail),
        (status = 404, description = "No listed product with this slug"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all, fields(slug = %slug))]
pub async fn get_catalog_product(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<CatalogProductDetail>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let product = Products::new(&mut tx)
        .get_listed_by_slug(&slug)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Product".to_string(),
            id: slug.clone(),
        })?;

    // The detail page shows every active plan and group, unpaged
    let plans = Plans::new(&mut tx)
        .list(&PlanFilter::new(0, i64::MAX).for_product(product.id).with_status(PlanStatus::Active))
        .await?;

    let groups = EndpointGroups::new(&mut tx)
        .list(&GroupFilter::new(0, i64::MAX).for_product(product.id).with_status(GroupStatus::Active))
        .await?;
    let group_ids: Vec<_> = groups.iter().map(|g| g.id).collect();
    let endpoints = Endpoints::new(&mut tx).list_public_in_groups(&group_ids).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(CatalogProductDetail {
        product: CatalogProduct::from(product),
        plans: plans.into_iter().map(PlanResponse::from).collect(),
        endpoints: endpoints.into_iter().map(CatalogEndpoint::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/catalog/categories",
    tag = "catalog",
    summary = "List categories",
    responses(
        (status = 200, description = "Distinct categories of listed products", body = Vec<String>),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let categories = Products::new(&mut conn).list_categories().await?;
    Ok(Json(categories))
}

#[cfg(test)]
mod tests {
    use crate::api::models::pagination::PaginatedResponse;
    use crate::api::models::products::{CatalogProduct, CatalogProductDetail};
    use crate::db::handlers::{Endpoints, Products, Repository};
    use crate::db::models::endpoints::{EndpointCreateDBRequest, EndpointFields, EndpointStatus, HttpMethod};
    use crate::db::models::products::{ProductCreateDBRequest, ProductFields, ProductStatus};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::Value;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_catalog_lists_only_listed_products(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let listed = create_test_product(&pool, creator.id).await;

        let mut conn = pool.acquire().await.unwrap();
        Products::new(&mut conn)
            .create(&ProductCreateDBRequest {
                owner_id: creator.id,
                fields: ProductFields {
                    name: "Work in progress".to_string(),
                    status: ProductStatus::Draft,
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        let response = app.get("/api/v1/catalog/products").await;
        response.assert_status_ok();
        let page: PaginatedResponse<CatalogProduct> = response.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.limit, 12);
        assert_eq!(page.data[0].id, listed.id);

        // Upstream URL and owner never appear in the catalog
        let raw: Value = response.json();
        assert!(raw["data"][0].get("service_endpoint_url").is_none());
        assert!(raw["data"][0].get("owner_id").is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_catalog_filters_by_category_and_search(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let weather = create_test_product(&pool, creator.id).await;

        let response = app.get("/api/v1/catalog/products?category=finance").await;
        let page: PaginatedResponse<CatalogProduct> = response.json();
        assert_eq!(page.total_count, 0);

        let response = app.get("/api/v1/catalog/products?search=FORECASTS").await;
        let page: PaginatedResponse<CatalogProduct> = response.json();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, weather.id);

        let response = app.get("/api/v1/catalog/categories").await;
        let categories: Vec<String> = response.json();
        assert_eq!(categories, vec!["weather".to_string()]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_catalog_detail_shows_active_plans_and_public_endpoints(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        let plan = create_test_active_plan(&pool, creator.id, product.id).await;
        let group = create_test_group(&pool, creator.id, product.id).await;
        create_test_endpoint(&pool, creator.id, Some(group.id), "Draft endpoint").await;

        let mut conn = pool.acquire().await.unwrap();
        let public = Endpoints::new(&mut conn)
            .create(&EndpointCreateDBRequest {
                owner_id: creator.id,
                fields: EndpointFields {
                    group_id: Some(group.id),
                    name: "Current".to_string(),
                    path: Some("/v1/current".to_string()),
                    method: Some(HttpMethod::Get),
                    status: EndpointStatus::Public,
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        let slug = product.slug.clone().unwrap();
        let response = app.get(&format!("/api/v1/catalog/products/{slug}")).await;
        response.assert_status_ok();
        let detail: CatalogProductDetail = response.json();
        assert_eq!(detail.product.id, product.id);
        assert_eq!(detail.plans.len(), 1);
        assert_eq!(detail.plans[0].id, plan.id);
        assert_eq!(detail.endpoints.len(), 1);
        assert_eq!(detail.endpoints[0].id, public.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_catalog_detail_is_not_paged(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let creator = create_test_profile(&pool).await;
        let product = create_test_product(&pool, creator.id).await;
        for _ in 0..105 {
            create_test_active_plan(&pool, creator.id, product.id).await;
        }

        let slug = product.slug.clone().unwrap();
        let detail: CatalogProductDetail = app.get(&format!("/api/v1/catalog/products/{slug}")).await.json();
        assert_eq!(detail.plans.len(), 105);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_catalog_detail_unknown_slug_is_404(pool: PgPool) {
        let app = create_test_app(pool).await;
        app.get("/api/v1/catalog/products/does-not-exist")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
