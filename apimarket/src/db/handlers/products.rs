//! Database repository for products and the public catalog.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::products::{ProductCreateDBRequest, ProductDBResponse, ProductStatus, ProductUpdateDBRequest},
};
use crate::types::{ProductId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing a creator's products
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub skip: i64,
    pub limit: i64,
    /// Restrict to one creator; `None` lists every product (admins)
    pub owner_id: Option<UserId>,
    pub status: Option<ProductStatus>,
    /// Case-insensitive substring search on name and description
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            owner_id: None,
            status: None,
            search: None,
        }
    }

    pub fn owned_by(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_status(mut self, status: ProductStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }
}

/// Filter for the buyer-facing catalog
#[derive(Debug, Clone)]
pub struct CatalogFilter {
    pub skip: i64,
    pub limit: i64,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Products shown in the catalog: previewing or public, and publicly visible
const LISTED: &str = "status IN ('preview', 'public') AND visibility = 'public'";

pub struct Products<'c> {
    db: &'c mut PgConnection,
}

/// Case-insensitive `LIKE` pattern matching `search` literally anywhere in the text
fn contains_pattern(search: &str) -> String {
    let escaped = search.to_lowercase().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

impl<'c> Products<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        if let Some(ref search) = filter.search {
            let search_pattern = contains_pattern(search);
            query.push(" AND (LOWER(name) LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR LOWER(COALESCE(description, '')) LIKE ");
            query.push_bind(search_pattern);
            query.push(")");
        }
    }

    fn push_catalog_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &CatalogFilter) {
        if let Some(ref category) = filter.category {
            query.push(" AND LOWER(category) = ");
            query.push_bind(category.to_lowercase());
        }
        if let Some(ref search) = filter.search {
            let search_pattern = contains_pattern(search);
            query.push(" AND (LOWER(name) LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR LOWER(COALESCE(description, '')) LIKE ");
            query.push_bind(search_pattern);
            query.push(")");
        }
    }

    /// Count products matching the filter (pagination ignored)
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ProductFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE 1=1");
        Self::push_filter(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Whether a slug is already used by a product other than `exclude`
    #[instrument(skip(self), err)]
    pub async fn slug_taken(&mut self, slug: &str, exclude: Option<ProductId>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))")
            .bind(slug)
            .bind(exclude)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(taken)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list_catalog(&mut self, filter: &CatalogFilter) -> Result<Vec<ProductDBResponse>> {
        let mut query = QueryBuilder::new(format!("SELECT * FROM products WHERE {LISTED}"));
        Self::push_catalog_filter(&mut query, filter);
        query.push(" ORDER BY name, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let products = query.build_query_as::<ProductDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(products)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count_catalog(&mut self, filter: &CatalogFilter) -> Result<i64> {
        let mut query = QueryBuilder::new(format!("SELECT COUNT(*) FROM products WHERE {LISTED}"));
        Self::push_catalog_filter(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Look up a listed product by slug. Unlisted products resolve here (direct links) but are
    /// never browsable; private products never resolve.
    #[instrument(skip(self), err)]
    pub async fn get_listed_by_slug(&mut self, slug: &str) -> Result<Option<ProductDBResponse>> {
        let product = sqlx::query_as::<_, ProductDBResponse>(
            "SELECT * FROM products WHERE slug = $1 AND status IN ('preview', 'public') AND visibility <> 'private'",
        )
        .bind(slug)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(product)
    }

    /// Distinct categories across listed products
    #[instrument(skip(self), err)]
    pub async fn list_categories(&mut self) -> Result<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT DISTINCT category FROM products WHERE {LISTED} AND category IS NOT NULL AND category <> '' ORDER BY category"
        ))
        .fetch_all(&mut *self.db)
        .await?;
        Ok(categories)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Products<'c> {
    type CreateRequest = ProductCreateDBRequest;
    type UpdateRequest = ProductUpdateDBRequest;
    type Response = ProductDBResponse;
    type Id = ProductId;
    type Filter = ProductFilter;

    #[instrument(skip(self, request), fields(name = %request.fields.name, owner = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let product = sqlx::query_as::<_, ProductDBResponse>(
            r#"
            INSERT INTO products (
                owner_id, name, description, slug, category, status, visibility,
                thumbnail_url, homepage_url, service_endpoint_url, rate_limit
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(request.owner_id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(&f.slug)
        .bind(&f.category)
        .bind(f.status)
        .bind(f.visibility)
        .bind(&f.thumbnail_url)
        .bind(&f.homepage_url)
        .bind(&f.service_endpoint_url)
        .bind(f.rate_limit)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let product = sqlx::query_as::<_, ProductDBResponse>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(product)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ProductId>) -> Result<HashMap<ProductId, ProductDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let products = sqlx::query_as::<_, ProductDBResponse>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM products WHERE 1=1");
        Self::push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let products = query.build_query_as::<ProductDBResponse>().fetch_all(&mut *self.db).await?;
        tracing::debug!("Retrieved {} products", products.len());
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(product_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let product = sqlx::query_as::<_, ProductDBResponse>(
            r#"
            UPDATE products SET
                name = $2,
                description = $3,
                slug = $4,
                category = $5,
                status = $6,
                visibility = $7,
                thumbnail_url = $8,
                homepage_url = $9,
                service_endpoint_url = $10,
                rate_limit = $11,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(&f.slug)
        .bind(&f.category)
        .bind(f.status)
        .bind(f.visibility)
        .bind(&f.thumbnail_url)
        .bind(&f.homepage_url)
        .bind(&f.service_endpoint_url)
        .bind(f.rate_limit)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::products::{ProductFields, ProductVisibility};
    use crate::test_utils::create_test_profile;
    use sqlx::PgPool;

    fn listed(name: &str, slug: &str, category: &str) -> ProductFields {
        ProductFields {
            name: name.to_string(),
            description: Some(format!("{name} description")),
            slug: Some(slug.to_string()),
            category: Some(category.to_string()),
            status: ProductStatus::Public,
            visibility: ProductVisibility::Public,
            service_endpoint_url: Some("https://upstream.example.com".to_string()),
            ..Default::default()
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_update_product(pool: PgPool) {
        let owner = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Products::new(&mut conn);

        let created = repo
            .create(&ProductCreateDBRequest {
                owner_id: owner.id,
                fields: ProductFields {
                    name: "Draft product".to_string(),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(created.status, ProductStatus::Draft);
        assert_eq!(created.visibility, ProductVisibility::Private);

        let mut fields = created.fields();
        fields.description = Some("Now with a description".to_string());
        let updated = repo.update(created.id, &ProductUpdateDBRequest { fields }).await.unwrap();
        assert_eq!(updated.description.as_deref(), Some("Now with a description"));
        assert!(updated.updated_at >= created.updated_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_slug_is_unique_violation(pool: PgPool) {
        let owner = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Products::new(&mut conn);

        let first = listed("Weather", "weather", "data");
        repo.create(&ProductCreateDBRequest {
            owner_id: owner.id,
            fields: first,
        })
        .await
        .unwrap();

        assert!(repo.slug_taken("weather", None).await.unwrap());

        let err = repo
            .create(&ProductCreateDBRequest {
                owner_id: owner.id,
                fields: listed("Weather 2", "weather", "data"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_catalog_lists_only_public_listed_products(pool: PgPool) {
        let owner = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Products::new(&mut conn);

        for fields in [
            listed("Weather", "weather", "data"),
            listed("Geocoder", "geocoder", "maps"),
            ProductFields {
                visibility: ProductVisibility::Unlisted,
                status: ProductStatus::Preview,
                ..listed("Secret", "secret", "data")
            },
            ProductFields {
                name: "Draft".to_string(),
                ..Default::default()
            },
        ] {
            repo.create(&ProductCreateDBRequest { owner_id: owner.id, fields }).await.unwrap();
        }

        let all = CatalogFilter {
            skip: 0,
            limit: 10,
            category: None,
            search: None,
        };
        let listed_products = repo.list_catalog(&all).await.unwrap();
        assert_eq!(listed_products.len(), 2);
        assert_eq!(repo.count_catalog(&all).await.unwrap(), 2);

        let maps = CatalogFilter {
            category: Some("MAPS".to_string()),
            ..all.clone()
        };
        let maps_products = repo.list_catalog(&maps).await.unwrap();
        assert_eq!(maps_products.len(), 1);
        assert_eq!(maps_products[0].name, "Geocoder");

        assert_eq!(repo.list_categories().await.unwrap(), vec!["data".to_string(), "maps".to_string()]);

        // Unlisted products resolve by slug but are not browsable
        assert!(repo.get_listed_by_slug("secret").await.unwrap().is_some());
        assert!(repo.get_listed_by_slug("missing").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_treats_wildcards_literally(pool: PgPool) {
        let owner = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Products::new(&mut conn);

        for fields in [listed("100% uptime", "uptime", "ops"), listed("Weather", "weather", "data")] {
            repo.create(&ProductCreateDBRequest { owner_id: owner.id, fields }).await.unwrap();
        }

        let search = |term: &str| CatalogFilter {
            skip: 0,
            limit: 10,
            category: None,
            search: Some(term.to_string()),
        };
        let percent = repo.list_catalog(&search("%")).await.unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].name, "100% uptime");
        assert!(repo.list_catalog(&search("_")).await.unwrap().is_empty());

        let mine = ProductFilter {
            search: Some("%".to_string()),
            ..ProductFilter::new(0, 10)
        };
        assert_eq!(repo.count(&mine).await.unwrap(), 1);
    }
}
