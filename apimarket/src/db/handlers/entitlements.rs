//! Database access for entitlements.
//!
//! Entitlements are append-and-cancel records rather than editable entities, so they expose
//! purpose-built methods instead of the generic [`Repository`](super::Repository) surface.

use crate::db::{
    errors::{DbError, Result},
    models::entitlements::{EntitlementCancellation, EntitlementCreateDBRequest, EntitlementDBResponse, EntitlementStatus},
};
use crate::types::{EntitlementId, PlanId, ProductId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Entitlement rows joined with the names shown to buyers
const SELECT_WITH_NAMES: &str = r#"
    SELECT e.id, e.user_id, e.product_id, e.plan_id, e.status,
           p.name AS product_name, pl.name AS plan_name,
           e.created_at, e.updated_at, e.cancelled_at
    FROM entitlements e
    JOIN products p ON p.id = e.product_id
    JOIN plans pl ON pl.id = e.plan_id
"#;

#[derive(Debug, Clone)]
pub struct EntitlementFilter {
    pub skip: i64,
    pub limit: i64,
    pub user_id: Option<UserId>,
    pub status: Option<EntitlementStatus>,
}

impl EntitlementFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            user_id: None,
            status: None,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

pub struct Entitlements<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Entitlements<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &EntitlementFilter) {
        if let Some(user_id) = filter.user_id {
            query.push(" AND e.user_id = ");
            query.push_bind(user_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND e.status = ");
            query.push_bind(status);
        }
    }

    /// Count entitlements matching the filter (pagination ignored)
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &EntitlementFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM entitlements e WHERE 1=1");
        Self::push_filter(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), plan_id = %abbrev_uuid(&request.plan_id)), err)]
    pub async fn create(&mut self, request: &EntitlementCreateDBRequest) -> Result<EntitlementDBResponse> {
        let id: EntitlementId = sqlx::query_scalar(
            "INSERT INTO entitlements (user_id, product_id, plan_id, status) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(request.user_id)
        .bind(request.product_id)
        .bind(request.plan_id)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(entitlement_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: EntitlementId) -> Result<Option<EntitlementDBResponse>> {
        let entitlement = sqlx::query_as::<_, EntitlementDBResponse>(&format!("{SELECT_WITH_NAMES} WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(entitlement)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &EntitlementFilter) -> Result<Vec<EntitlementDBResponse>> {
        let mut query = QueryBuilder::new(format!("{SELECT_WITH_NAMES} WHERE 1=1"));
        Self::push_filter(&mut query, filter);
        query.push(" ORDER BY e.created_at DESC, e.id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let entitlements = query.build_query_as::<EntitlementDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(entitlements)
    }

    /// Active or trialing entitlements on a product
    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&product_id)), err)]
    pub async fn count_open_for_product(&mut self, product_id: ProductId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entitlements WHERE product_id = $1 AND status <> 'cancelled'")
            .bind(product_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Active or trialing entitlements on a plan
    #[instrument(skip(self), fields(plan_id = %abbrev_uuid(&plan_id)), err)]
    pub async fn count_open_for_plan(&mut self, plan_id: PlanId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entitlements WHERE plan_id = $1 AND status <> 'cancelled'")
            .bind(plan_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Whether the buyer already holds an open entitlement on the product
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), product_id = %abbrev_uuid(&product_id)), err)]
    pub async fn has_open(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM entitlements WHERE user_id = $1 AND product_id = $2 AND status <> 'cancelled')",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(exists)
    }

    /// Cancel an entitlement and revoke its active keys. Run inside a transaction.
    ///
    /// Cancelling an already-cancelled entitlement keeps the original `cancelled_at`.
    #[instrument(skip(self), fields(entitlement_id = %abbrev_uuid(&id)), err)]
    pub async fn cancel(&mut self, id: EntitlementId) -> Result<EntitlementCancellation> {
        let updated = sqlx::query(
            r#"
            UPDATE entitlements SET
                status = 'cancelled',
                cancelled_at = COALESCE(cancelled_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        let revoked_keys = sqlx::query("UPDATE api_keys SET status = 'revoked' WHERE entitlement_id = $1 AND status = 'active'")
            .bind(id)
            .execute(&mut *self.db)
            .await?
            .rows_affected();

        let entitlement = self.get_by_id(id).await?.ok_or(DbError::NotFound)?;
        Ok(EntitlementCancellation { entitlement, revoked_keys })
    }
}
