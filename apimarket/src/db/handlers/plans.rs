//! Database repository for plans and their endpoint group links.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        endpoint_groups::GroupDBResponse,
        plans::{PlanCreateDBRequest, PlanDBResponse, PlanStatus, PlanUpdateDBRequest},
    },
};
use crate::types::{GroupId, PlanId, ProductId, UserId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing plans
#[derive(Debug, Clone)]
pub struct PlanFilter {
    pub skip: i64,
    pub limit: i64,
    pub product_id: Option<ProductId>,
    pub owner_id: Option<UserId>,
    pub status: Option<PlanStatus>,
}

impl PlanFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            product_id: None,
            owner_id: None,
            status: None,
        }
    }

    pub fn for_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_status(mut self, status: PlanStatus) -> Self {
        self.status = Some(status);
        self
    }
}

pub struct Plans<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Plans<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Whether the creator already has another plan with this name, ignoring case
    #[instrument(skip(self), fields(owner = %abbrev_uuid(&owner_id)), err)]
    pub async fn name_taken(&mut self, owner_id: UserId, name: &str, exclude: Option<PlanId>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM plans WHERE owner_id = $1 AND LOWER(name) = LOWER($2) AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(owner_id)
        .bind(name.trim())
        .bind(exclude)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(taken)
    }

    /// Link a group to a plan. Linking twice is a no-op.
    #[instrument(skip(self), fields(plan_id = %abbrev_uuid(&plan_id), group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn link_group(&mut self, plan_id: PlanId, group_id: GroupId) -> Result<()> {
        sqlx::query("INSERT INTO plan_endpoint_groups (plan_id, group_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(plan_id)
            .bind(group_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(plan_id = %abbrev_uuid(&plan_id), group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn unlink_group(&mut self, plan_id: PlanId, group_id: GroupId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plan_endpoint_groups WHERE plan_id = $1 AND group_id = $2")
            .bind(plan_id)
            .bind(group_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Groups linked to a plan through the join table
    #[instrument(skip(self), fields(plan_id = %abbrev_uuid(&plan_id)), err)]
    pub async fn list_groups(&mut self, plan_id: PlanId) -> Result<Vec<GroupDBResponse>> {
        let groups = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            SELECT g.* FROM endpoint_groups g
            JOIN plan_endpoint_groups peg ON peg.group_id = g.id
            WHERE peg.plan_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(plan_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(groups)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Plans<'c> {
    type CreateRequest = PlanCreateDBRequest;
    type UpdateRequest = PlanUpdateDBRequest;
    type Response = PlanDBResponse;
    type Id = PlanId;
    type Filter = PlanFilter;

    #[instrument(skip(self, request), fields(name = %request.fields.name, product_id = %abbrev_uuid(&request.product_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let plan = sqlx::query_as::<_, PlanDBResponse>(
            r#"
            INSERT INTO plans (
                product_id, owner_id, name, description, billing_type, status, stripe_price_id,
                billing_interval, price, included_quota, unit_price, spend_cap, quota_cap
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(request.product_id)
        .bind(request.owner_id)
        .bind(f.name.trim())
        .bind(&f.description)
        .bind(f.billing_type)
        .bind(f.status)
        .bind(&f.stripe_price_id)
        .bind(f.billing_interval)
        .bind(f.price)
        .bind(f.included_quota)
        .bind(f.unit_price)
        .bind(f.spend_cap)
        .bind(f.quota_cap)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(plan)
    }

    #[instrument(skip(self), fields(plan_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let plan = sqlx::query_as::<_, PlanDBResponse>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(plan)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<PlanId>) -> Result<HashMap<PlanId, PlanDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let plans = sqlx::query_as::<_, PlanDBResponse>("SELECT * FROM plans WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(plans.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM plans WHERE 1=1");
        if let Some(product_id) = filter.product_id {
            query.push(" AND product_id = ");
            query.push_bind(product_id);
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        query.push(" ORDER BY created_at, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let plans = query.build_query_as::<PlanDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(plans)
    }

    #[instrument(skip(self), fields(plan_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plans WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(plan_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let plan = sqlx::query_as::<_, PlanDBResponse>(
            r#"
            UPDATE plans SET
                name = $2,
                description = $3,
                billing_type = $4,
                status = $5,
                stripe_price_id = $6,
                billing_interval = $7,
                price = $8,
                included_quota = $9,
                unit_price = $10,
                spend_cap = $11,
                quota_cap = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(f.name.trim())
        .bind(&f.description)
        .bind(f.billing_type)
        .bind(f.status)
        .bind(&f.stripe_price_id)
        .bind(f.billing_interval)
        .bind(f.price)
        .bind(f.included_quota)
        .bind(f.unit_price)
        .bind(f.spend_cap)
        .bind(f.quota_cap)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(plan)
    }
}
