//! Database repository for endpoints.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::endpoints::{EndpointCreateDBRequest, EndpointDBResponse, EndpointStatus, EndpointUpdateDBRequest},
};
use crate::types::{EndpointId, GroupId, PlanId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing endpoints
#[derive(Debug, Clone)]
pub struct EndpointFilter {
    pub skip: i64,
    pub limit: i64,
    pub owner_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub plan_id: Option<PlanId>,
    pub status: Option<EndpointStatus>,
}

impl EndpointFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            owner_id: None,
            group_id: None,
            plan_id: None,
            status: None,
        }
    }

    pub fn owned_by(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

pub struct Endpoints<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Endpoints<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &EndpointFilter) {
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        if let Some(group_id) = filter.group_id {
            query.push(" AND group_id = ");
            query.push_bind(group_id);
        }
        if let Some(plan_id) = filter.plan_id {
            query.push(" AND plan_id = ");
            query.push_bind(plan_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &EndpointFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM endpoints WHERE 1=1");
        Self::push_filter(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Whether another non-draft endpoint in the group already uses this name, ignoring case
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn name_taken_in_group(&mut self, group_id: GroupId, name: &str, exclude: Option<EndpointId>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM endpoints
                WHERE group_id = $1 AND LOWER(name) = LOWER($2) AND status <> 'draft'
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(group_id)
        .bind(name.trim())
        .bind(exclude)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(taken)
    }

    /// Clear the primary flag on the other endpoints of a group
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn clear_primary(&mut self, group_id: GroupId, except: EndpointId) -> Result<u64> {
        let result = sqlx::query("UPDATE endpoints SET is_primary = false, updated_at = NOW() WHERE group_id = $1 AND id <> $2 AND is_primary")
            .bind(group_id)
            .bind(except)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Buyer-visible endpoints across a set of groups
    #[instrument(skip(self, group_ids), fields(count = group_ids.len()), err)]
    pub async fn list_public_in_groups(&mut self, group_ids: &[GroupId]) -> Result<Vec<EndpointDBResponse>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let endpoints = sqlx::query_as::<_, EndpointDBResponse>(
            r#"
            SELECT * FROM endpoints
            WHERE group_id = ANY($1) AND status IN ('preview', 'public') AND visibility = 'public'
            ORDER BY is_primary DESC, name
            "#,
        )
        .bind(group_ids)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(endpoints)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Endpoints<'c> {
    type CreateRequest = EndpointCreateDBRequest;
    type UpdateRequest = EndpointUpdateDBRequest;
    type Response = EndpointDBResponse;
    type Id = EndpointId;
    type Filter = EndpointFilter;

    #[instrument(skip(self, request), fields(name = %request.fields.name, owner = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let endpoint = sqlx::query_as::<_, EndpointDBResponse>(
            r#"
            INSERT INTO endpoints (
                owner_id, group_id, plan_id, name, path, method, status, is_primary,
                description, input_schema, output_schema, visibility
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(request.owner_id)
        .bind(f.group_id)
        .bind(f.plan_id)
        .bind(f.name.trim())
        .bind(&f.path)
        .bind(f.method)
        .bind(f.status)
        .bind(f.is_primary)
        .bind(&f.description)
        .bind(&f.input_schema)
        .bind(&f.output_schema)
        .bind(f.visibility)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(endpoint)
    }

    #[instrument(skip(self), fields(endpoint_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let endpoint = sqlx::query_as::<_, EndpointDBResponse>("SELECT * FROM endpoints WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(endpoint)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<EndpointId>) -> Result<HashMap<EndpointId, EndpointDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let endpoints = sqlx::query_as::<_, EndpointDBResponse>("SELECT * FROM endpoints WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(endpoints.into_iter().map(|e| (e.id, e)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM endpoints WHERE 1=1");
        Self::push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let endpoints = query.build_query_as::<EndpointDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(endpoints)
    }

    #[instrument(skip(self), fields(endpoint_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM endpoints WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(endpoint_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let endpoint = sqlx::query_as::<_, EndpointDBResponse>(
            r#"
            UPDATE endpoints SET
                group_id = $2,
                plan_id = $3,
                name = $4,
                path = $5,
                method = $6,
                status = $7,
                is_primary = $8,
                description = $9,
                input_schema = $10,
                output_schema = $11,
                visibility = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(f.group_id)
        .bind(f.plan_id)
        .bind(f.name.trim())
        .bind(&f.path)
        .bind(f.method)
        .bind(f.status)
        .bind(f.is_primary)
        .bind(&f.description)
        .bind(&f.input_schema)
        .bind(&f.output_schema)
        .bind(f.visibility)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(endpoint)
    }
}
