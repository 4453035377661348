//! Database repository for buyer API keys.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::api_keys::{ApiKeyCreateDBRequest, ApiKeyDBResponse, ApiKeyStatus, ApiKeyUpdateDBRequest, KeyVerificationRow},
};
use crate::types::{ApiKeyId, EntitlementId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing API keys
#[derive(Debug, Clone)]
pub struct ApiKeyFilter {
    pub skip: i64,
    pub limit: i64,
    pub user_id: Option<UserId>,
    pub entitlement_id: Option<EntitlementId>,
    pub status: Option<ApiKeyStatus>,
}

impl ApiKeyFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            user_id: None,
            entitlement_id: None,
            status: None,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

pub struct ApiKeys<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ApiKeys<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &ApiKeyFilter) {
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ");
            query.push_bind(user_id);
        }
        if let Some(entitlement_id) = filter.entitlement_id {
            query.push(" AND entitlement_id = ");
            query.push_bind(entitlement_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ApiKeyFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM api_keys WHERE 1=1");
        Self::push_filter(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Mark a key revoked. The row is kept for auditing.
    #[instrument(skip(self), fields(api_key_id = %abbrev_uuid(&id)), err)]
    pub async fn revoke(&mut self, id: ApiKeyId) -> Result<ApiKeyDBResponse> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(
            r#"
            UPDATE api_keys SET status = 'revoked'
            WHERE id = $1
            RETURNING id, entitlement_id, user_id, name, key_preview, status, last_used_at, expires_at, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(key)
    }

    /// Resolve a key hash to everything the gateway needs, joined through the entitlement
    #[instrument(skip(self, key_hash), err)]
    pub async fn find_for_verification(&mut self, key_hash: &str) -> Result<Option<KeyVerificationRow>> {
        let row = sqlx::query_as::<_, KeyVerificationRow>(
            r#"
            SELECT k.id, k.user_id, k.status, k.expires_at,
                   e.status AS entitlement_status, e.product_id, e.plan_id,
                   p.rate_limit
            FROM api_keys k
            JOIN entitlements e ON e.id = k.entitlement_id
            JOIN products p ON p.id = e.product_id
            WHERE k.key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self), fields(api_key_id = %abbrev_uuid(&id)), err)]
    pub async fn touch_last_used(&mut self, id: ApiKeyId) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

const KEY_COLUMNS: &str = "id, entitlement_id, user_id, name, key_preview, status, last_used_at, expires_at, created_at";

#[async_trait::async_trait]
impl<'c> Repository for ApiKeys<'c> {
    type CreateRequest = ApiKeyCreateDBRequest;
    type UpdateRequest = ApiKeyUpdateDBRequest;
    type Response = ApiKeyDBResponse;
    type Id = ApiKeyId;
    type Filter = ApiKeyFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(&format!(
            r#"
            INSERT INTO api_keys (entitlement_id, user_id, name, key_hash, key_preview, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {KEY_COLUMNS}
            "#
        ))
        .bind(request.entitlement_id)
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.key_hash)
        .bind(&request.key_preview)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(key)
    }

    #[instrument(skip(self), fields(api_key_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(&format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(key)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ApiKeyId>) -> Result<HashMap<ApiKeyId, ApiKeyDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys = sqlx::query_as::<_, ApiKeyDBResponse>(&format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(keys.into_iter().map(|k| (k.id, k)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE 1=1"));
        Self::push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let keys = query.build_query_as::<ApiKeyDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(keys)
    }

    #[instrument(skip(self), fields(api_key_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(api_key_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(&format!(
            "UPDATE api_keys SET name = COALESCE($2, name) WHERE id = $1 RETURNING {KEY_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.name)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_entitlement, create_test_profile};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_key_lifecycle(pool: PgPool) {
        let buyer = create_test_profile(&pool).await;
        let entitlement = create_test_entitlement(&pool, buyer.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiKeys::new(&mut conn);
        let key = repo
            .create(&ApiKeyCreateDBRequest {
                entitlement_id: entitlement.id,
                user_id: buyer.id,
                name: "ci".to_string(),
                key_hash: "a".repeat(64),
                key_preview: "mk_live_abcd…".to_string(),
                expires_at: None,
            })
            .await
            .unwrap();
        assert_eq!(key.status, ApiKeyStatus::Active);

        let found = repo.find_for_verification(&"a".repeat(64)).await.unwrap().unwrap();
        assert_eq!(found.id, key.id);
        assert_eq!(found.product_id, entitlement.product_id);
        assert!(found.entitlement_status.is_open());

        repo.touch_last_used(key.id).await.unwrap();
        let renamed = repo
            .update(
                key.id,
                &ApiKeyUpdateDBRequest {
                    name: Some("deploy".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "deploy");
        assert!(renamed.last_used_at.is_some());

        let revoked = repo.revoke(key.id).await.unwrap();
        assert_eq!(revoked.status, ApiKeyStatus::Revoked);
        assert_eq!(repo.list(&ApiKeyFilter::new(0, 10).for_user(buyer.id)).await.unwrap().len(), 1);
    }
}
