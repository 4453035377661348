//! Database repository for endpoint groups.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::endpoint_groups::{GroupCreateDBRequest, GroupDBResponse, GroupDeletion, GroupStatus, GroupUpdateDBRequest},
};
use crate::types::{GroupId, Operation, ProductId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing endpoint groups
#[derive(Debug, Clone)]
pub struct GroupFilter {
    pub skip: i64,
    pub limit: i64,
    pub product_id: Option<ProductId>,
    pub status: Option<GroupStatus>,
}

impl GroupFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            product_id: None,
            status: None,
        }
    }

    pub fn for_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_status(mut self, status: GroupStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Unlinked endpoints return to draft: only drafts may exist without a group.
const UNLINK_ENDPOINT: &str = "group_id = NULL, status = 'draft', is_primary = false, updated_at = NOW()";

pub struct EndpointGroups<'c> {
    db: &'c mut PgConnection,
}

impl<'c> EndpointGroups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &GroupFilter) {
        if let Some(product_id) = filter.product_id {
            query.push(" AND product_id = ");
            query.push_bind(product_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
    }

    /// Count groups matching the filter (pagination ignored)
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &GroupFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM endpoint_groups WHERE 1=1");
        Self::push_filter(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Clear the default flag on every other group of the product
    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&product_id)), err)]
    pub async fn clear_default(&mut self, product_id: ProductId, except: GroupId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE endpoint_groups SET is_default = false, updated_at = NOW() WHERE product_id = $1 AND id <> $2 AND is_default",
        )
        .bind(product_id)
        .bind(except)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Number of endpoints in the group that belong to someone other than `owner_id`
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn count_foreign_endpoints(&mut self, group_id: GroupId, owner_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM endpoints WHERE group_id = $1 AND owner_id <> $2")
            .bind(group_id)
            .bind(owner_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Delete a group on behalf of `owner_id`.
    ///
    /// The owner's endpoints are unlinked (kept, with `group_id` cleared and status back to
    /// draft) and the group's plan links removed. If endpoints owned by anyone else still
    /// reference the group nothing is changed and [`DbError::ProtectedEntity`] is returned.
    /// Run this inside a transaction: the group row is locked first so no endpoint can be
    /// attached between the check and the delete.
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id), owner = %abbrev_uuid(&owner_id)), err)]
    pub async fn delete_unlinking_endpoints(&mut self, group_id: GroupId, owner_id: UserId) -> Result<GroupDeletion> {
        let locked: Option<GroupId> = sqlx::query_scalar("SELECT id FROM endpoint_groups WHERE id = $1 FOR UPDATE")
            .bind(group_id)
            .fetch_optional(&mut *self.db)
            .await?;
        if locked.is_none() {
            return Err(DbError::NotFound);
        }

        let foreign = self.count_foreign_endpoints(group_id, owner_id).await?;
        if foreign > 0 {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteOwn,
                reason: format!("{foreign} endpoint(s) owned by other users still reference this group"),
                entity_type: "endpoint group".to_string(),
                entity_id: Some(group_id.to_string()),
            });
        }

        let unlinked = sqlx::query(&format!("UPDATE endpoints SET {UNLINK_ENDPOINT} WHERE group_id = $1 AND owner_id = $2"))
            .bind(group_id)
            .bind(owner_id)
            .execute(&mut *self.db)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM plan_endpoint_groups WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *self.db)
            .await?;

        self.delete(group_id).await?;

        Ok(GroupDeletion {
            unlinked_endpoints: unlinked,
        })
    }

    /// Detach every group of a product from its endpoints ahead of the product's deletion.
    ///
    /// Same rules as [`Self::delete_unlinking_endpoints`], applied to all of the product's
    /// groups at once: endpoints owned by anyone other than `owner_id` block the release, the
    /// owner's endpoints are unlinked. The groups themselves go with the product. Run this
    /// inside the transaction that deletes the product.
    #[instrument(skip(self), fields(product_id = %abbrev_uuid(&product_id), owner = %abbrev_uuid(&owner_id)), err)]
    pub async fn release_product_groups(&mut self, product_id: ProductId, owner_id: UserId) -> Result<u64> {
        sqlx::query("SELECT id FROM endpoint_groups WHERE product_id = $1 FOR UPDATE")
            .bind(product_id)
            .execute(&mut *self.db)
            .await?;

        let foreign: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM endpoints e
            JOIN endpoint_groups g ON g.id = e.group_id
            WHERE g.product_id = $1 AND e.owner_id <> $2
            "#,
        )
        .bind(product_id)
        .bind(owner_id)
        .fetch_one(&mut *self.db)
        .await?;
        if foreign > 0 {
            return Err(DbError::ProtectedEntity {
                operation: Operation::DeleteOwn,
                reason: format!("{foreign} endpoint(s) owned by other users still reference its groups"),
                entity_type: "product".to_string(),
                entity_id: Some(product_id.to_string()),
            });
        }

        let unlinked = sqlx::query(&format!(
            "UPDATE endpoints SET {UNLINK_ENDPOINT} WHERE owner_id = $2 AND group_id IN (SELECT id FROM endpoint_groups WHERE product_id = $1)"
        ))
        .bind(product_id)
        .bind(owner_id)
        .execute(&mut *self.db)
        .await?
        .rows_affected();

        Ok(unlinked)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for EndpointGroups<'c> {
    type CreateRequest = GroupCreateDBRequest;
    type UpdateRequest = GroupUpdateDBRequest;
    type Response = GroupDBResponse;
    type Id = GroupId;
    type Filter = GroupFilter;

    #[instrument(skip(self, request), fields(name = %request.fields.name, product_id = %abbrev_uuid(&request.product_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            INSERT INTO endpoint_groups (
                product_id, plan_id, owner_id, name, description, status, is_default,
                auth_type, injection_config, secret_ref
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(request.product_id)
        .bind(f.plan_id)
        .bind(request.owner_id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.status)
        .bind(f.is_default)
        .bind(f.auth_type)
        .bind(&f.injection_config)
        .bind(&f.secret_ref)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(group)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let group = sqlx::query_as::<_, GroupDBResponse>("SELECT * FROM endpoint_groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(group)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<GroupId>) -> Result<HashMap<GroupId, GroupDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let groups = sqlx::query_as::<_, GroupDBResponse>("SELECT * FROM endpoint_groups WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(groups.into_iter().map(|g| (g.id, g)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM endpoint_groups WHERE 1=1");
        Self::push_filter(&mut query, filter);
        query.push(" ORDER BY is_default DESC, name, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let groups = query.build_query_as::<GroupDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(groups)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM endpoint_groups WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let f = &request.fields;
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            UPDATE endpoint_groups SET
                plan_id = $2,
                name = $3,
                description = $4,
                status = $5,
                is_default = $6,
                auth_type = $7,
                injection_config = $8,
                secret_ref = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(f.plan_id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.status)
        .bind(f.is_default)
        .bind(f.auth_type)
        .bind(&f.injection_config)
        .bind(&f.secret_ref)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Endpoints;
    use crate::db::models::endpoint_groups::GroupFields;
    use crate::db::models::endpoints::EndpointStatus;
    use crate::test_utils::{create_test_endpoint, create_test_group, create_test_product, create_test_profile};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_unlinks_owner_endpoints(pool: PgPool) {
        let owner = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let group = create_test_group(&pool, owner.id, product.id).await;
        let first = create_test_endpoint(&pool, owner.id, Some(group.id), "First").await;
        let second = create_test_endpoint(&pool, owner.id, Some(group.id), "Second").await;
        sqlx::query("UPDATE endpoints SET status = 'public', path = '/v1/second', method = 'GET', is_primary = true WHERE id = $1")
            .bind(second.id)
            .execute(&pool)
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        let deletion = EndpointGroups::new(&mut tx)
            .delete_unlinking_endpoints(group.id, owner.id)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(deletion.unlinked_endpoints, 2);

        let mut conn = pool.acquire().await.unwrap();
        assert!(EndpointGroups::new(&mut conn).get_by_id(group.id).await.unwrap().is_none());
        let mut endpoints = Endpoints::new(&mut conn);
        for id in [first.id, second.id] {
            let endpoint = endpoints.get_by_id(id).await.unwrap().expect("endpoint kept");
            assert_eq!(endpoint.group_id, None);
            assert_eq!(endpoint.status, EndpointStatus::Draft);
            assert!(!endpoint.is_primary);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_refused_while_foreign_endpoints_remain(pool: PgPool) {
        let owner = create_test_profile(&pool).await;
        let other = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;
        let group = create_test_group(&pool, owner.id, product.id).await;
        let own = create_test_endpoint(&pool, owner.id, Some(group.id), "Mine").await;
        create_test_endpoint(&pool, other.id, Some(group.id), "Theirs").await;

        let mut tx = pool.begin().await.unwrap();
        let err = EndpointGroups::new(&mut tx)
            .delete_unlinking_endpoints(group.id, owner.id)
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));

        let mut conn = pool.acquire().await.unwrap();
        assert!(EndpointGroups::new(&mut conn).get_by_id(group.id).await.unwrap().is_some());
        let kept = Endpoints::new(&mut conn).get_by_id(own.id).await.unwrap().unwrap();
        assert_eq!(kept.group_id, Some(group.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_clear_default_leaves_one_default(pool: PgPool) {
        let owner = create_test_profile(&pool).await;
        let product = create_test_product(&pool, owner.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = EndpointGroups::new(&mut conn);
        let mut ids = Vec::new();
        for name in ["A", "B"] {
            let group = repo
                .create(&GroupCreateDBRequest {
                    product_id: product.id,
                    owner_id: owner.id,
                    fields: GroupFields {
                        name: name.to_string(),
                        is_default: true,
                        ..Default::default()
                    },
                })
                .await
                .unwrap();
            ids.push(group.id);
        }

        assert_eq!(repo.clear_default(product.id, ids[1]).await.unwrap(), 1);
        let groups = repo.get_bulk(ids.clone()).await.unwrap();
        assert!(!groups[&ids[0]].is_default);
        assert!(groups[&ids[1]].is_default);
    }
}
