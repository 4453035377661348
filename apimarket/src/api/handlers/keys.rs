//! Internal route the gateway calls to verify buyer API keys.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::api_keys::{KeyRejection, KeyVerifyRequest, KeyVerifyResponse},
    crypto::hash_api_key,
    db::{handlers::ApiKeys, models::api_keys::ApiKeyStatus},
    errors::{Error, Result},
    types::abbrev_uuid,
};

/// The gateway authenticates with `Authorization: Bearer <gateway.shared_secret>`
fn check_gateway_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match (presented, expected) {
        (Some(presented), Some(expected)) if hash_api_key(presented) == hash_api_key(expected) => Ok(()),
        _ => Err(Error::Unauthenticated {
            message: Some("Invalid gateway credentials".to_string()),
        }),
    }
}

/// Verify a buyer API key.
///
/// A key is accepted when it exists, is not revoked, has not expired and belongs to an
/// entitlement that is active or trialing. Accepted keys get their `last_used_at` refreshed.
#[tracing::instrument(skip_all)]
pub async fn verify_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<KeyVerifyRequest>,
) -> Result<Json<KeyVerifyResponse>> {
    check_gateway_secret(&headers, state.config.gateway.shared_secret.as_deref())?;

    let mut conn = state.admin_db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);

    let Some(row) = repo.find_for_verification(&hash_api_key(request.key.trim())).await? else {
        tracing::debug!("Unknown API key presented");
        return Ok(Json(KeyVerifyResponse::rejected(KeyRejection::Unknown)));
    };

    let rejection = if row.status == ApiKeyStatus::Revoked {
        Some(KeyRejection::Revoked)
    } else if row.expires_at.is_some_and(|expires_at| expires_at <= Utc::now()) {
        Some(KeyRejection::Expired)
    } else if !row.entitlement_status.is_open() {
        Some(KeyRejection::EntitlementInactive)
    } else {
        None
    };
    if let Some(reason) = rejection {
        tracing::debug!(api_key_id = %abbrev_uuid(&row.id), ?reason, "API key rejected");
        return Ok(Json(KeyVerifyResponse::rejected(reason)));
    }

    repo.touch_last_used(row.id).await?;

    Ok(Json(KeyVerifyResponse {
        valid: true,
        reason: None,
        user_id: Some(row.user_id),
        product_id: Some(row.product_id),
        plan_id: Some(row.plan_id),
        rate_limit: row.rate_limit,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::api_keys::{ApiKeyCreatedResponse, KeyRejection, KeyVerifyResponse};
    use crate::api::models::entitlements::EntitlementCancelResponse;
    use crate::db::handlers::{Profiles, Repository};
    use crate::db::models::entitlements::EntitlementDBResponse;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    fn gateway_header() -> (&'static str, String) {
        ("authorization", format!("Bearer {TEST_GATEWAY_SECRET}"))
    }

    async fn mint_key(app: &TestServer, pool: &PgPool) -> (ApiKeyCreatedResponse, EntitlementDBResponse) {
        let buyer = create_test_profile(pool).await;
        let entitlement = create_test_entitlement(pool, buyer.id).await;
        let (name, value) = auth_header(&buyer);
        let created = app
            .post(&format!("/api/v1/entitlements/{}/api-keys", entitlement.id))
            .add_header(name, value)
            .json(&json!({ "name": "gateway-test" }))
            .await
            .json();
        (created, entitlement)
    }

    async fn verify(app: &TestServer, key: &str) -> KeyVerifyResponse {
        let (name, value) = gateway_header();
        let response = app
            .post("/internal/v1/keys/verify")
            .add_header(name, value)
            .json(&json!({ "key": key }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_valid_key_is_accepted(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (created, entitlement) = mint_key(&app, &pool).await;

        let verdict = verify(&app, &created.key).await;
        assert!(verdict.valid);
        assert_eq!(verdict.reason, None);
        assert_eq!(verdict.user_id, Some(entitlement.user_id));
        assert_eq!(verdict.product_id, Some(entitlement.product_id));
        assert_eq!(verdict.plan_id, Some(entitlement.plan_id));

        let last_used: Option<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar("SELECT last_used_at FROM api_keys WHERE id = $1")
            .bind(created.api_key.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(last_used.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_gateway_secret_required(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        app.post("/internal/v1/keys/verify")
            .json(&json!({ "key": "mk_live_x" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        app.post("/internal/v1/keys/verify")
            .add_header("authorization", "Bearer not-the-secret")
            .json(&json!({ "key": "mk_live_x" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_key_is_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let verdict = verify(&app, "mk_live_doesnotexist").await;
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(KeyRejection::Unknown));
        assert_eq!(verdict.user_id, None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_revoked_key_is_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (created, _) = mint_key(&app, &pool).await;

        sqlx::query("UPDATE api_keys SET status = 'revoked' WHERE id = $1")
            .bind(created.api_key.id)
            .execute(&pool)
            .await
            .unwrap();

        let verdict = verify(&app, &created.key).await;
        assert_eq!(verdict.reason, Some(KeyRejection::Revoked));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_expired_key_is_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (created, _) = mint_key(&app, &pool).await;

        sqlx::query("UPDATE api_keys SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
            .bind(created.api_key.id)
            .execute(&pool)
            .await
            .unwrap();

        let verdict = verify(&app, &created.key).await;
        assert_eq!(verdict.reason, Some(KeyRejection::Expired));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancelling_entitlement_revokes_its_keys(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (created, entitlement) = mint_key(&app, &pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let buyer = Profiles::new(&mut conn).get_by_id(entitlement.user_id).await.unwrap().unwrap();
        let (name, value) = auth_header(&buyer);

        let response = app
            .post(&format!("/api/v1/entitlements/{}/cancel", entitlement.id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let cancelled: EntitlementCancelResponse = response.json();
        assert_eq!(cancelled.revoked_keys, 1);

        let status: String = sqlx::query_scalar("SELECT status FROM api_keys WHERE id = $1")
            .bind(created.api_key.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "revoked");

        let verdict = verify(&app, &created.key).await;
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(KeyRejection::Revoked));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_key_of_cancelled_entitlement_is_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (created, entitlement) = mint_key(&app, &pool).await;

        // Cancelled behind the API's back, so the key row stays active
        sqlx::query("UPDATE entitlements SET status = 'cancelled', cancelled_at = NOW() WHERE id = $1")
            .bind(entitlement.id)
            .execute(&pool)
            .await
            .unwrap();

        let verdict = verify(&app, &created.key).await;
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(KeyRejection::EntitlementInactive));
    }
}
