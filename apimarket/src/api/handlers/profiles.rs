//! HTTP handlers for the caller's own profile.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::profiles::{CurrentUser, ProfileResponse, ProfileUpdate},
    auth::current_user::sync_profile,
    db::{
        handlers::{Profiles, Repository},
        models::profiles::ProfileUpdateDBRequest,
    },
    errors::{Error, Result},
    types::abbrev_uuid,
    validation::{FieldErrors, check_http_url},
};

#[utoipa::path(
    post,
    path = "/profile/sync",
    tag = "profile",
    summary = "Sync profile",
    description = "Upsert the caller's profile from the verified token claims. Needed once before creating products when automatic sync is disabled.",
    responses(
        (status = 200, description = "Profile synced", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn sync_current_profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ProfileResponse>> {
    let profile = sync_profile(&state, &current_user).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    summary = "Get profile",
    responses(
        (status = 200, description = "The caller's profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile has never been synced"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ProfileResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = Profiles::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Profile".to_string(),
            id: current_user.id.to_string(),
        })?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    patch,
    path = "/profile",
    tag = "profile",
    summary = "Update profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile has never been synced"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let mut errors = FieldErrors::default();
    if let Some(Some(avatar_url)) = &update.avatar_url {
        check_http_url(&mut errors, "avatar_url", Some(avatar_url));
    }
    errors.into_result()?;

    let trim = |value: Option<Option<String>>| value.map(|inner| inner.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()));
    let request = ProfileUpdateDBRequest {
        display_name: trim(update.display_name),
        avatar_url: trim(update.avatar_url),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = Profiles::new(&mut conn).update(current_user.id, &request).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::profiles::ProfileResponse;
    use crate::test_utils::{auth_header, create_test_app, create_test_config, create_test_profile, sign_test_token};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    #[test_log::test]
    async fn test_sync_creates_profile_from_claims(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let id = Uuid::new_v4();
        let token = sign_test_token(&create_test_config(), id, "new-creator@example.com", None);

        let response = app
            .post("/api/v1/profile/sync")
            .add_header("authorization", format!("Bearer {token}"))
            .await;

        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.id, id);
        assert_eq!(profile.email, "new-creator@example.com");
        assert_eq!(profile.display_name.as_deref(), Some("Test User"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_clear_profile_fields(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_profile(&pool).await;
        let (name, value) = auth_header(&user);

        let response = app
            .patch("/api/v1/profile")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "display_name": "  Ada  ", "avatar_url": "https://cdn.example.com/ada.png" }))
            .await;
        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.display_name.as_deref(), Some("Ada"));
        assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn.example.com/ada.png"));

        let response = app
            .patch("/api/v1/profile")
            .add_header(name, value)
            .json(&json!({ "avatar_url": null }))
            .await;
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.display_name.as_deref(), Some("Ada"));
        assert_eq!(profile.avatar_url, None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invalid_avatar_url_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_profile(&pool).await;
        let (name, value) = auth_header(&user);

        let response = app
            .patch("/api/v1/profile")
            .add_header(name, value)
            .json(&json!({ "avatar_url": "not a url" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert!(body["field_errors"]["avatar_url"].is_string());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_requires_authentication(pool: PgPool) {
        let app = create_test_app(pool).await;
        app.get("/api/v1/profile").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}
