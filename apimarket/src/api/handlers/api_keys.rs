//! HTTP handlers for buyer API keys.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        api_keys::{ApiKeyCreate, ApiKeyCreatedResponse, ApiKeyResponse, ApiKeyUpdate, ListApiKeysQuery},
        pagination::PaginatedResponse,
        profiles::CurrentUser,
    },
    auth::permissions::ensure_owner,
    crypto::{generate_api_key, hash_api_key, key_preview},
    db::{
        handlers::{ApiKeys, Entitlements, Repository, api_keys::ApiKeyFilter},
        models::api_keys::{ApiKeyCreateDBRequest, ApiKeyDBResponse, ApiKeyStatus, ApiKeyUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{ApiKeyId, EntitlementId, Operation, Resource, abbrev_uuid},
    validation::FieldErrors,
};

const MAX_KEY_NAME_LENGTH: usize = 100;

fn check_key_name(name: &str) -> std::result::Result<String, FieldErrors> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FieldErrors::single("name", "Name is required"));
    }
    if name.chars().count() > MAX_KEY_NAME_LENGTH {
        return Err(FieldErrors::single(
            "name",
            format!("Name must be at most {MAX_KEY_NAME_LENGTH} characters"),
        ));
    }
    Ok(name.to_string())
}

async fn owned_key(repo: &mut ApiKeys<'_>, user: &CurrentUser, id: ApiKeyId, operation: Operation) -> Result<ApiKeyDBResponse> {
    let key = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "API key".to_string(),
        id: id.to_string(),
    })?;
    ensure_owner(user, key.user_id, Resource::ApiKeys, operation)?;
    Ok(key)
}

#[utoipa::path(
    post,
    path = "/entitlements/{id}/api-keys",
    tag = "api_keys",
    summary = "Create API key",
    description = "Mints a key against an open entitlement. The full key is returned only in this response.",
    params(
        ("id" = uuid::Uuid, Path, description = "Entitlement ID"),
    ),
    request_body = ApiKeyCreate,
    responses(
        (status = 201, description = "API key created", body = ApiKeyCreatedResponse),
        (status = 400, description = "Entitlement is not active"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the caller's entitlement"),
        (status = 404, description = "Entitlement not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(entitlement_id = %abbrev_uuid(&id)))]
pub async fn create_api_key(
    State(state): State<AppState>,
    Path(id): Path<EntitlementId>,
    current_user: CurrentUser,
    Json(request): Json<ApiKeyCreate>,
) -> Result<(StatusCode, Json<ApiKeyCreatedResponse>)> {
    let name = check_key_name(&request.name)?;
    let expires_at = match request.expires_in.or(state.config.api_keys.default_expiry) {
        Some(lifetime) => {
            let lifetime = chrono::Duration::from_std(lifetime)
                .map_err(|_| Error::from(FieldErrors::single("expires_in", "Expiry is too far in the future")))?;
            Some(Utc::now() + lifetime)
        }
        None => None,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let entitlement = Entitlements::new(&mut tx).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Entitlement".to_string(),
        id: id.to_string(),
    })?;
    ensure_owner(&current_user, entitlement.user_id, Resource::ApiKeys, Operation::CreateOwn)?;
    if !entitlement.status.is_open() {
        return Err(Error::BadRequest {
            message: "API keys can only be created for an active subscription".to_string(),
        });
    }

    let prefix = &state.config.api_keys.prefix;
    let key = generate_api_key(prefix);
    let api_key = ApiKeys::new(&mut tx)
        .create(&ApiKeyCreateDBRequest {
            entitlement_id: entitlement.id,
            user_id: entitlement.user_id,
            name,
            key_hash: hash_api_key(&key),
            key_preview: key_preview(&key, prefix, state.config.api_keys.preview_length),
            expires_at,
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(api_key_id = %abbrev_uuid(&api_key.id), "API key created");
    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreatedResponse {
            api_key: ApiKeyResponse::from(api_key),
            key,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/me/api-keys",
    tag = "api_keys",
    summary = "List my API keys",
    params(ListApiKeysQuery),
    responses(
        (status = 200, description = "The caller's keys, newest first", body = PaginatedResponse<ApiKeyResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_api_keys(
    State(state): State<AppState>,
    Query(query): Query<ListApiKeysQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<ApiKeyResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ApiKeyFilter::new(skip, limit).for_user(current_user.id);
    filter.status = query.status;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);
    let keys = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        keys.into_iter().map(ApiKeyResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    patch,
    path = "/api-keys/{id}",
    tag = "api_keys",
    summary = "Rename API key",
    params(
        ("id" = uuid::Uuid, Path, description = "API key ID"),
    ),
    request_body = ApiKeyUpdate,
    responses(
        (status = 200, description = "API key updated", body = ApiKeyResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the caller's key"),
        (status = 404, description = "API key not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(api_key_id = %abbrev_uuid(&id)))]
pub async fn update_api_key(
    State(state): State<AppState>,
    Path(id): Path<ApiKeyId>,
    current_user: CurrentUser,
    Json(request): Json<ApiKeyUpdate>,
) -> Result<Json<ApiKeyResponse>> {
    let name = request.name.as_deref().map(check_key_name).transpose()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);
    owned_key(&mut repo, &current_user, id, Operation::UpdateOwn).await?;

    let updated = repo.update(id, &ApiKeyUpdateDBRequest { name }).await?;
    Ok(Json(ApiKeyResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/api-keys/{id}",
    tag = "api_keys",
    summary = "Revoke API key",
    description = "Revoked keys stay listed with status `revoked` and are refused by the gateway.",
    params(
        ("id" = uuid::Uuid, Path, description = "API key ID"),
    ),
    responses(
        (status = 200, description = "API key revoked", body = ApiKeyResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the caller's key"),
        (status = 404, description = "API key not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all, fields(api_key_id = %abbrev_uuid(&id)))]
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Path(id): Path<ApiKeyId>,
    current_user: CurrentUser,
) -> Result<Json<ApiKeyResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);
    let key = owned_key(&mut repo, &current_user, id, Operation::DeleteOwn).await?;
    if key.status == ApiKeyStatus::Revoked {
        return Ok(Json(ApiKeyResponse::from(key)));
    }

    let revoked = repo.revoke(id).await?;
    tracing::info!("API key revoked");
    Ok(Json(ApiKeyResponse::from(revoked)))
}
