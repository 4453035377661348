//! HTTP handlers for configuration retrieval endpoints.

use axum::{Json, extract::State};

use crate::{AppState, api::models::config::ConfigResponse};

#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    summary = "Get config",
    description = "Marketplace metadata used by the storefront: display name, docs link and key prefix",
    responses(
        (status = 200, description = "Got metadata", body = ConfigResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let metadata = &state.config.metadata;
    Json(ConfigResponse {
        name: metadata.name.clone(),
        docs_url: metadata.docs_url.clone(),
        support_email: metadata.support_email.clone(),
        api_key_prefix: state.config.api_keys.prefix.clone(),
        catalog_page_size: metadata.catalog_page_size,
    })
}
