use crate::{
    AppState,
    api::models::profiles::CurrentUser,
    auth::session::{self, Claims},
    config::Config,
    db::{
        handlers::{Profiles, Repository},
        models::profiles::ProfileUpsertDBRequest,
    },
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Extract the access token from the `Authorization` header if it carries a Bearer token
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(token)): Bearer token found
/// - Some(Err(error)): Header present but not valid UTF-8
fn bearer_token(parts: &Parts) -> Option<Result<&str>> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = match header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };
    value.strip_prefix("Bearer ").map(|token| Ok(token.trim()))
}

/// Extract the access token from the session cookie if present
fn cookie_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<Result<&'a str>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;
    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };

    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| Ok(value))
}

fn current_user_from_claims(claims: Claims, config: &Config) -> CurrentUser {
    let is_admin = claims.role.as_deref() == Some(config.auth.admin_role.as_str());
    CurrentUser {
        id: claims.sub,
        email: claims.email.unwrap_or_default(),
        display_name: claims.user_metadata.full_name,
        avatar_url: claims.user_metadata.avatar_url,
        role: claims.role,
        is_admin,
    }
}

/// Upsert the caller's profile with the elevated pool
#[instrument(skip_all, fields(user_id = %crate::types::abbrev_uuid(&user.id)), err)]
pub async fn sync_profile(state: &AppState, user: &CurrentUser) -> Result<crate::db::models::profiles::ProfileDBResponse> {
    let mut conn = state.admin_db.acquire().await.map_err(crate::db::errors::DbError::from)?;
    let profile = Profiles::new(&mut conn)
        .create(&ProfileUpsertDBRequest {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        })
        .await?;
    Ok(profile)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Bearer first (programmatic clients), then the browser session cookie
        let token = match bearer_token(parts) {
            Some(token) => token?,
            None => match cookie_token(parts, &state.config.auth.cookie_name) {
                Some(token) => token?,
                None => {
                    trace!("No authentication credentials found in request");
                    return Err(Error::Unauthenticated { message: None });
                }
            },
        };

        let claims = session::verify_access_token(token, &state.config)?;
        let user = current_user_from_claims(claims, &state.config);
        debug!("Authenticated user: {}", user.id);

        if state.config.auth.auto_sync_profiles {
            sync_profile(state, &user).await?;
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_config, create_test_state, sign_test_token};
    use axum::extract::FromRequestParts as _;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn parts_with_header(name: &str, value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(name, value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_bearer_token_authenticates_and_syncs_profile(pool: PgPool) {
        let state = create_test_state(pool.clone());
        let id = Uuid::new_v4();
        let token = sign_test_token(&state.config, id, "creator@example.com", None);

        let mut parts = parts_with_header("authorization", &format!("Bearer {token}"));
        let user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.id, id);
        assert!(!user.is_admin);

        let mut conn = pool.acquire().await.unwrap();
        let profile = Profiles::new(&mut conn).get_by_id(id).await.unwrap().unwrap();
        assert_eq!(profile.email, "creator@example.com");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cookie_token_authenticates(pool: PgPool) {
        let state = create_test_state(pool);
        let id = Uuid::new_v4();
        let token = sign_test_token(&state.config, id, "buyer@example.com", None);
        let cookie = format!("theme=dark; {}={token}", state.config.auth.cookie_name);

        let mut parts = parts_with_header("cookie", &cookie);
        let user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.id, id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_and_invalid_credentials_rejected(pool: PgPool) {
        let state = create_test_state(pool);

        let mut parts = parts_with_header("x-other", "1");
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));

        let mut parts = parts_with_header("authorization", "Bearer garbage");
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_admin_role_marks_admin() {
        let config = create_test_config();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: Some("ops@example.com".to_string()),
            role: Some(config.auth.admin_role.clone()),
            exp: 0,
            user_metadata: Default::default(),
        };
        assert!(current_user_from_claims(claims, &config).is_admin);
    }
}
