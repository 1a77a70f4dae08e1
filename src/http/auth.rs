use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::TokenService;
use crate::error::Error;
use crate::AppState;

/// The authenticated viewer. Every core operation takes this id as given;
/// the extractor is the only place tokens are inspected.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::unauthorized("invalid Authorization header"))?;

        let service = TokenService::new(state.token_key, state.access_ttl_minutes);
        let user_id = service
            .verify(token)
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to verify access token");
                Error::unauthorized("invalid token")
            })?
            .ok_or_else(|| Error::unauthorized("invalid token"))?;

        Ok(AuthUser { user_id })
    }
}
