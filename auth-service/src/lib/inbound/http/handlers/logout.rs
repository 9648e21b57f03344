use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;

use super::ApiError;
use crate::domain::gateway::service::AuthGateway;
use crate::inbound::http::router::AppState;

/// End the current session.
///
/// Blacklists a still-valid bearer token and revokes the refresh cookie's
/// record when its validator matches. Absent, invalid or already revoked
/// credentials are not an error.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(AuthGateway::parse_bearer);

    if let Some(token) = bearer {
        match state.gateway.decode(token) {
            Ok(identity) => {
                state.gateway.revoke(&identity).await?;
                tracing::info!(user_id = %identity.user_id, token_id = %identity.token_id, "Access token revoked on logout");
            }
            Err(_) => tracing::debug!("Logout with unusable bearer token"),
        }
    }

    if let Some(presented) = state.cookie.read(&jar) {
        state.sessions.revoke_credential(&presented).await?;
    }

    Ok((state.cookie.clear(jar), StatusCode::NO_CONTENT))
}
