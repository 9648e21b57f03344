use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;

use super::ApiError;
use super::ApiSuccess;
use super::SessionResponseData;
use crate::domain::errors::AuthError;
use crate::inbound::http::router::AppState;

/// Exchange the refresh cookie for a new access token and refresh cookie.
///
/// The old credential is consumed before the owner is looked up, so the new
/// cookie is set even when the lookup fails.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiSuccess<SessionResponseData>), (CookieJar, ApiError)> {
    let Some(presented) = state.cookie.read(&jar) else {
        tracing::debug!("Refresh without cookie");
        return Err((jar, ApiError::invalid_credentials()));
    };

    let pair = match state.sessions.rotate(&presented).await {
        Ok(pair) => pair,
        Err(e) => {
            let jar = match e {
                AuthError::AuthenticationFailed => state.cookie.clear(jar),
                _ => jar,
            };
            return Err((jar, e.into()));
        }
    };

    let jar = state.cookie.set(
        jar,
        pair.refresh_token.expose(),
        pair.refresh_expires_at,
    );

    let user = match state.users.find_by_id(&pair.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(user_id = %pair.user_id, "Session owner no longer exists");
            if let Err(e) = state.sessions.revoke_all_for_user(&pair.user_id).await {
                tracing::error!(user_id = %pair.user_id, error = %e, "Failed to revoke orphaned sessions");
            }
            return Err((state.cookie.clear(jar), ApiError::invalid_credentials()));
        }
        Err(e) => {
            return Err((jar, AuthError::unavailable(e).into()));
        }
    };

    tracing::debug!(user_id = %user.id, "Session refreshed");

    Ok((
        jar,
        ApiSuccess::new(
            StatusCode::OK,
            SessionResponseData {
                token: pair.access_token.token,
                username: user.username.as_str().to_string(),
                role: user.role.to_string(),
                user_id: user.id.to_string(),
            },
        ),
    ))
}
