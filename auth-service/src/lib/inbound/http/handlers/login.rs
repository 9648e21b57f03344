use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::SessionResponseData;
use crate::domain::user::models::Username;
use crate::inbound::http::router::AppState;

/// Verify username and password, then open a new session.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequestBody>,
) -> Result<(CookieJar, ApiSuccess<SessionResponseData>), ApiError> {
    let username =
        Username::new(body.username).map_err(|_| ApiError::invalid_credentials())?;

    let user = match state.users.find_by_username(&username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::debug!(username = %username, "Login for unknown username");
            return Err(ApiError::invalid_credentials());
        }
        Err(e) => {
            tracing::error!(username = %username, error = %e, "User lookup failed during login");
            return Err(ApiError::invalid_credentials());
        }
    };

    state
        .authenticator
        .verify_password(&body.password, &user.password_hash)
        .map_err(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "Password verification failed");
            ApiError::invalid_credentials()
        })?;

    let pair = state.sessions.issue(&user.id).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    let jar = state.cookie.set(
        jar,
        pair.refresh_token.expose(),
        pair.refresh_expires_at,
    );

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

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestBody {
    username: String,
    password: String,
}
