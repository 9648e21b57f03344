use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum_extra::extract::CookieJar;

use super::ApiError;
use crate::domain::gateway::models::Identity;
use crate::inbound::http::router::AppState;

/// Revoke every session of the caller, on every device.
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let revoked = state.sessions.revoke_all_for_user(&identity.user_id).await?;

    tracing::info!(user_id = %identity.user_id, revoked = revoked, "Logged out everywhere");

    Ok((state.cookie.clear(jar), StatusCode::NO_CONTENT))
}
