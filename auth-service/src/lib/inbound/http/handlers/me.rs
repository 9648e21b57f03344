use axum::http::StatusCode;
use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::gateway::models::Identity;

pub async fn me(
    Extension(identity): Extension<Identity>,
) -> Result<ApiSuccess<MeResponseData>, ApiError> {
    Ok(ApiSuccess::new(StatusCode::OK, (&identity).into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponseData {
    pub user_id: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&Identity> for MeResponseData {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.to_string(),
            token_id: identity.token_id.clone(),
            expires_at: identity.expires_at,
        }
    }
}
