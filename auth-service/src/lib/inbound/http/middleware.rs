use std::net::IpAddr;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use super::handlers::ApiError;
use crate::domain::errors::AuthError;
use crate::domain::rate_limit::models::RateDecision;
use crate::domain::rate_limit::models::RouteClass;
use crate::inbound::http::router::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// Middleware that verifies the bearer token and binds the caller's
/// [`Identity`](crate::domain::gateway::models::Identity) into request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let identity = state
        .gateway
        .verify(header)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, RouteClass::Login, req, next).await
}

pub async fn rate_limit_refresh(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, RouteClass::Refresh, req, next).await
}

async fn enforce(
    state: &AppState,
    class: RouteClass,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let client = client_identity(
        req.headers(),
        req.extensions().get::<ConnectInfo<SocketAddr>>(),
        &state.trusted_proxies,
    );
    let policy = state.rate_limits.for_class(class);

    let decision = state
        .rate_limiter
        .allow(&client, class, &policy)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;

    match decision {
        RateDecision::Allowed => Ok(next.run(req).await),
        RateDecision::Limited { message, .. } => {
            Err(ApiError::from(AuthError::RateLimited(message.to_string())).into_response())
        }
    }
}

/// Address the rate limiter keys a request on.
///
/// The peer socket address, unless the peer is one of `trusted_proxies`. Then
/// `X-Forwarded-For` is walked from the right and the first hop that is not a
/// trusted proxy wins, so hops a client prepends itself are never used.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    trusted_proxies: &[IpAddr],
) -> String {
    let Some(ConnectInfo(addr)) = peer else {
        return UNKNOWN_CLIENT.to_string();
    };
    let peer_ip = addr.ip();

    if !trusted_proxies.contains(&peer_ip) {
        return peer_ip.to_string();
    }

    let forwarded = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect::<Vec<_>>();

    forwarded
        .into_iter()
        .rev()
        .find(|hop| {
            hop.parse::<IpAddr>()
                .map(|ip| !trusted_proxies.contains(&ip))
                .unwrap_or(true)
        })
        .map(str::to_string)
        .unwrap_or_else(|| peer_ip.to_string())
}
