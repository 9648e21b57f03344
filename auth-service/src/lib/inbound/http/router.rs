use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::cookies::RefreshCookie;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::logout_all::logout_all;
use super::handlers::me::me;
use super::handlers::refresh::refresh;
use super::middleware::authenticate as auth_middleware;
use super::middleware::rate_limit_login;
use super::middleware::rate_limit_refresh;
use crate::domain::gateway::service::AuthGateway;
use crate::domain::rate_limit::models::RateLimitPolicy;
use crate::domain::rate_limit::models::RouteClass;
use crate::domain::rate_limit::service::RateLimiter;
use crate::domain::session::service::TokenRotationService;
use crate::domain::user::ports::UserDirectory;

/// Thresholds per rate-limited route class.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub login: RateLimitPolicy,
    pub refresh: RateLimitPolicy,
}

impl RateLimits {
    pub fn for_class(&self, class: RouteClass) -> RateLimitPolicy {
        match class {
            RouteClass::Login => self.login,
            RouteClass::Refresh => self.refresh,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub authenticator: Arc<Authenticator>,
    pub sessions: Arc<TokenRotationService>,
    pub gateway: Arc<AuthGateway>,
    pub rate_limiter: Arc<RateLimiter>,
    pub rate_limits: RateLimits,
    /// Proxies whose `X-Forwarded-For` names the client
    pub trusted_proxies: Arc<[IpAddr]>,
    pub cookie: RefreshCookie,
}

pub fn create_router(state: AppState) -> Router {
    let login_routes = Router::new()
        .route("/api/auth/login", post(login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_login,
        ));

    let refresh_routes = Router::new()
        .route("/api/auth/refresh", post(refresh))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_refresh,
        ));

    let public_routes = Router::new().route("/api/auth/logout", post(logout));

    let protected_routes = Router::new()
        .route("/api/auth/logout-all", post(logout_all))
        .route("/api/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(login_routes)
        .merge(refresh_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(trace_layer)
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
