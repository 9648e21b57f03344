use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use auth_service::config::Config;
use auth_service::domain::gateway::service::AuthGateway;
use auth_service::domain::rate_limit::service::RateLimiter;
use auth_service::domain::revocation::service::RevocationRegistry;
use auth_service::domain::session::service::TokenRotationService;
use auth_service::domain::session::sweeper::RetentionSweeper;
use auth_service::inbound::http::router::create_router;
use auth_service::inbound::http::router::AppState;
use auth_service::outbound::cache::RedisCache;
use auth_service::outbound::repositories::PostgresRefreshTokenRepository;
use auth_service::outbound::repositories::PostgresUserDirectory;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "auth-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        store_timeout_ms = config.stores.timeout_ms,
        access_token_ttl_minutes = config.jwt.access_token_ttl_minutes,
        max_sessions_per_user = config.sessions.max_per_user,
        rate_limit_fail_open = config.rate_limit.fail_open,
        rate_limit_shared_counters = config.rate_limit.shared_counters,
        trusted_proxies = config.rate_limit.trusted_proxies.len(),
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.store_timeout())
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let cache = Arc::new(RedisCache::connect(&config.redis.url, config.store_timeout()).await?);
    tracing::info!(cache = "redis", "Cache connection established");

    let authenticator = Arc::new(Authenticator::new(
        config.jwt.secret.as_bytes(),
        config.access_token_ttl(),
    )?);
    let refresh_tokens = Arc::new(PostgresRefreshTokenRepository::new(
        pg_pool.clone(),
        config.store_timeout(),
    ));
    let users = Arc::new(PostgresUserDirectory::new(
        pg_pool.clone(),
        config.store_timeout(),
    ));

    let registry = Arc::new(RevocationRegistry::new(cache.clone()));
    let sessions = Arc::new(TokenRotationService::new(
        refresh_tokens.clone(),
        Arc::clone(&registry),
        Arc::clone(&authenticator),
        config.session_policy(),
    ));
    let gateway = Arc::new(AuthGateway::new(
        Arc::clone(&authenticator),
        Arc::clone(&registry),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(
        cache,
        config.rate_limit.fail_open,
        config.rate_limit.shared_counters,
    ));

    let shutdown = CancellationToken::new();

    let sweeper = RetentionSweeper::new(
        refresh_tokens,
        chrono::Duration::days(config.sessions.retention_days),
        Duration::from_secs(config.sessions.cleanup_interval_secs),
    );
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    let state = AppState {
        users,
        authenticator,
        sessions,
        gateway,
        rate_limiter,
        rate_limits: config.rate_limits(),
        trusted_proxies: config.rate_limit.trusted_proxies.clone().into(),
        cookie: config.refresh_cookie()?,
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(state);
    let server_shutdown = shutdown.clone();
    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        server_shutdown.cancel();
    })
    .await?;

    shutdown.cancel();
    if let Err(e) = sweeper_task.await {
        tracing::error!(error = %e, "Sweeper task failed");
    }

    tracing::info!("Server exited successfully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
