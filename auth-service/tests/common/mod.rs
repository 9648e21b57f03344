use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::Argon2Hasher;
use auth::Authenticator;
use auth_service::domain::cache::KeyValueCache;
use auth_service::domain::errors::StoreError;
use auth_service::domain::gateway::service::AuthGateway;
use auth_service::domain::rate_limit::models::RateLimitPolicy;
use auth_service::domain::rate_limit::service::RateLimiter;
use auth_service::domain::revocation::service::RevocationRegistry;
use auth_service::domain::session::models::SessionPolicy;
use auth_service::domain::session::service::TokenRotationService;
use auth_service::domain::user::models::User;
use auth_service::domain::user::models::UserId;
use auth_service::domain::user::models::UserRole;
use auth_service::domain::user::models::Username;
use auth_service::inbound::http::cookies::RefreshCookie;
use auth_service::inbound::http::router::create_router;
use auth_service::inbound::http::router::AppState;
use auth_service::inbound::http::router::RateLimits;
use auth_service::outbound::memory::InMemoryCache;
use auth_service::outbound::memory::InMemoryRefreshTokenRepository;
use auth_service::outbound::memory::InMemoryUserDirectory;
use axum_extra::extract::cookie::SameSite;
use chrono::Utc;
use serde_json::json;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";
pub const COOKIE_NAME: &str = "refresh_token";
pub const PASSWORD: &str = "pass_word!";

/// Cache tier that is always down.
pub struct UnavailableCache;

#[async_trait]
impl KeyValueCache for UnavailableCache {
    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn exists(&self, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn increment_with_ttl(&self, _: &str, _: Duration) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn increment_many_with_ttl(
        &self,
        _: &[(String, Duration)],
    ) -> Result<Vec<i64>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Knobs for a spawned test application.
pub struct TestOptions {
    pub cache: Arc<dyn KeyValueCache>,
    pub fail_open: bool,
    pub max_sessions_per_user: usize,
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            cache: Arc::new(InMemoryCache::new()),
            fail_open: false,
            max_sessions_per_user: 10,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Test application that spawns a real server over in-memory stores
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub refresh_tokens: InMemoryRefreshTokenRepository,
    pub user_id: UserId,
}

/// Tokens handed out by a successful login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub refresh_cookie: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    /// Spawn the application in a background task and return TestApp
    pub async fn spawn_with(options: TestOptions) -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let users = InMemoryUserDirectory::new();
        let user_id = UserId::new();
        users
            .insert(User {
                id: user_id,
                username: Username::new("student1".to_string()).unwrap(),
                role: UserRole::Student,
                password_hash: Argon2Hasher::new().hash_password(PASSWORD).unwrap(),
                created_at: Utc::now(),
            })
            .await;

        let refresh_tokens = InMemoryRefreshTokenRepository::new();
        let authenticator =
            Arc::new(Authenticator::new(JWT_SECRET, chrono::Duration::minutes(15)).unwrap());
        let registry = Arc::new(RevocationRegistry::new(Arc::clone(&options.cache)));

        let sessions = Arc::new(TokenRotationService::new(
            Arc::new(refresh_tokens.clone()),
            Arc::clone(&registry),
            Arc::clone(&authenticator),
            SessionPolicy {
                max_sessions_per_user: options.max_sessions_per_user,
                refresh_token_ttl: chrono::Duration::days(30),
                user_marker_ttl: chrono::Duration::minutes(16),
            },
        ));

        let state = AppState {
            users: Arc::new(users),
            authenticator: Arc::clone(&authenticator),
            sessions,
            gateway: Arc::new(AuthGateway::new(authenticator, registry)),
            rate_limiter: Arc::new(RateLimiter::new(options.cache, options.fail_open, false)),
            rate_limits: RateLimits {
                login: RateLimitPolicy {
                    per_minute: 5,
                    per_hour: 20,
                },
                refresh: RateLimitPolicy {
                    per_minute: 10,
                    per_hour: 100,
                },
            },
            trusted_proxies: options.trusted_proxies.into(),
            cookie: RefreshCookie {
                name: COOKIE_NAME.to_string(),
                path: "/api/auth".to_string(),
                // Plain http in tests
                secure: false,
                same_site: SameSite::Strict,
            },
        };

        let router = create_router(state);

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            address,
            api_client: reqwest::Client::builder()
                .build()
                .expect("Failed to create reqwest client"),
            refresh_tokens,
            user_id,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(&format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(&format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make POST request with Bearer token
    pub fn post_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(token)
    }

    pub async fn login_request(&self, username: &str, password: &str) -> reqwest::Response {
        self.post("/api/auth/login")
            .json(&json!({
                "username": username,
                "password": password
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Log the seeded user in and return its session.
    pub async fn login(&self) -> Session {
        let response = self.login_request("student1", PASSWORD).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        session_from(response).await
    }

    pub async fn refresh_request(&self, refresh_cookie: &str) -> reqwest::Response {
        self.post("/api/auth/refresh")
            .header(
                reqwest::header::COOKIE,
                format!("{}={}", COOKIE_NAME, refresh_cookie),
            )
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn active_sessions(&self) -> usize {
        use auth_service::domain::session::ports::RefreshTokenRepository;

        self.refresh_tokens
            .find_active_by_user(&self.user_id, Utc::now())
            .await
            .unwrap()
            .len()
    }
}

/// Read the access token and refresh cookie out of a login or refresh response.
pub async fn session_from(response: reqwest::Response) -> Session {
    let refresh_cookie = response
        .cookies()
        .find(|cookie| cookie.name() == COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .expect("refresh cookie set");

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    let token = body["data"]["token"]
        .as_str()
        .expect("token in body")
        .to_string();

    Session {
        token,
        refresh_cookie,
    }
}
