use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use crate::domain::cache::KeyValueCache;
use crate::domain::errors::AuthError;
use crate::domain::rate_limit::models::counter_key;
use crate::domain::rate_limit::models::RateDecision;
use crate::domain::rate_limit::models::RateLimitPolicy;
use crate::domain::rate_limit::models::RateWindow;
use crate::domain::rate_limit::models::RouteClass;

const SHARED_SCOPE: &str = "auth";

/// Fixed-window request counter per client, backed by the TTL cache.
///
/// Both windows are incremented in one batched round trip. Behaviour on a
/// cache failure is decided once, at construction, by `fail_open`.
pub struct RateLimiter {
    cache: Arc<dyn KeyValueCache>,
    fail_open: bool,
    shared_counters: bool,
}

impl RateLimiter {
    /// # Arguments
    /// * `cache` - Counter storage
    /// * `fail_open` - Allow requests when the cache fails instead of rejecting them
    /// * `shared_counters` - Count every route class in one namespace
    pub fn new(cache: Arc<dyn KeyValueCache>, fail_open: bool, shared_counters: bool) -> Self {
        Self {
            cache,
            fail_open,
            shared_counters,
        }
    }

    /// Count one request from `client` against `policy`.
    ///
    /// # Errors
    /// * `ServiceUnavailable` - Cache failed and the limiter is fail-closed
    pub async fn allow(
        &self,
        client: &str,
        class: RouteClass,
        policy: &RateLimitPolicy,
    ) -> Result<RateDecision, AuthError> {
        self.allow_at(client, class, policy, Utc::now()).await
    }

    /// Same as [`allow`](Self::allow) at an explicit instant.
    pub async fn allow_at(
        &self,
        client: &str,
        class: RouteClass,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, AuthError> {
        let scope = if self.shared_counters {
            SHARED_SCOPE
        } else {
            class.as_str()
        };
        let unix = now.timestamp();

        // Narrowest window first: its message wins when both are exceeded.
        let checks = [
            (RateWindow::Minute, policy.per_minute),
            (RateWindow::Hour, policy.per_hour),
        ];
        let keys: Vec<_> = checks
            .iter()
            .map(|(window, _)| {
                (
                    counter_key(scope, client, *window, window.bucket(unix)),
                    window.counter_ttl(),
                )
            })
            .collect();

        let counts = match self.cache.increment_many_with_ttl(&keys).await {
            Ok(counts) if counts.len() == checks.len() => counts,
            Ok(counts) => {
                return self.on_cache_failure(
                    client,
                    class,
                    format!("expected {} counters, got {}", checks.len(), counts.len()),
                )
            }
            Err(e) => return self.on_cache_failure(client, class, e.to_string()),
        };

        for ((window, limit), count) in checks.iter().zip(counts) {
            if count > i64::from(*limit) {
                tracing::warn!(
                    client = %client,
                    class = %class,
                    window = window.as_str(),
                    count = count,
                    limit = limit,
                    "Rate limit exceeded"
                );
                return Ok(RateDecision::Limited {
                    window: *window,
                    message: window.rejection_message(),
                });
            }
        }

        Ok(RateDecision::Allowed)
    }

    fn on_cache_failure(
        &self,
        client: &str,
        class: RouteClass,
        error: String,
    ) -> Result<RateDecision, AuthError> {
        if self.fail_open {
            tracing::warn!(client = %client, class = %class, error = %error, "Rate limiter cache failed, allowing request");
            Ok(RateDecision::Allowed)
        } else {
            tracing::error!(client = %client, class = %class, error = %error, "Rate limiter cache failed, rejecting request");
            Err(AuthError::ServiceUnavailable(error))
        }
    }
}
