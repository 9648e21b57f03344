use std::fmt;
use std::time::Duration;

/// Endpoint family sharing one pair of thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Login,
    Refresh,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Login => "login",
            RouteClass::Refresh => "refresh",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-client request thresholds for one route class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub per_minute: u32,
    pub per_hour: u32,
}

/// Fixed counting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Minute,
    Hour,
}

impl RateWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateWindow::Minute => "minute",
            RateWindow::Hour => "hour",
        }
    }

    pub fn length_secs(&self) -> i64 {
        match self {
            RateWindow::Minute => 60,
            RateWindow::Hour => 3600,
        }
    }

    /// Index of the window containing `unix_secs`.
    pub fn bucket(&self, unix_secs: i64) -> i64 {
        unix_secs.div_euclid(self.length_secs())
    }

    /// Counter lifetime: twice the window, so a bucket outlives its own window.
    pub fn counter_ttl(&self) -> Duration {
        Duration::from_secs(2 * self.length_secs().unsigned_abs())
    }

    pub fn rejection_message(&self) -> &'static str {
        match self {
            RateWindow::Minute => "Too many requests. Please try again in a minute.",
            RateWindow::Hour => "Too many requests. Hourly limit reached, please try again later.",
        }
    }
}

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited {
        window: RateWindow,
        message: &'static str,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// Cache key of one counter.
pub fn counter_key(scope: &str, client: &str, window: RateWindow, bucket: i64) -> String {
    format!("ratelimit:{}:{}:{}:{}", scope, client, window.as_str(), bucket)
}
