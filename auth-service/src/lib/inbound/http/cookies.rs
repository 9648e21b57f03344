use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::SameSite;
use axum_extra::extract::CookieJar;
use chrono::DateTime;
use chrono::Utc;

/// Attributes of the refresh token cookie.
#[derive(Debug, Clone)]
pub struct RefreshCookie {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
}

impl RefreshCookie {
    /// Presented refresh credential, if any.
    pub fn read(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Store `value` until `expires_at`.
    pub fn set(&self, jar: CookieJar, value: String, expires_at: DateTime<Utc>) -> CookieJar {
        let max_age = (expires_at - Utc::now()).num_seconds().max(0);

        let cookie = Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(cookie::time::Duration::seconds(max_age));

        jar.add(cookie)
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build((self.name.clone(), "")).path(self.path.clone()))
    }
}
