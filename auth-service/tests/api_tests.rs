mod common;

use std::net::IpAddr;
use std::sync::Arc;

use common::session_from;
use common::TestApp;
use common::TestOptions;
use common::UnavailableCache;
use common::COOKIE_NAME;
use reqwest::StatusCode;

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::spawn().await;

    let response = app.login_request("student1", "pass_word!").await;

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("Set-Cookie header")
        .to_string();
    assert!(set_cookie.starts_with(&format!("{}=", COOKIE_NAME)));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/api/auth"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status_code"], 200);
    assert_eq!(body["data"]["username"], "student1");
    assert_eq!(body["data"]["role"], "student");
    assert_eq!(body["data"]["userId"], app.user_id.to_string());
    assert!(body["data"]["token"].is_string());
    assert_eq!(app.active_sessions().await, 1);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::spawn().await;

    let wrong_password = app.login_request("student1", "wrong").await;
    let unknown_user = app.login_request("nobody", "pass_word!").await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    let a: serde_json::Value = wrong_password.json().await.unwrap();
    let b: serde_json::Value = unknown_user.json().await.unwrap();
    assert_eq!(a["data"]["message"], "Invalid credentials");
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_login_rate_limited_on_sixth_attempt() {
    let app = TestApp::spawn().await;

    for _ in 0..5 {
        let response = app.login_request("student1", "wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.login_request("student1", "pass_word!").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("in a minute"));
}

#[tokio::test]
async fn test_forwarded_for_from_untrusted_peer_is_ignored() {
    let app = TestApp::spawn().await;

    for i in 0..5 {
        let response = app
            .post("/api/auth/login")
            .header("X-Forwarded-For", format!("10.0.0.{}", i))
            .json(&serde_json::json!({
                "username": "student1",
                "password": "wrong"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .post("/api/auth/login")
        .header("X-Forwarded-For", "10.0.0.99")
        .json(&serde_json::json!({
            "username": "student1",
            "password": "pass_word!"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_is_per_client_behind_trusted_proxy() {
    let app = TestApp::spawn_with(TestOptions {
        trusted_proxies: vec![IpAddr::from([127, 0, 0, 1])],
        ..TestOptions::default()
    })
    .await;

    for _ in 0..5 {
        let response = app
            .post("/api/auth/login")
            .header("X-Forwarded-For", "198.51.100.10")
            .json(&serde_json::json!({
                "username": "student1",
                "password": "wrong"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .post("/api/auth/login")
        .header("X-Forwarded-For", "198.51.100.20")
        .json(&serde_json::json!({
            "username": "student1",
            "password": "pass_word!"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rotates_credentials() {
    let app = TestApp::spawn().await;
    let first = app.login().await;

    let response = app.refresh_request(&first.refresh_cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = session_from(response).await;

    assert_ne!(second.token, first.token);
    assert_ne!(second.refresh_cookie, first.refresh_cookie);
    assert_eq!(app.active_sessions().await, 1);

    let me = app
        .get_authenticated("/api/auth/me", &second.token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_reuse_revokes_every_session() {
    let app = TestApp::spawn().await;
    let original = app.login().await;
    app.login().await;

    let rotated = session_from(app.refresh_request(&original.refresh_cookie).await).await;
    assert_eq!(app.active_sessions().await, 2);

    let replay = app.refresh_request(&original.refresh_cookie).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.active_sessions().await, 0);

    // The legitimate successor is gone too
    let successor = app.refresh_request(&rotated.refresh_cookie).await;
    assert_eq!(successor.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_concurrent_refresh_succeeds_once() {
    let app = TestApp::spawn().await;
    let session = app.login().await;

    let (a, b) = futures::join!(
        app.refresh_request(&session.refresh_cookie),
        app.refresh_request(&session.refresh_cookie)
    );

    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::UNAUTHORIZED]);
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let app = TestApp::spawn().await;

    let response = app.post("/api/auth/refresh").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.refresh_request("forged:credential").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_requires_valid_token() {
    let app = TestApp::spawn().await;
    let session = app.login().await;

    let response = app
        .get_authenticated("/api/auth/me", &session.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["userId"], app.user_id.to_string());
    assert!(body["data"]["tokenId"].is_string());
    assert!(body["data"]["expiresAt"].is_string());

    let response = app.get("/api/auth/me").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .get_authenticated("/api/auth/me", "not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_access_token() {
    let app = TestApp::spawn().await;
    let session = app.login().await;

    let response = app
        .post_authenticated("/api/auth/logout", &session.token)
        .header(
            reqwest::header::COOKIE,
            format!("{}={}", COOKIE_NAME, session.refresh_cookie),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let me = app
        .get_authenticated("/api/auth/me", &session.token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.active_sessions().await, 0);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = TestApp::spawn().await;
    let session = app.login().await;

    for _ in 0..2 {
        let response = app
            .post_authenticated("/api/auth/logout", &session.token)
            .header(
                reqwest::header::COOKIE,
                format!("{}={}", COOKIE_NAME, session.refresh_cookie),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let anonymous = app.post("/api/auth/logout").send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_logout_with_forged_validator_keeps_sessions() {
    let app = TestApp::spawn().await;
    let victim = app.login().await;
    let other_device = app.login().await;

    let selector = victim
        .refresh_cookie
        .split(':')
        .next()
        .expect("selector part")
        .to_string();

    let response = app
        .post("/api/auth/logout")
        .header(
            reqwest::header::COOKIE,
            format!("{}={}:forged", COOKIE_NAME, selector),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.active_sessions().await, 2);

    let refresh = app.refresh_request(&victim.refresh_cookie).await;
    assert_eq!(refresh.status(), StatusCode::OK);

    let refresh = app.refresh_request(&other_device.refresh_cookie).await;
    assert_eq!(refresh.status(), StatusCode::OK);
    assert_eq!(app.active_sessions().await, 2);
}

#[tokio::test]
async fn test_logout_all_ends_every_session() {
    let app = TestApp::spawn().await;
    let laptop = app.login().await;
    let phone = app.login().await;
    assert_eq!(app.active_sessions().await, 2);

    let response = app
        .post_authenticated("/api/auth/logout-all", &laptop.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.active_sessions().await, 0);

    let refresh = app.refresh_request(&phone.refresh_cookie).await;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);

    let me = app
        .get_authenticated("/api/auth/me", &phone.token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_all_requires_authentication() {
    let app = TestApp::spawn().await;

    let response = app.post("/api/auth/logout-all").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cap_evicts_oldest() {
    let app = TestApp::spawn_with(TestOptions {
        max_sessions_per_user: 2,
        ..TestOptions::default()
    })
    .await;

    let oldest = app.login().await;
    app.login().await;
    app.login().await;
    assert_eq!(app.active_sessions().await, 2);

    let evicted = app.refresh_request(&oldest.refresh_cookie).await;
    assert_eq!(evicted.status(), StatusCode::UNAUTHORIZED);
    // Presenting an evicted credential counts as reuse
    assert_eq!(app.active_sessions().await, 0);
}

#[tokio::test]
async fn test_rate_limiter_fails_closed() {
    let app = TestApp::spawn_with(TestOptions {
        cache: Arc::new(UnavailableCache),
        fail_open: false,
        ..TestOptions::default()
    })
    .await;

    let response = app.login_request("student1", "pass_word!").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["message"], "Service temporarily unavailable");
}

#[tokio::test]
async fn test_rate_limiter_fails_open() {
    let app = TestApp::spawn_with(TestOptions {
        cache: Arc::new(UnavailableCache),
        fail_open: true,
        ..TestOptions::default()
    })
    .await;

    let response = app.login_request("student1", "pass_word!").await;
    assert_eq!(response.status(), StatusCode::OK);
}
