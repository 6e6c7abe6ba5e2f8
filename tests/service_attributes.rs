// Tests for how `CookieSessionConfig` maps to emitted cookie attributes and to the layer's
// handling of unreadable or oversized cookies.
mod common;

use axum::body::Body;
use http::{Request, StatusCode, header};
use tower::{ServiceBuilder, ServiceExt as _};
use tower_cookies::Cookie;

use tower_sessions_encrypted_cookie_store::{
    CookieSessionConfig, DEFAULT_COOKIE_NAME, DigestAlgorithm, SameSite,
};

async fn issue_cookie(config: CookieSessionConfig) -> Cookie<'static> {
    // One request against a fresh layer whose handler writes to the session.
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    common::get_session_cookie(&res)
}

#[tokio::test]
async fn basic_service() {
    // Exercise: first request writes to the session (causing a cookie to be set), then the second
    // request sends that cookie back.
    // Expectation: the second request rewrites the same value, which is not a change, so no
    // `Set-Cookie` should be emitted.
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(CookieSessionConfig::default()))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc
        .clone()
        .oneshot(req)
        .await
        .expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    let req = Request::builder()
        .header(header::COOKIE, common::cookie_header_value(&session_cookie))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn bogus_cookie() {
    // Exercise: the client sends the session cookie name with a value that cannot be decoded.
    // Expectation: the layer issues a `Set-Cookie` carrying a freshly encoded session.
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(CookieSessionConfig::default()))
        .service_fn(common::handler);

    let req = Request::builder()
        .header(header::COOKIE, "session=bogus")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let session_cookie = common::get_session_cookie(&res);

    let value = common::decode_value(&common::codec(), session_cookie.value(), None);
    assert_eq!(value, common::value(&[("foo", serde_json::json!(42))]));
}

#[tokio::test]
async fn bogus_cookie_kept_when_clearing_disabled() {
    // Exercise: undecodable cookie with `clear_on_decode_error` turned off and an unused session.
    // Expectation: the layer leaves the client's cookie alone.
    let config = CookieSessionConfig::default().with_clear_on_decode_error(false);
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::noop_handler);

    let req = Request::builder()
        .header(header::COOKIE, "session=bogus")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn no_set_cookie_when_unused() {
    // Exercise: handler does not touch session state at all.
    // Expectation: no `Set-Cookie` should be emitted.
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(CookieSessionConfig::default()))
        .service_fn(common::noop_handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn name() {
    let session_cookie = issue_cookie(CookieSessionConfig::default().with_name("my.sid")).await;
    assert_eq!(session_cookie.name(), "my.sid");

    let session_cookie = issue_cookie(CookieSessionConfig::default()).await;
    assert_eq!(session_cookie.name(), DEFAULT_COOKIE_NAME);
}

#[tokio::test]
async fn http_only() {
    // Exercise: default `HttpOnly=true`, then toggle to `HttpOnly=false`.
    // Expectation: attribute is present by default and absent when disabled.
    let session_cookie = issue_cookie(CookieSessionConfig::default()).await;
    assert_eq!(session_cookie.http_only(), Some(true));

    let session_cookie = issue_cookie(CookieSessionConfig::default().with_http_only(false)).await;
    assert_eq!(session_cookie.http_only(), None);
}

#[tokio::test]
async fn same_site() {
    // Exercise: each `SameSite` setting in turn.
    // Expectation: emitted cookie carries the configured attribute; Strict is the default.
    let session_cookie = issue_cookie(CookieSessionConfig::default()).await;
    assert_eq!(session_cookie.same_site(), Some(SameSite::Strict));

    for same_site in [SameSite::Strict, SameSite::Lax, SameSite::None] {
        let config = CookieSessionConfig::default().with_same_site(same_site);
        let session_cookie = issue_cookie(config).await;
        assert_eq!(session_cookie.same_site(), Some(same_site));
    }
}

#[tokio::test]
async fn secure() {
    // Exercise: default `Secure=true`, then set `Secure=false`.
    // Expectation: attribute is present when enabled and absent when disabled.
    let session_cookie = issue_cookie(CookieSessionConfig::default()).await;
    assert_eq!(session_cookie.secure(), Some(true));

    let session_cookie = issue_cookie(CookieSessionConfig::default().with_secure(false)).await;
    assert_eq!(session_cookie.secure(), None);
}

#[tokio::test]
async fn path_and_domain() {
    let config = CookieSessionConfig::default()
        .with_path("/foo/bar")
        .with_domain("example.com");
    let session_cookie = issue_cookie(config).await;

    assert_eq!(session_cookie.path(), Some("/foo/bar"));
    assert_eq!(session_cookie.domain(), Some("example.com"));
}

#[tokio::test]
async fn no_max_age_without_expiry() {
    // Exercise: no expiry configured.
    // Expectation: browser-session cookie; the token carries no timestamp segment.
    let session_cookie = issue_cookie(CookieSessionConfig::default()).await;

    assert_eq!(session_cookie.max_age(), None);
    assert_eq!(session_cookie.value().matches('.').count(), 2);
}

#[tokio::test]
async fn digest_choice_is_applied() {
    // Exercise: configure SHA-256 for the MAC.
    // Expectation: the layer's tokens do not verify under the default SHA-1 codec but do under a
    // SHA-256 one.
    let config = CookieSessionConfig::default().with_digest(DigestAlgorithm::Sha256);
    let session_cookie = issue_cookie(config).await;

    assert!(!common::codec().decode(session_cookie.value(), None).is_valid());
    let sha256 = common::codec().with_digest(DigestAlgorithm::Sha256);
    assert!(sha256.decode(session_cookie.value(), None).is_valid());
}

#[tokio::test]
async fn oversized_cookie_fails_request() {
    // Exercise: a cookie size limit smaller than any encoded token.
    // Expectation: the save fails and the layer answers 500 without a `Set-Cookie`.
    let config = CookieSessionConfig::default().with_max_cookie_bytes(16);
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn always_save_reissues_unchanged_session() {
    // Exercise: `always_save` with a second request that leaves the session unchanged.
    // Expectation: a new token is issued anyway.
    let config = CookieSessionConfig::default().with_always_save(true);
    let svc = ServiceBuilder::new()
        .layer(common::make_layer(config))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc
        .clone()
        .oneshot(req)
        .await
        .expect("service call succeeds");
    let first = common::get_session_cookie(&res);

    let req = Request::builder()
        .header(header::COOKIE, common::cookie_header_value(&first))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");
    let second = common::get_session_cookie(&res);

    assert_ne!(first.value(), second.value());
}
