#![allow(dead_code)]

// Shared helpers for integration tests.
//
// These helpers use `tower_cookies::Cookie` parsing/encoding to match what the middleware emits
// in `Set-Cookie` and what browsers send back in `Cookie`.
use std::convert::Infallible;

use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use tower_cookies::Cookie;
use tower_sessions_encrypted_cookie_store::{
    Codec, CookieSessionConfig, Decoded, EncryptedCookieSessionLayer, SecretKey, Session,
    SessionValue,
};

pub const SECRET: &str = "b6a30e998806a238c4bad45cc720ed55e56e50d9f00fff58552e78a20fe8262df6142fcfdb0676018bb9767ed560d4a624fb7f3603b4e53c77ec189ae3853bd1";
pub const ANOTHER_SECRET: &str = "dd458e790c3b995e3606384c58efc53da431db892f585aa3ca2a17eabe6df75bce6a45c34607d2048d735b0a31a769de4e1512eb83c7012059a66937158a8975";

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Basic handler used by many tests: write a single key into the session.
    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .expect("request includes Session extension");

    session
        .insert("foo", 42)
        .await
        .expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Handler that does not access the session at all.
    Ok(Response::new(Body::empty()))
}

pub fn key() -> SecretKey {
    SecretKey::from_hex(SECRET).expect("test secret is valid")
}

pub fn codec() -> Codec {
    Codec::new(key())
}

pub fn make_layer(config: CookieSessionConfig) -> EncryptedCookieSessionLayer {
    // Layer keyed by the fixed test secret so tests can mint and inspect tokens with `codec()`.
    EncryptedCookieSessionLayer::new(key()).with_config(config)
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    // Convenience: parse the session cookie from a response.
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    // Parse the `Set-Cookie` header into a `Cookie` structure.
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    cookie.encoded().to_string()
}

pub fn decode_value(
    codec: &Codec,
    token: &str,
    expire_after: Option<time::Duration>,
) -> SessionValue {
    // Decode a token that the test expects to be valid.
    match codec.decode(token, expire_after) {
        Decoded::Valid(decoded) => decoded.value,
        other => panic!("expected a valid token, got {other:?}"),
    }
}

pub fn value(pairs: &[(&str, serde_json::Value)]) -> SessionValue {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
