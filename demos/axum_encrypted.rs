use std::net::SocketAddr;

use axum::{Router, routing::get};
use time::Duration;
use tower_sessions_encrypted_cookie_store::{
    CookieSessionConfig, DigestAlgorithm, EncryptedCookieSessionLayer, SameSite, SecretKey,
    Session,
};

async fn index(session: Session) -> String {
    let n: usize = session
        .get("n")
        .await
        .expect("session get succeeds")
        .unwrap_or(0);
    session
        .insert("n", n + 1)
        .await
        .expect("session insert succeeds");
    format!("n={n}")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tower_sessions_encrypted_cookie_store=debug".into()),
        )
        .init();

    // Set SESSION_SECRET (hex, at least 32 bytes) to keep sessions valid across restarts.
    let key = match std::env::var("SESSION_SECRET") {
        Ok(secret) => SecretKey::from_hex(&secret).expect("SESSION_SECRET is a valid secret"),
        Err(_) => SecretKey::generate(),
    };

    let session_config = CookieSessionConfig::default()
        // Default: "session"
        .with_name("session")
        // Default: SameSite::Strict
        .with_same_site(SameSite::Lax)
        // Default: no expiry (browser-session cookie, tokens never expire)
        .with_expire_after(Duration::hours(1))
        // Default: 5 minutes
        .with_refresh_interval(Duration::minutes(5))
        // Default: true (set to false for local HTTP development)
        .with_secure(false)
        // Default: DigestAlgorithm::Sha1
        .with_digest(DigestAlgorithm::Sha256)
        // Default: true
        .with_compression(true);
    let session_layer = EncryptedCookieSessionLayer::new(key).with_config(session_config);

    let app = Router::new().route("/", get(index)).layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
