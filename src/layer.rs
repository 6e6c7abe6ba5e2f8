use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{Request, Response};
use time::OffsetDateTime;
use tower_cookies::{Cookie, CookieManager};
use tower_layer::Layer;
use tower_service::Service;
use tower_sessions_core::{
    Session,
    session::{Expiry, Id},
};

use crate::{
    codec::{Codec, Decoded},
    config::CookieSessionConfig,
    error::ConfigError,
    key::SecretKey,
    store::{CookieStore, remove_session_cookie},
};

#[derive(Debug, Clone)]
pub struct EncryptedCookieSessionLayer {
    config: CookieSessionConfig,
    codec: Arc<Codec>,
}

impl EncryptedCookieSessionLayer {
    #[must_use]
    pub fn new(key: SecretKey) -> Self {
        let config = CookieSessionConfig::default();
        let codec = Codec::new(key)
            .with_digest(config.digest)
            .with_compression(config.compress);
        Self {
            config,
            codec: Arc::new(codec),
        }
    }

    /// Layer keyed by a hex secret of at least 32 bytes.
    pub fn from_hex(secret_hex: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(SecretKey::from_hex(secret_hex)?))
    }

    #[must_use]
    pub fn with_config(mut self, config: CookieSessionConfig) -> Self {
        let codec = Codec::clone(&self.codec)
            .with_digest(config.digest)
            .with_compression(config.compress);
        self.codec = Arc::new(codec);
        self.config = config;
        self
    }

    /// The codec this layer encodes and decodes tokens with.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }
}

#[derive(Debug, Clone)]
pub struct EncryptedCookieSession<S> {
    inner: S,
    config: CookieSessionConfig,
    codec: Arc<Codec>,
}

impl<S> Layer<S> for EncryptedCookieSessionLayer {
    type Service = CookieManager<EncryptedCookieSession<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(EncryptedCookieSession {
            inner,
            config: self.config.clone(),
            codec: self.codec.clone(),
        })
    }
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for EncryptedCookieSession<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let codec = self.codec.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let cookies = match req.extensions().get::<tower_cookies::Cookies>().cloned() {
                Some(cookies) => cookies,
                None => {
                    let mut res = Response::default();
                    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                    return Ok(res);
                }
            };

            let now = OffsetDateTime::now_utc();
            let session_cookie = cookies.get(&config.name).map(Cookie::into_owned);
            let mut initial_cookie_removed = false;

            let original = match session_cookie.as_ref() {
                Some(cookie) => {
                    match codec.decode_at(cookie.value(), config.policy.expire_after(), now) {
                        Decoded::Valid(decoded) => Some(decoded),
                        Decoded::Expired { issued_at } => {
                            tracing::debug!(%issued_at, "cookie session expired");
                            if config.clear_on_decode_error {
                                remove_session_cookie(&cookies, &config);
                                initial_cookie_removed = true;
                            }
                            None
                        }
                        Decoded::Invalid(reason) => {
                            tracing::warn!(reason = %reason, "cookie session decode failed");
                            if config.clear_on_decode_error {
                                remove_session_cookie(&cookies, &config);
                                initial_cookie_removed = true;
                            }
                            None
                        }
                    }
                }
                None => None,
            };

            let session_id = original.as_ref().map(|_| Id::default());
            let expiry = config.policy.expire_after().map(Expiry::OnInactivity);
            let cookie_store = Arc::new(CookieStore::new(
                cookies,
                codec,
                config.clone(),
                session_id,
                original,
                initial_cookie_removed,
            ));

            let session = Session::new(session_id, cookie_store.clone(), expiry);
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            let modified = session.is_modified();
            let empty = session.is_empty().await;
            let had_cookie = session_cookie.is_some();

            if empty {
                if had_cookie && !cookie_store.did_remove_cookie() {
                    cookie_store.remove_cookie();
                }
                return Ok(res);
            }

            let refresh_due = cookie_store.refresh_due(OffsetDateTime::now_utc());

            if (modified || refresh_due || config.always_save)
                && !res.status().is_server_error()
                && !cookie_store.did_write_cookie()
                && let Err(err) = session.save().await
            {
                tracing::error!(err = %err, "cookie session save failed");
                let mut res = Response::default();
                *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(res);
            }

            Ok(res)
        })
    }
}
