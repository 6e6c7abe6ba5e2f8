use std::{borrow::Cow, fmt};

use serde::Deserialize;
use time::Duration;
use tower_cookies::Cookie;

use crate::{
    DigestAlgorithm, LifecyclePolicy, SameSite, SecretKey, error::ConfigError,
    layer::EncryptedCookieSessionLayer, policy::DEFAULT_REFRESH_INTERVAL,
};

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "session";

#[derive(Debug, Clone)]
pub struct CookieSessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) always_save: bool,
    pub(crate) max_cookie_bytes: usize,
    pub(crate) clear_on_decode_error: bool,
    pub(crate) policy: LifecyclePolicy,
    pub(crate) digest: DigestAlgorithm,
    pub(crate) compress: bool,
}

impl Default for CookieSessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            http_only: true,
            same_site: SameSite::Strict,
            secure: true,
            path: "/".into(),
            domain: None,
            always_save: false,
            max_cookie_bytes: 4096,
            clear_on_decode_error: true,
            policy: LifecyclePolicy::default(),
            digest: DigestAlgorithm::default(),
            compress: true,
        }
    }
}

impl CookieSessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    /// Reissue the token on every request that touches a non-empty session.
    #[must_use]
    pub fn with_always_save(mut self, always_save: bool) -> Self {
        self.always_save = always_save;
        self
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    #[must_use]
    pub fn with_clear_on_decode_error(mut self, clear_on_decode_error: bool) -> Self {
        self.clear_on_decode_error = clear_on_decode_error;
        self
    }

    /// Tokens older than `expire_after` are rejected; the cookie gets a matching `Max-Age`.
    #[must_use]
    pub fn with_expire_after(mut self, expire_after: Duration) -> Self {
        self.policy = self.policy.with_expire_after(expire_after);
        self
    }

    #[must_use]
    pub fn without_expiry(mut self) -> Self {
        self.policy = self.policy.without_expiry();
        self
    }

    /// How long an unchanged, expiring session goes before its token is renewed.
    #[must_use]
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.policy = self.policy.with_refresh_interval(refresh_interval);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Session cookie carrying `token`.
    ///
    /// The space marking a compressed token is not a valid cookie octet, so it goes out as `%20`.
    /// Incoming cookies are percent-decoded by `tower-cookies`.
    pub(crate) fn build_cookie(&self, token: String) -> Cookie<'static> {
        let value = token.replace(' ', "%20");
        let mut cookie_builder = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone());

        if let Some(expire_after) = self.policy.expire_after() {
            cookie_builder = cookie_builder.max_age(std::cmp::max(expire_after, Duration::ZERO));
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    pub(crate) fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), "");
        cookie.set_path(self.path.clone());
        if let Some(domain) = self.domain.clone() {
            cookie.set_domain(domain);
        }
        cookie
    }
}

/// `SameSite` attribute as it appears in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSiteSetting {
    #[default]
    Strict,
    Lax,
    None,
}

impl From<SameSiteSetting> for SameSite {
    fn from(setting: SameSiteSetting) -> Self {
        match setting {
            SameSiteSetting::Strict => SameSite::Strict,
            SameSiteSetting::Lax => SameSite::Lax,
            SameSiteSetting::None => SameSite::None,
        }
    }
}

/// Deserializable configuration surface, e.g. a `[session]` table in the host's config file.
///
/// Durations are whole seconds. Only `secret` is required.
#[derive(Clone, Deserialize)]
pub struct SessionSettings {
    /// Hex-encoded secret of at least 32 bytes.
    pub secret: String,

    #[serde(default)]
    pub digest: DigestAlgorithm,

    #[serde(default = "default_true")]
    pub compress: bool,

    #[serde(default)]
    pub expire_after: Option<u32>,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u32,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "default_true")]
    pub secure: bool,

    #[serde(default = "default_true")]
    pub http_only: bool,

    #[serde(default)]
    pub same_site: SameSiteSetting,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default)]
    pub domain: Option<String>,
}

impl SessionSettings {
    /// Validate the secret and build the cookie config it describes.
    pub fn into_parts(self) -> Result<(SecretKey, CookieSessionConfig), ConfigError> {
        let key = SecretKey::from_hex(&self.secret)?;

        let mut config = CookieSessionConfig::default()
            .with_name(self.cookie_name)
            .with_secure(self.secure)
            .with_http_only(self.http_only)
            .with_same_site(self.same_site.into())
            .with_path(self.path)
            .with_digest(self.digest)
            .with_compression(self.compress)
            .with_refresh_interval(Duration::seconds(i64::from(self.refresh_interval)));
        if let Some(expire_after) = self.expire_after {
            config = config.with_expire_after(Duration::seconds(i64::from(expire_after)));
        }
        if let Some(domain) = self.domain {
            config = config.with_domain(domain);
        }

        Ok((key, config))
    }

    /// Validate the secret and build the session layer. Fails on a missing or short secret.
    pub fn into_layer(self) -> Result<EncryptedCookieSessionLayer, ConfigError> {
        let (key, config) = self.into_parts()?;
        Ok(EncryptedCookieSessionLayer::new(key).with_config(config))
    }
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("secret", &"<redacted>")
            .field("digest", &self.digest)
            .field("compress", &self.compress)
            .field("expire_after", &self.expire_after)
            .field("refresh_interval", &self.refresh_interval)
            .field("cookie_name", &self.cookie_name)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("same_site", &self.same_site)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval() -> u32 {
    DEFAULT_REFRESH_INTERVAL.whole_seconds() as u32
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_path() -> String {
    "/".to_string()
}
