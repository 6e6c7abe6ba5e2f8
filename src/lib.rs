//! Encrypted cookie-backed session persistence for `tower-sessions`.
//!
//! The whole session lives in the cookie as an encrypted, authenticated token. This crate provides
//! a layer that decodes the token into a `tower_sessions_core::Session` in request extensions and,
//! after the handler runs, writes a new token only when the session changed or an expiring
//! session is due for renewal.
//!
//! The core is usable on its own: [`Codec`] turns a [`SessionValue`] into a token and back, and
//! [`LifecyclePolicy`] decides when a token has to be reissued.
//!
//! # Security
//! Tokens are encrypted with AES-256-CBC under a fresh random IV and authenticated with an HMAC
//! (SHA-1 by default) over the IV, the uncompressed plaintext and the issue timestamp. Tags are
//! compared in constant time. A token from a different key, a tampered token and an expired token
//! all decode to "no session".
//!
//! Tokens are not bound to anything but the key: a stolen cookie is a valid session until it
//! expires. Configure an expiry and send cookies over TLS only.

mod codec;
mod config;
mod digest;
mod error;
pub mod format;
mod key;
pub mod layer;
mod policy;
mod store;

pub use tower_cookies::cookie::SameSite;
pub use tower_sessions_core::{Session, session_store};

pub use crate::codec::{Codec, Decoded, DecodedSession, MAX_PLAINTEXT_BYTES, SessionValue};
pub use crate::config::{
    CookieSessionConfig, DEFAULT_COOKIE_NAME, SameSiteSetting, SessionSettings,
};
pub use crate::digest::DigestAlgorithm;
pub use crate::error::{ConfigError, EncodeError, InvalidToken};
pub use crate::key::{KEY_LEN, SecretKey};
pub use crate::layer::EncryptedCookieSessionLayer;
pub use crate::policy::{DEFAULT_REFRESH_INTERVAL, LifecyclePolicy};
