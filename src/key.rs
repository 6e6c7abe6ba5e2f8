//! Secret key material.
//!
//! The secret is configured as a hexadecimal string. The first [`KEY_LEN`] decoded bytes are the
//! AES-256 key; the whole decoded secret keys the MAC. Secrets shorter than [`KEY_LEN`] bytes are
//! rejected, never padded.

use std::fmt;

use rand::{RngCore, rngs::OsRng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;

/// Byte length of an AES-256 key.
pub const KEY_LEN: usize = 32;

/// Length of secrets produced by [`SecretKey::generate`].
const GENERATED_SECRET_LEN: usize = 64;

/// Validated symmetric secret shared by every encode and decode call.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    encryption: [u8; KEY_LEN],
    signing: Vec<u8>,
}

impl SecretKey {
    /// Build a key from a hex secret of at least [`KEY_LEN`] bytes.
    pub fn from_hex(secret_hex: &str) -> Result<Self, ConfigError> {
        Self::validate(secret_hex, KEY_LEN)
    }

    /// Validate `secret_hex` against the key length the cipher requires.
    ///
    /// Longer secrets are truncated to `required_key_bytes` for the cipher key.
    /// `required_key_bytes` larger than [`KEY_LEN`] only raises the minimum.
    pub fn validate(secret_hex: &str, required_key_bytes: usize) -> Result<Self, ConfigError> {
        let secret_hex = secret_hex.trim();
        if secret_hex.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        let decoded = hex::decode(secret_hex).map_err(ConfigError::InvalidHex)?;
        let required = required_key_bytes.max(KEY_LEN);
        if decoded.len() < required {
            return Err(ConfigError::SecretTooShort {
                required,
                actual: decoded.len(),
            });
        }

        Ok(Self::from_bytes(decoded))
    }

    /// Generate a random secret. Sessions issued under it do not survive a restart.
    pub fn generate() -> Self {
        let mut secret = vec![0u8; GENERATED_SECRET_LEN];
        OsRng.fill_bytes(&mut secret);
        Self::from_bytes(secret)
    }

    // Callers guarantee `secret.len() >= KEY_LEN`.
    fn from_bytes(secret: Vec<u8>) -> Self {
        let mut encryption = [0u8; KEY_LEN];
        encryption.copy_from_slice(&secret[..KEY_LEN]);
        Self {
            encryption,
            signing: secret,
        }
    }

    pub(crate) fn encryption_key(&self) -> &[u8; KEY_LEN] {
        &self.encryption
    }

    pub(crate) fn signing_key(&self) -> &[u8] {
        &self.signing
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}
