//! Error types.
//!
//! Only [`ConfigError`] is fatal. Token rejections are values ([`InvalidToken`] inside
//! [`crate::Decoded`]) so a forged or stale cookie never aborts request handling.

use thiserror::Error;

/// Invalid configuration, reported once at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No secret was configured.
    #[error("an encryption secret is required; generate one with 64 random bytes encoded as hex")]
    MissingSecret,

    /// The secret is not a hexadecimal string.
    #[error("the encryption secret must be hex encoded: {0}")]
    InvalidHex(#[source] hex::FromHexError),

    /// The decoded secret is shorter than the cipher key.
    #[error("the encryption secret must decode to at least {required} bytes, got {actual}")]
    SecretTooShort {
        /// Minimum number of decoded bytes.
        required: usize,
        /// Number of bytes the configured secret decoded to.
        actual: usize,
    },
}

/// Why a token was rejected.
///
/// The reason is for logs only; every variant means "no session" to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InvalidToken {
    /// Wrong number of segments or wrong segment lengths.
    #[error("malformed token")]
    Malformed,

    /// A segment is not valid unpadded base64url.
    #[error("token segment is not valid base64url")]
    Encoding,

    /// Block decryption failed (bad padding).
    #[error("token could not be decrypted")]
    Decrypt,

    /// The compressed body is corrupt or too large.
    #[error("token body could not be decompressed")]
    Decompress,

    /// The MAC did not match: wrong key, corrupted IV or tampered data.
    #[error("token signature mismatch")]
    Signature,

    /// An expiration policy is configured but the token carries no timestamp.
    #[error("token has no timestamp")]
    MissingTimestamp,

    /// The authenticated plaintext is not a session value.
    #[error("token payload could not be deserialized")]
    Deserialize,
}

/// Failure to produce a token.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The session value could not be serialized.
    #[error("session serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The compressor failed.
    #[error("session compression failed: {0}")]
    Compress(#[from] std::io::Error),

    /// The issue time does not fit the 32-bit timestamp field.
    #[error("timestamp {0} is outside the token's 32-bit range")]
    Timestamp(i64),
}
