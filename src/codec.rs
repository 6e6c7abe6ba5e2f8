//! Session token codec.
//!
//! Encoding serializes the session value, optionally compresses it, encrypts it with AES-256-CBC
//! under a fresh IV and signs `iv ++ plaintext ++ timestamp` with an HMAC. The MAC covers the
//! uncompressed plaintext rather than the ciphertext, so a changed key or corrupted IV is detected
//! even though CBC decryption itself "succeeds" with the wrong key.
//!
//! Decoding never fails loudly: every malformed, tampered or stale token comes back as a
//! [`Decoded`] variant.

use std::{
    collections::HashMap,
    io::{Read as _, Write as _},
};

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};
use rand::{RngCore, rngs::OsRng};
use time::{Duration, OffsetDateTime};

use crate::{
    digest::DigestAlgorithm,
    error::{EncodeError, InvalidToken},
    format::{IV_LEN, Token},
    key::SecretKey,
};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Structured session state carried by a token.
pub type SessionValue = HashMap<String, serde_json::Value>;

/// Upper bound on a decompressed body. Cookies are small; anything past this is hostile.
pub const MAX_PLAINTEXT_BYTES: u64 = 256 * 1024;

/// Outcome of [`Codec::decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Authentic, fresh token.
    Valid(DecodedSession),
    /// Rejected token. The reason is for logging only.
    Invalid(InvalidToken),
    /// Authentic token whose validity window has passed. The payload is withheld.
    Expired {
        /// When the token was issued.
        issued_at: OffsetDateTime,
    },
}

/// Payload of a valid token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSession {
    /// The session value.
    pub value: SessionValue,
    /// Serialized form of `value`, exactly as authenticated.
    pub plaintext: Vec<u8>,
    /// Issue time, present when the token was encoded with an expiration policy.
    pub issued_at: Option<OffsetDateTime>,
}

impl Decoded {
    /// The decoded session, if the token was valid.
    pub fn into_session(self) -> Option<DecodedSession> {
        match self {
            Self::Valid(session) => Some(session),
            Self::Invalid(_) | Self::Expired { .. } => None,
        }
    }

    /// Whether the token was valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Encrypts and authenticates session values into cookie tokens.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Codec {
    key: SecretKey,
    digest: DigestAlgorithm,
    compress: bool,
}

impl Codec {
    /// Codec with the default digest (SHA-1) and compression enabled.
    pub fn new(key: SecretKey) -> Self {
        Self {
            key,
            digest: DigestAlgorithm::default(),
            compress: true,
        }
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

    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    pub fn compresses(&self) -> bool {
        self.compress
    }

    /// Encode `session`, stamping the current time when `expire_after` is set.
    pub fn encode(
        &self,
        session: &SessionValue,
        expire_after: Option<Duration>,
    ) -> Result<String, EncodeError> {
        self.encode_at(session, expire_after, OffsetDateTime::now_utc())
    }

    /// Encode `session` as if the current time were `now`.
    pub fn encode_at(
        &self,
        session: &SessionValue,
        expire_after: Option<Duration>,
        now: OffsetDateTime,
    ) -> Result<String, EncodeError> {
        let plaintext = serde_json::to_vec(session)?;

        let compressed = if self.compress {
            Some(compress(&plaintext)?).filter(|body| body.len() < plaintext.len())
        } else {
            None
        };

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let body = compressed.as_deref().unwrap_or(&plaintext);
        let ciphertext = Aes256CbcEnc::new(self.key.encryption_key().into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(body);

        let timestamp = match expire_after {
            Some(_) => {
                let secs = now.unix_timestamp();
                Some(u32::try_from(secs).map_err(|_| EncodeError::Timestamp(secs))?)
            }
            None => None,
        };

        let mac = self.digest.sign(
            self.key.signing_key(),
            &mac_input(&iv, &plaintext, timestamp).as_parts(),
        );

        Ok(Token {
            iv,
            compressed: compressed.is_some(),
            ciphertext,
            mac,
            timestamp,
        }
        .render())
    }

    /// Decode `token`, enforcing `expire_after` against the current time.
    pub fn decode(&self, token: &str, expire_after: Option<Duration>) -> Decoded {
        self.decode_at(token, expire_after, OffsetDateTime::now_utc())
    }

    /// Decode `token` as if the current time were `now`.
    pub fn decode_at(
        &self,
        token: &str,
        expire_after: Option<Duration>,
        now: OffsetDateTime,
    ) -> Decoded {
        match self.try_decode(token, expire_after, now) {
            Ok(decoded) => decoded,
            Err(reason) => {
                tracing::debug!(reason = %reason, "session token rejected");
                Decoded::Invalid(reason)
            }
        }
    }

    fn try_decode(
        &self,
        token: &str,
        expire_after: Option<Duration>,
        now: OffsetDateTime,
    ) -> Result<Decoded, InvalidToken> {
        let token = Token::parse(token)?;

        let body = Aes256CbcDec::new(self.key.encryption_key().into(), &token.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&token.ciphertext)
            .map_err(|_| InvalidToken::Decrypt)?;

        let plaintext = if token.compressed {
            decompress(&body)?
        } else {
            body
        };

        let input = mac_input(&token.iv, &plaintext, token.timestamp);
        if !self
            .digest
            .verify(self.key.signing_key(), &input.as_parts(), &token.mac)
        {
            return Err(InvalidToken::Signature);
        }

        let issued_at = token
            .timestamp
            .map(|secs| OffsetDateTime::from_unix_timestamp(i64::from(secs)))
            .transpose()
            .map_err(|_| InvalidToken::Malformed)?;

        if let Some(expire_after) = expire_after {
            let issued_at = issued_at.ok_or(InvalidToken::MissingTimestamp)?;
            if now - issued_at >= expire_after {
                return Ok(Decoded::Expired { issued_at });
            }
        }

        let value: SessionValue =
            serde_json::from_slice(&plaintext).map_err(|_| InvalidToken::Deserialize)?;

        Ok(Decoded::Valid(DecodedSession {
            value,
            plaintext,
            issued_at,
        }))
    }
}

/// Byte ranges covered by the MAC.
struct MacInput<'a> {
    iv: &'a [u8],
    plaintext: &'a [u8],
    timestamp: String,
}

impl MacInput<'_> {
    fn as_parts(&self) -> [&[u8]; 3] {
        [self.iv, self.plaintext, self.timestamp.as_bytes()]
    }
}

fn mac_input<'a>(iv: &'a [u8], plaintext: &'a [u8], timestamp: Option<u32>) -> MacInput<'a> {
    MacInput {
        iv,
        plaintext,
        timestamp: timestamp.map(|t| t.to_string()).unwrap_or_default(),
    }
}

fn compress(plaintext: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plaintext)?;
    Ok(encoder.finish()?)
}

fn decompress(body: &[u8]) -> Result<Vec<u8>, InvalidToken> {
    let mut out = Vec::new();
    ZlibDecoder::new(body)
        .take(MAX_PLAINTEXT_BYTES + 1)
        .read_to_end(&mut out)
        .map_err(|_| InvalidToken::Decompress)?;
    if out.len() as u64 > MAX_PLAINTEXT_BYTES {
        return Err(InvalidToken::Decompress);
    }
    Ok(out)
}
