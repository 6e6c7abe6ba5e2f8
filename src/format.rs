//! Helpers for rendering/parsing the cookie token text format.
//!
//! This is primarily useful for testing and debugging; it performs no cryptography.
//!
//! ```text
//! <b64u(iv)>[ |.]<b64u(ciphertext)>.<b64u(mac)>[.<b64u(be32(timestamp))>]
//! ```
//!
//! The separator after the IV is a space when the body was compressed and a period otherwise.
//! Base64url is unpadded.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::error::InvalidToken;

/// Cipher block size, and therefore IV length, in bytes.
pub const IV_LEN: usize = 16;

/// Segment separator.
const SEPARATOR: char = '.';

/// Separator between IV and ciphertext marking a compressed body.
const COMPRESSED_SEPARATOR: char = ' ';

/// Byte length of the encoded timestamp.
const TIMESTAMP_LEN: usize = 4;

/// A token split into its binary parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Per-token random IV.
    pub iv: [u8; IV_LEN],
    /// Whether the encrypted body is compressed.
    pub compressed: bool,
    /// Encrypted (possibly compressed) body.
    pub ciphertext: Vec<u8>,
    /// Tag over IV, uncompressed plaintext and timestamp.
    pub mac: Vec<u8>,
    /// Issue time in seconds since the Unix epoch, if the token expires.
    pub timestamp: Option<u32>,
}

impl Token {
    /// Render the token in its cookie-safe text form.
    pub fn render(&self) -> String {
        let separator = if self.compressed {
            COMPRESSED_SEPARATOR
        } else {
            SEPARATOR
        };

        let mut out = format!(
            "{}{separator}{}{SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(self.iv),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
            URL_SAFE_NO_PAD.encode(&self.mac),
        );
        if let Some(timestamp) = self.timestamp {
            out.push(SEPARATOR);
            out.push_str(&URL_SAFE_NO_PAD.encode(timestamp.to_be_bytes()));
        }
        out
    }

    /// Parse a token's text form. Never panics on arbitrary input.
    pub fn parse(value: &str) -> Result<Self, InvalidToken> {
        let split_at = value
            .find([SEPARATOR, COMPRESSED_SEPARATOR])
            .ok_or(InvalidToken::Malformed)?;
        let (iv, rest) = value.split_at(split_at);
        let compressed = rest.starts_with(COMPRESSED_SEPARATOR);
        let rest = &rest[1..];

        let segments: Vec<&str> = rest.split(SEPARATOR).collect();
        let (ciphertext, mac, timestamp) = match segments.as_slice() {
            [ciphertext, mac] => (*ciphertext, *mac, None),
            [ciphertext, mac, timestamp] => (*ciphertext, *mac, Some(*timestamp)),
            _ => return Err(InvalidToken::Malformed),
        };
        if iv.is_empty() || ciphertext.is_empty() || mac.is_empty() {
            return Err(InvalidToken::Malformed);
        }

        let iv: [u8; IV_LEN] = decode_segment(iv)?
            .try_into()
            .map_err(|_| InvalidToken::Malformed)?;
        let ciphertext = decode_segment(ciphertext)?;
        let mac = decode_segment(mac)?;
        let timestamp = timestamp
            .map(|segment| {
                let bytes: [u8; TIMESTAMP_LEN] = decode_segment(segment)?
                    .try_into()
                    .map_err(|_| InvalidToken::Malformed)?;
                Ok(u32::from_be_bytes(bytes))
            })
            .transpose()?;

        Ok(Self {
            iv,
            compressed,
            ciphertext,
            mac,
            timestamp,
        })
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, InvalidToken> {
    URL_SAFE_NO_PAD
        .decode(segment.as_bytes())
        .map_err(|_| InvalidToken::Encoding)
}
