//! The encrypted cookie wire format.
//!
//! A sealed value looks like `<magic>.<base64url ciphertext>`. The plaintext under the AEAD is an
//! 8-byte little-endian Unix-seconds expiry followed by the encoded session. When that plaintext
//! is larger than [`COMPRESS_THRESHOLD`] it is deflated first and the magic switches from
//! [`PLAIN_MAGIC`] to [`COMPRESSED_MAGIC`]. The cookie name is bound as associated data, so a
//! value sealed for one cookie does not open under another.

use std::io::{Read as _, Write as _};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use flate2::{Compression, read::DeflateDecoder, write::DeflateEncoder};
use time::OffsetDateTime;

use crate::{
    aead::Aead,
    error::{Error, Result},
};

pub const PLAIN_MAGIC: &str = "EU1";
pub const COMPRESSED_MAGIC: &str = "EC1";

/// Plaintexts larger than this many bytes are compressed before encryption.
pub const COMPRESS_THRESHOLD: usize = 512;

/// Default upper bound on the length of a sealed cookie value.
pub const MAX_COOKIE_BYTES: usize = 4096;

const EXPIRY_LEN: usize = 8;

// Bounds the work a crafted compressed cookie can cause. A 4 KiB cookie that inflates past this
// was not produced by us.
const MAX_INFLATED_BYTES: usize = 64 * 1024;

/// Output of [`open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub expires_at: OffsetDateTime,
    pub payload: Vec<u8>,
    pub compressed: bool,
}

/// Seals `payload` into a cookie value for the cookie called `name`.
pub fn seal(
    aead: &dyn Aead,
    name: &str,
    expires_at: OffsetDateTime,
    payload: &[u8],
    compress: bool,
    max_len: usize,
) -> Result<String> {
    let mut plaintext = Vec::with_capacity(EXPIRY_LEN + payload.len());
    plaintext.extend_from_slice(&(expires_at.unix_timestamp() as u64).to_le_bytes());
    plaintext.extend_from_slice(payload);

    let magic = if compress && plaintext.len() > COMPRESS_THRESHOLD {
        plaintext = deflate(&plaintext)?;
        COMPRESSED_MAGIC
    } else {
        PLAIN_MAGIC
    };

    let ciphertext = aead.encrypt(&plaintext, name.as_bytes())?;
    let value = format!("{magic}.{}", URL_SAFE_NO_PAD.encode(ciphertext));

    if value.len() > max_len {
        return Err(Error::CookieTooLarge {
            size: value.len(),
            max: max_len,
        });
    }

    Ok(value)
}

/// Reverses [`seal`]. Expiry is returned, not checked.
pub fn open(aead: &dyn Aead, name: &str, value: &str) -> Result<Opened> {
    let (magic, encoded) = value
        .split_once('.')
        .ok_or_else(|| Error::Malformed("missing '.' separator".into()))?;

    let compressed = match magic {
        PLAIN_MAGIC => false,
        COMPRESSED_MAGIC => true,
        other => return Err(Error::Malformed(format!("unknown magic {other:?}"))),
    };

    let ciphertext = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|err| Error::Malformed(err.to_string()))?;

    let mut plaintext = aead.decrypt(&ciphertext, name.as_bytes())?;
    if compressed {
        plaintext = inflate(&plaintext)?;
    }

    if plaintext.len() < EXPIRY_LEN {
        return Err(Error::Malformed("payload shorter than expiry header".into()));
    }
    let payload = plaintext.split_off(EXPIRY_LEN);
    let mut expiry = [0u8; EXPIRY_LEN];
    expiry.copy_from_slice(&plaintext);
    let expires_at = OffsetDateTime::from_unix_timestamp(u64::from_le_bytes(expiry) as i64)
        .map_err(|err| Error::Malformed(format!("expiry out of range: {err}")))?;

    Ok(Opened {
        expires_at,
        payload,
        compressed,
    })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|()| encoder.finish())
        .map_err(|err| Error::Encode(format!("compressing cookie: {err}")))
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_INFLATED_BYTES as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|err| Error::Malformed(format!("decompressing cookie: {err}")))?;

    if out.len() > MAX_INFLATED_BYTES {
        return Err(Error::Malformed("decompressed cookie is too large".into()));
    }
    Ok(out)
}
