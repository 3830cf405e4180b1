use thiserror::Error;

/// Errors produced while loading, decoding or persisting a session.
///
/// A missing cookie or key is never an error: stores report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// The manager or a store was constructed with an invalid configuration.
    #[error("session configuration: {0}")]
    Config(String),

    /// The session value or its metadata could not be serialized.
    #[error("encoding session: {0}")]
    Encode(String),

    /// Stored bytes could not be converted back into the session type.
    #[error("decoding session: {0}")]
    Decode(String),

    /// A session cookie did not follow the expected framing.
    #[error("malformed session cookie: {0}")]
    Malformed(String),

    /// Encryption failed, or decryption failed authentication.
    #[error("session cookie crypto: {0}")]
    Crypto(String),

    /// The sealed cookie value would exceed the configured limit.
    #[error("session cookie is {size} bytes, greater than the maximum of {max}")]
    CookieTooLarge { size: usize, max: usize },

    /// The key/value backend failed.
    #[error("session backend: {0}")]
    Backend(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
