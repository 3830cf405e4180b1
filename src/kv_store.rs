use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use data_encoding::BASE32_NOPAD;
use rand::{RngCore as _, rngs::OsRng};
use sha2::{Digest as _, Sha256};
use time::OffsetDateTime;
use tower_cookies::Cookies;

use crate::{config::CookieOptions, error::Result, store::Store};

/// Default name of the cookie carrying the session identifier.
pub const DEFAULT_KV_COOKIE_NAME: &str = "session-id";

/// A key/value backend for [`KvStore`].
///
/// Operations on a single key must be atomic. Expired entries may be evicted by the backend,
/// and must not be returned by `get` once `expires_at` has passed if the backend tracks it.
#[async_trait]
pub trait Kv: Debug + Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, expires_at: OffsetDateTime, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<K: Kv> Kv for Arc<K> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: &str, expires_at: OffsetDateTime, value: &[u8]) -> Result<()> {
        self.as_ref().set(key, expires_at, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.as_ref().delete(key).await
    }
}

/// A 128-bit random session identifier, base32 encoded without padding.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SessionId(String);

impl SessionId {
    pub(crate) fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE32_NOPAD.encode(&bytes))
    }

    /// The backend key for this identifier. One-way, so a leaked key can't be replayed as a cookie.
    pub(crate) fn storage_key(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionId(..)")
    }
}

/// Identifier bound to the current request, if any.
#[derive(Debug, Default)]
pub struct KvRequestState {
    id: Option<SessionId>,
}

/// Keeps sessions in a [`Kv`] backend. The cookie only carries a random identifier.
#[derive(Debug, Clone)]
pub struct KvStore<K> {
    kv: K,
    cookie: CookieOptions,
}

impl<K: Kv> KvStore<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            cookie: CookieOptions::new(DEFAULT_KV_COOKIE_NAME),
        }
    }

    #[must_use]
    pub fn with_cookie_options(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }
}

#[async_trait]
impl<K: Kv> Store for KvStore<K> {
    type RequestState = KvRequestState;

    async fn get(&self, cookies: &Cookies, state: &mut KvRequestState) -> Result<Option<Vec<u8>>> {
        let id = match &state.id {
            Some(id) => id.clone(),
            None => match cookies.get(&self.cookie.name) {
                Some(cookie) => SessionId(cookie.value().to_owned()),
                None => return Ok(None),
            },
        };

        let data = self.kv.get(&id.storage_key()).await?;
        // Only adopt identifiers that name a live session; anything else gets a fresh one on put.
        if data.is_some() {
            state.id = Some(id);
        }
        Ok(data)
    }

    async fn put(
        &self,
        cookies: &Cookies,
        state: &mut KvRequestState,
        expires_at: OffsetDateTime,
        data: &[u8],
    ) -> Result<()> {
        let id = state.id.get_or_insert_with(SessionId::generate).clone();

        self.kv.set(&id.storage_key(), expires_at, data).await?;
        cookies.add(self.cookie.build_cookie(id.as_str().to_owned(), expires_at));
        Ok(())
    }

    async fn delete(&self, cookies: &Cookies, state: &mut KvRequestState) -> Result<()> {
        let Some(id) = state.id.take() else {
            // Nothing stored, but an unknown identifier cookie should still be expired.
            cookies.remove(self.cookie.removal_cookie());
            return Ok(());
        };

        self.kv.delete(&id.storage_key()).await?;
        cookies.remove(self.cookie.removal_cookie());

        // Anything saved later in this request goes under a new identity, never the old one.
        state.id = Some(SessionId::generate());
        tracing::debug!("session identifier rotated");
        Ok(())
    }
}
