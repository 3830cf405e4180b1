use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tower_cookies::Cookies;

use crate::{
    aead::Aead,
    clock::{self, Clock, SharedClock},
    config::CookieOptions,
    error::Result,
    format,
    store::Store,
};

/// Default name of the cookie holding the sealed session.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// Keeps the whole session in one encrypted cookie. Nothing is stored server side.
#[derive(Debug, Clone)]
pub struct CookieStore {
    aead: Arc<dyn Aead>,
    cookie: CookieOptions,
    max_cookie_bytes: usize,
    compress: bool,
    clock: SharedClock,
}

impl CookieStore {
    pub fn new<A: Aead>(aead: A) -> Self {
        Self {
            aead: Arc::new(aead),
            cookie: CookieOptions::new(DEFAULT_COOKIE_NAME),
            max_cookie_bytes: format::MAX_COOKIE_BYTES,
            compress: true,
            clock: clock::system(),
        }
    }

    #[must_use]
    pub fn with_cookie_options(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn with_clock<C: Clock>(mut self, clock: Arc<C>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl Store for CookieStore {
    type RequestState = ();

    async fn get(&self, cookies: &Cookies, _state: &mut ()) -> Result<Option<Vec<u8>>> {
        let Some(cookie) = cookies.get(&self.cookie.name) else {
            return Ok(None);
        };

        let opened = format::open(self.aead.as_ref(), &self.cookie.name, cookie.value())?;
        if opened.expires_at <= self.clock.now() {
            tracing::debug!(expires_at = %opened.expires_at, "session cookie expired");
            return Ok(None);
        }

        Ok(Some(opened.payload))
    }

    async fn put(
        &self,
        cookies: &Cookies,
        _state: &mut (),
        expires_at: OffsetDateTime,
        data: &[u8],
    ) -> Result<()> {
        let value = format::seal(
            self.aead.as_ref(),
            &self.cookie.name,
            expires_at,
            data,
            self.compress,
            self.max_cookie_bytes,
        )?;
        cookies.add(self.cookie.build_cookie(value, expires_at));
        Ok(())
    }

    async fn delete(&self, cookies: &Cookies, _state: &mut ()) -> Result<()> {
        cookies.remove(self.cookie.removal_cookie());
        Ok(())
    }
}
