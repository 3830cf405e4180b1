use std::{borrow::Cow, fmt, sync::Arc};

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::{
    SameSite,
    clock::{self, Clock, SharedClock},
};

/// Default idle timeout applied by [`SessionConfig::default`].
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::hours(24);

/// Attributes of the cookie a store writes.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub(crate) name: Cow<'static, str>,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
}

impl CookieOptions {
    pub fn new<N: Into<Cow<'static, str>>>(name: N) -> Self {
        Self {
            name: name.into(),
            http_only: true,
            same_site: SameSite::Lax,
            secure: true,
            path: "/".into(),
            domain: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

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

    /// Only disable for local development over plain HTTP.
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

    pub(crate) fn build_cookie(&self, value: String, expires_at: OffsetDateTime) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone())
            .expires(expires_at);

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

pub(crate) type OnLoad<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// Lifetime settings for a [`SessionManagerLayer`](crate::SessionManagerLayer).
///
/// At least one of the idle timeout and the max lifetime must be set. This is checked when the
/// layer is built, not per request.
pub struct SessionConfig<T> {
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) on_load: Option<OnLoad<T>>,
    pub(crate) clock: SharedClock,
}

impl<T> Default for SessionConfig<T> {
    fn default() -> Self {
        Self {
            max_lifetime: None,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            on_load: None,
            clock: clock::system(),
        }
    }
}

impl<T> Clone for SessionConfig<T> {
    fn clone(&self) -> Self {
        Self {
            max_lifetime: self.max_lifetime,
            idle_timeout: self.idle_timeout,
            on_load: self.on_load.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T> fmt::Debug for SessionConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("max_lifetime", &self.max_lifetime)
            .field("idle_timeout", &self.idle_timeout)
            .field("on_load", &self.on_load.is_some())
            .field("clock", &self.clock)
            .finish()
    }
}

impl<T> SessionConfig<T> {
    /// Sessions expire this long after creation, however active they are.
    #[must_use]
    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = Some(max_lifetime);
        self
    }

    #[must_use]
    pub fn without_max_lifetime(mut self) -> Self {
        self.max_lifetime = None;
        self
    }

    /// Sessions expire this long after they were last persisted. Every request that loads a
    /// session pushes the deadline forward.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    #[must_use]
    pub fn without_idle_timeout(mut self) -> Self {
        self.idle_timeout = None;
        self
    }

    /// Runs on every value loaded from the store, before handlers see it.
    #[must_use]
    pub fn with_on_load<F>(mut self, on_load: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.on_load = Some(Arc::new(on_load));
        self
    }

    #[must_use]
    pub fn with_clock<C: Clock>(mut self, clock: Arc<C>) -> Self {
        self.clock = clock;
        self
    }
}
