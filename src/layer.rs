use std::{
    fmt,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{Request, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    clock::SharedClock,
    codec::{Codec, JsonCodec, Metadata},
    config::{OnLoad, SessionConfig},
    error::Result,
    expiry::ExpiryPolicy,
    session::{Intent, Session, SessionState},
    store::Store,
};

/// Loads a typed session before the inner service runs and persists it afterwards.
pub struct SessionManagerLayer<T, S, C = JsonCodec> {
    manager: Arc<Manager<T, S, C>>,
}

struct Manager<T, S, C> {
    store: S,
    codec: C,
    policy: ExpiryPolicy,
    on_load: Option<OnLoad<T>>,
    clock: SharedClock,
    _value: PhantomData<fn() -> T>,
}

impl<T, S, C> Clone for SessionManagerLayer<T, S, C> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<T, S: fmt::Debug, C: fmt::Debug> fmt::Debug for SessionManagerLayer<T, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManagerLayer")
            .field("store", &self.manager.store)
            .field("codec", &self.manager.codec)
            .field("policy", &self.manager.policy)
            .finish_non_exhaustive()
    }
}

impl<T, S> SessionManagerLayer<T, S, JsonCodec>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static,
    S: Store,
{
    /// A manager for a serde session type, encoded as JSON.
    ///
    /// Fails if neither an idle timeout nor a max lifetime is configured.
    pub fn new(store: S, config: SessionConfig<T>) -> Result<Self> {
        Self::with_codec(store, JsonCodec, config)
    }
}

#[cfg(feature = "proto")]
impl<T, S> SessionManagerLayer<T, S, crate::codec::ProtoCodec>
where
    T: prost::Message + prost::Name + Default + Clone + Send + Sync + 'static,
    S: Store,
{
    /// A manager for a protobuf session type, encoded in a binary envelope.
    pub fn binary(store: S, config: SessionConfig<T>) -> Result<Self> {
        Self::with_codec(store, crate::codec::ProtoCodec, config)
    }
}

impl<T, S, C> SessionManagerLayer<T, S, C>
where
    T: Default + Clone + Send + Sync + 'static,
    S: Store,
    C: Codec<T>,
{
    /// A manager using an explicitly chosen codec.
    pub fn with_codec(store: S, codec: C, config: SessionConfig<T>) -> Result<Self> {
        let policy = ExpiryPolicy::new(config.max_lifetime, config.idle_timeout)?;

        Ok(Self {
            manager: Arc::new(Manager {
                store,
                codec,
                policy,
                on_load: config.on_load,
                clock: config.clock,
                _value: PhantomData,
            }),
        })
    }
}

impl<T, S, C> Manager<T, S, C>
where
    T: Default + Clone + Send + Sync + 'static,
    S: Store,
    C: Codec<T>,
{
    async fn load(&self, cookies: &Cookies, binding: &mut S::RequestState) -> Result<SessionState<T>> {
        let now = self.clock.now();
        let fresh = SessionState::new(T::default(), Metadata::new(now));

        let Some(data) = self.store.get(cookies, binding).await? else {
            return Ok(fresh);
        };

        let (value, metadata) = self.codec.decode(&data)?;
        if self.policy.lifetime_exceeded(&metadata, now) {
            tracing::debug!(created_at = %metadata.created_at, "session exceeded max lifetime");
            // The stale identity goes with it; a fresh session never inherits it.
            self.store.delete(cookies, binding).await?;
            return Ok(fresh);
        }

        let value = match &self.on_load {
            Some(on_load) => on_load(value),
            None => value,
        };

        let mut state = SessionState::new(value, metadata);
        state.loaded = true;
        if self.policy.idle_timeout().is_some() {
            state.original = Some(data);
        }
        Ok(state)
    }

    async fn persist(
        &self,
        cookies: &Cookies,
        binding: &mut S::RequestState,
        session: &Session<T>,
    ) -> Result<()> {
        let now = self.clock.now();

        // Snapshot under the lock; the guard must not be held across store calls.
        let (intent, encoded, touch) = session.with_state(|state| {
            if matches!(state.intent, Intent::Delete | Intent::Reset) {
                state.metadata = Metadata::new(now);
            }
            state.metadata.updated_at = Some(now);

            let encoded = match state.intent {
                Intent::Save | Intent::Reset => Some(
                    self.codec
                        .encode(&state.value, &state.metadata)
                        .map(|data| (data, self.policy.expires_at(&state.metadata))),
                ),
                Intent::None | Intent::Delete => None,
            };
            let touch = match state.intent {
                Intent::None => state
                    .original
                    .clone()
                    .map(|data| (data, self.policy.expires_at(&state.metadata))),
                _ => None,
            };
            (state.intent, encoded.transpose(), touch)
        });
        let encoded = encoded?;

        if matches!(intent, Intent::Delete | Intent::Reset) {
            self.store.delete(cookies, binding).await?;
        }

        if let Some((data, expires_at)) = encoded {
            self.store.put(cookies, binding, expires_at, &data).await?;
        } else if let Some((data, expires_at)) = touch {
            self.store.put(cookies, binding, expires_at, &data).await?;
        }

        Ok(())
    }
}

/// The service produced by [`SessionManagerLayer`].
pub struct SessionManager<Svc, T, S, C> {
    inner: Svc,
    manager: Arc<Manager<T, S, C>>,
}

impl<Svc: Clone, T, S, C> Clone for SessionManager<Svc, T, S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            manager: self.manager.clone(),
        }
    }
}

impl<Svc: fmt::Debug, T, S: fmt::Debug, C> fmt::Debug for SessionManager<Svc, T, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("inner", &self.inner)
            .field("store", &self.manager.store)
            .finish_non_exhaustive()
    }
}

impl<Svc, T, S, C> Layer<Svc> for SessionManagerLayer<T, S, C> {
    type Service = CookieManager<SessionManager<Svc, T, S, C>>;

    fn layer(&self, inner: Svc) -> Self::Service {
        CookieManager::new(SessionManager {
            inner,
            manager: self.manager.clone(),
        })
    }
}

fn internal_error<B: Default>() -> Response<B> {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}

impl<ReqBody, ResBody, Svc, T, S, C> Service<Request<ReqBody>> for SessionManager<Svc, T, S, C>
where
    Svc: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    Svc::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    T: Default + Clone + Send + Sync + 'static,
    S: Store,
    C: Codec<T>,
{
    type Response = Svc::Response;
    type Error = Svc::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let manager = self.manager.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            // Already managed further out; the outer layer owns this request's session.
            if req.extensions().get::<Session<T>>().is_some() {
                return inner.call(req).await;
            }

            let Some(cookies) = req.extensions().get::<Cookies>().cloned() else {
                tracing::error!("cookie jar missing from request extensions");
                return Ok(internal_error());
            };

            let mut binding = S::RequestState::default();
            let state = match manager.load(&cookies, &mut binding).await {
                Ok(state) => state,
                Err(err) => {
                    tracing::error!(err = %err, "session load failed");
                    return Ok(internal_error());
                }
            };

            let session = Session::new(state);
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            if let Err(err) = manager.persist(&cookies, &mut binding, &session).await {
                tracing::error!(err = %err, "session save failed");
                return Ok(internal_error());
            }

            Ok(res)
        })
    }
}
