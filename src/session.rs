use std::{fmt, sync::Arc};

use axum_core::extract::FromRequestParts;
use http::{StatusCode, request::Parts};
use parking_lot::Mutex;

use crate::codec::Metadata;

/// What the manager should do with the session once the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    /// Leave the stored session alone, apart from refreshing an idle timeout.
    #[default]
    None,
    Save,
    Delete,
    /// Drop the current identity and store the value under a fresh one.
    Reset,
}

#[derive(Debug)]
pub(crate) struct SessionState<T> {
    pub(crate) value: T,
    pub(crate) metadata: Metadata,
    pub(crate) loaded: bool,
    pub(crate) intent: Intent,
    // The bytes as loaded, kept only when an idle timeout may need them re-persisted untouched.
    pub(crate) original: Option<Vec<u8>>,
}

impl<T> SessionState<T> {
    pub(crate) fn new(value: T, metadata: Metadata) -> Self {
        Self {
            value,
            metadata,
            loaded: false,
            intent: Intent::None,
            original: None,
        }
    }
}

/// The session for the current request.
///
/// Inserted into request extensions by [`SessionManagerLayer`](crate::SessionManagerLayer), and
/// extractable in axum handlers. Clones share the same state. Changes are only recorded here;
/// the store is written once, after the handler has produced its response.
pub struct Session<T> {
    state: Arc<Mutex<SessionState<T>>>,
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl<T> Session<T> {
    pub(crate) fn new(state: SessionState<T>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SessionState<T>) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// A session holding `value` that is not attached to any store. Handy for testing handlers
    /// without the layer.
    pub fn detached(value: T) -> Self {
        Self::new(SessionState::new(
            value,
            Metadata::new(time::OffsetDateTime::now_utc()),
        ))
    }

    /// Records `value` to be persisted at the end of the request.
    pub fn save(&self, value: T) {
        self.with_state(|state| {
            state.value = value;
            state.intent = Intent::Save;
        });
    }

    /// Resets the session to an empty value and removes it from the store at the end of the
    /// request.
    pub fn delete(&self)
    where
        T: Default,
    {
        self.with_state(|state| {
            state.value = T::default();
            state.original = None;
            state.intent = Intent::Delete;
        });
    }

    /// Stores `value` under a new session identity, invalidating the old one.
    ///
    /// Call this whenever privileges change, such as on login, so that an identifier planted
    /// before the change is useless afterwards.
    pub fn reset(&self, value: T) {
        self.with_state(|state| {
            state.value = value;
            state.original = None;
            state.intent = Intent::Reset;
        });
    }

    /// Whether an existing session was loaded, as opposed to a new one being started.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    pub fn intent(&self) -> Intent {
        self.state.lock().intent
    }

    pub fn metadata(&self) -> Metadata {
        self.state.lock().metadata
    }
}

impl<T: Clone> Session<T> {
    /// The current value: loaded from the store, freshly defaulted, or as last saved.
    pub fn get(&self) -> T {
        self.state.lock().value.clone()
    }
}

impl<S, T> FromRequestParts<S> for Session<T>
where
    S: Send + Sync,
    T: Send + 'static,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session<T>>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract session. Is `SessionManagerLayer` enabled?",
        ))
    }
}
