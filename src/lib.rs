//! Typed, request-scoped sessions for `tower`.
//!
//! [`SessionManagerLayer`] loads a session of type `T` before the inner service runs, hands it to
//! handlers as a [`Session<T>`] in the request extensions, and writes the outcome back once the
//! handler has returned. Handlers record an intent (`save`, `delete` or `reset`) and the store is
//! touched at most once per request.
//!
//! Two stores are provided:
//!
//! - [`CookieStore`] seals the whole session into one AES-GCM encrypted cookie.
//! - [`KvStore`] keeps the session in a key/value backend, such as [`MemoryKv`], and only puts a
//!   random identifier in the cookie.
//!
//! # Session fixation
//! Call [`Session::reset`] whenever privileges change, typically on login. It invalidates the old
//! identity at the store and persists the value under a new one.
//!
//! # Expiry
//! At least one of an idle timeout and a max lifetime must be configured; when both are, the
//! earlier deadline wins. A request that only reads the session still pushes the idle deadline
//! forward.

mod aead;
mod clock;
mod codec;
mod config;
mod cookie_store;
mod error;
mod expiry;
pub mod format;
mod kv_store;
pub mod layer;
mod memory;
mod session;
mod store;

pub use tower_cookies::cookie::SameSite;

#[cfg(feature = "proto")]
pub use crate::codec::ProtoCodec;
pub use crate::{
    aead::{Aead, AesGcm},
    clock::{Clock, ManualClock, SystemClock},
    codec::{Codec, JsonCodec, Metadata},
    config::{CookieOptions, DEFAULT_IDLE_TIMEOUT, SessionConfig},
    cookie_store::{CookieStore, DEFAULT_COOKIE_NAME},
    error::{Error, Result},
    kv_store::{DEFAULT_KV_COOKIE_NAME, Kv, KvRequestState, KvStore},
    layer::SessionManagerLayer,
    memory::MemoryKv,
    session::{Intent, Session},
    store::Store,
};
