//! Where encoded sessions live between requests.
//!
//! A [`Store`] is handed the request's cookie jar on every call. Anything a store needs to
//! remember for the rest of a single request (such as which identifier it bound) goes in its
//! [`Store::RequestState`], which the manager creates fresh for each request and drops after.
//!
//! Store calls may perform I/O. They are ordinary futures, so dropping the request future
//! cancels whatever call is in flight.

use std::fmt::Debug;

use async_trait::async_trait;
use time::OffsetDateTime;
use tower_cookies::Cookies;

use crate::error::Result;

#[async_trait]
pub trait Store: Debug + Send + Sync + 'static {
    /// Per-request bookkeeping owned by the manager on the store's behalf.
    type RequestState: Default + Send + Sync + 'static;

    /// Loads the encoded session for this request. `Ok(None)` means there is none.
    async fn get(&self, cookies: &Cookies, state: &mut Self::RequestState)
    -> Result<Option<Vec<u8>>>;

    /// Saves the encoded session, creating it if it doesn't exist. The data may be discarded
    /// after `expires_at`.
    async fn put(
        &self,
        cookies: &Cookies,
        state: &mut Self::RequestState,
        expires_at: OffsetDateTime,
        data: &[u8],
    ) -> Result<()>;

    /// Removes the session for this request's identity.
    async fn delete(&self, cookies: &Cookies, state: &mut Self::RequestState) -> Result<()>;
}
