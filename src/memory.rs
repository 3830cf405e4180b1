use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;

use crate::{
    clock::{self, Clock, SharedClock},
    error::Result,
    kv_store::{Kv, KvStore},
};

#[derive(Debug)]
struct Entry {
    expires_at: OffsetDateTime,
    value: Vec<u8>,
}

/// A process-local [`Kv`] backend.
///
/// Expired entries are reported as absent but only dropped when overwritten or deleted. Suitable
/// for tests and single-instance deployments.
#[derive(Debug)]
pub struct MemoryKv {
    contents: RwLock<HashMap<String, Entry>>,
    clock: SharedClock,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            contents: RwLock::new(HashMap::new()),
            clock: clock::system(),
        }
    }

    #[must_use]
    pub fn with_clock<C: Clock>(mut self, clock: Arc<C>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.contents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.read().is_empty()
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let contents = self.contents.read();

        Ok(contents
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, expires_at: OffsetDateTime, value: &[u8]) -> Result<()> {
        self.contents.write().insert(
            key.to_owned(),
            Entry {
                expires_at,
                value: value.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.contents.write().remove(key);
        Ok(())
    }
}

impl KvStore<MemoryKv> {
    /// A [`KvStore`] over a fresh [`MemoryKv`].
    pub fn memory() -> Self {
        Self::new(MemoryKv::new())
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn set_get_delete() {
        let kv = MemoryKv::new();
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);

        kv.set("a", expires_at, b"1").await.expect("set succeeds");
        assert_eq!(kv.get("a").await.expect("get succeeds").as_deref(), Some(&b"1"[..]));
        assert!(kv.get("b").await.expect("get succeeds").is_none());

        kv.delete("a").await.expect("delete succeeds");
        assert!(kv.get("a").await.expect("get succeeds").is_none());
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_absent() {
        let clock = Arc::new(ManualClock::starting_now());
        let kv = MemoryKv::new().with_clock(clock.clone());

        kv.set("a", clock.now() + Duration::minutes(1), b"1")
            .await
            .expect("set succeeds");
        clock.advance(Duration::minutes(2));

        assert!(kv.get("a").await.expect("get succeeds").is_none());
        assert_eq!(kv.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writers() {
        let kv = Arc::new(MemoryKv::new());
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let kv = kv.clone();
                tokio::spawn(async move {
                    let key = format!("k{i}");
                    kv.set(&key, expires_at, key.as_bytes())
                        .await
                        .expect("set succeeds");
                    kv.get(&key).await.expect("get succeeds")
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let value = task.await.expect("task completes");
            assert_eq!(value, Some(format!("k{i}").into_bytes()));
        }
        assert_eq!(kv.len(), 16);
    }
}
