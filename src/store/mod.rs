use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use snafu::ResultExt;
use tokio::sync::Mutex;

pub mod errors;
use errors::*;

pub type StoreResult<T> = Result<T, StoreError>;

/// The command shapes the authoritative filters and the active-probe
/// filter need against the external key-value store. A trait seam rather
/// than a concrete struct so tests can substitute an in-memory fake
/// instead of requiring a live Redis server, the same reasoning the
/// wildcard resolver applies to its lookup closure.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;
    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;
    async fn sadd(&self, key: &str, members: &[String]) -> StoreResult<()>;
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;
    async fn spop(&self, key: &str) -> StoreResult<Option<String>>;
}

/// Shared handle onto a real Redis server — this crate only issues the
/// command shapes `KvStore` declares, and never reimplements the store
/// itself.
///
/// `MultiplexedConnection`'s command methods take `&mut self`, so concurrent
/// filters fan in through a shared `Mutex` rather than each holding their
/// own clone.
pub struct Store {
    conn: Arc<Mutex<MultiplexedConnection>>,
}

impl Store {
    pub async fn connect(redis_uri: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_uri).context(ConnectSnafu {
            uri: redis_uri.to_string(),
        })?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .context(ConnectSnafu {
                uri: redis_uri.to_string(),
            })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl KvStore for Store {
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.lock().await;
        conn.hget(key, field)
            .await
            .context(CommandSnafu { key: key.to_string() })
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn.lock().await;
        conn.sismember(key, member)
            .await
            .context(CommandSnafu { key: key.to_string() })
    }

    async fn sadd(&self, key: &str, members: &[String]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let _: i64 = conn
            .sadd(key, members)
            .await
            .context(CommandSnafu { key: key.to_string() })?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.lock().await;
        conn.smembers(key)
            .await
            .context(CommandSnafu { key: key.to_string() })
    }

    async fn spop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.lock().await;
        conn.spop(key)
            .await
            .context(CommandSnafu { key: key.to_string() })
    }
}

/// In-memory `KvStore` used by authoritative-filter unit tests so the
/// LocalDB/DenySet/AllowSet scenarios in SPEC_FULL.md can be exercised
/// without a live Redis server.
#[cfg(test)]
pub mod fake {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{KvStore, StoreResult};

    #[derive(Default)]
    pub struct FakeStore {
        hashes: Mutex<HashMap<String, HashMap<String, String>>>,
        sets: Mutex<HashMap<String, HashSet<String>>>,
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn hset(&self, key: &str, field: &str, value: &str) {
            self.hashes
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
        }

        pub async fn sadd_sync(&self, key: &str, member: &str) {
            self.sets
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string());
        }
    }

    #[async_trait]
    impl KvStore for FakeStore {
        async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
            Ok(self
                .hashes
                .lock()
                .await
                .get(key)
                .and_then(|fields| fields.get(field).cloned()))
        }

        async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
            Ok(self
                .sets
                .lock()
                .await
                .get(key)
                .map(|members| members.contains(member))
                .unwrap_or(false))
        }

        async fn sadd(&self, key: &str, members: &[String]) -> StoreResult<()> {
            let mut sets = self.sets.lock().await;
            let entry = sets.entry(key.to_string()).or_default();
            for member in members {
                entry.insert(member.clone());
            }
            Ok(())
        }

        async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
            Ok(self
                .sets
                .lock()
                .await
                .get(key)
                .map(|members| members.iter().cloned().collect())
                .unwrap_or_default())
        }

        async fn spop(&self, key: &str) -> StoreResult<Option<String>> {
            let mut sets = self.sets.lock().await;
            if let Some(members) = sets.get_mut(key) {
                if let Some(item) = members.iter().next().cloned() {
                    members.remove(&item);
                    return Ok(Some(item));
                }
            }
            Ok(None)
        }
    }
}
