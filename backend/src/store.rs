use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisResult};
use shared::VoteOptions;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::StoreSettings;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0:?}")]
    TimedOut(Duration),
}

/// Integer counters keyed by option label. Implementations must be safe to
/// share across concurrent requests.
#[rocket::async_trait]
pub trait CounterStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn exists(&self, label: &str) -> Result<bool, StoreError>;

    /// An absent key reads as 0.
    async fn get_count(&self, label: &str) -> Result<i64, StoreError>;

    async fn set_count(&self, label: &str, value: i64) -> Result<(), StoreError>;

    /// Atomic at the store. Returns the post-increment value.
    async fn increment_count(&self, label: &str, delta: i64) -> Result<i64, StoreError>;
}

/// Creates a zero counter for every configured label that has none yet. Two
/// instances racing here both write 0, which is harmless.
pub async fn initialize_counters(store: &dyn CounterStore, options: &VoteOptions) -> Result<(), StoreError> {
    for label in options.labels() {
        if !store.exists(label).await? {
            store.set_count(label, 0).await?;
            info!(label, "Initialized counter");
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    /// Connects and pings. Fails instead of retrying so startup can abort
    /// before the listener is bound.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(settings.host.clone(), settings.port),
            redis: RedisConnectionInfo {
                password: settings.password.clone(),
                ..Default::default()
            },
        };

        let client = redis::Client::open(info).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = with_timeout(settings.timeout, ConnectionManager::new(client)).await?;

        let store = Self { conn, timeout: settings.timeout };
        store.ping().await?;
        info!(host = %settings.host, port = settings.port, "Connected to counter store");
        Ok(store)
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        with_timeout(self.timeout, fut).await
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
        Err(_) => Err(StoreError::TimedOut(limit)),
    }
}

#[rocket::async_trait]
impl CounterStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pong: String = self.call(redis::cmd("PING").query_async(&mut conn)).await?;
        debug!(%pong, "Store ping");
        Ok(())
    }

    async fn exists(&self, label: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        self.call(conn.exists(label)).await
    }

    async fn get_count(&self, label: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = self.call(conn.get(label)).await?;
        Ok(value.unwrap_or(0))
    }

    async fn set_count(&self, label: &str, value: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.call(conn.set(label, value)).await
    }

    async fn increment_count(&self, label: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        self.call(conn.incr(label, delta)).await
    }
}

/// Process-local store for tests and single-node runs. `set_available(false)`
/// makes every call fail the way an unreachable server would.
#[derive(Debug)]
pub struct MemoryStore {
    counters: Mutex<HashMap<String, i64>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Keys currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .counters
            .lock()
            .map(|counters| counters.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn with_counters<T>(&self, f: impl FnOnce(&mut HashMap<String, i64>) -> T) -> Result<T, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Unavailable("counter lock poisoned".into()))?;
        Ok(f(&mut counters))
    }
}

#[rocket::async_trait]
impl CounterStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.with_counters(|_| ())
    }

    async fn exists(&self, label: &str) -> Result<bool, StoreError> {
        self.with_counters(|counters| counters.contains_key(label))
    }

    async fn get_count(&self, label: &str) -> Result<i64, StoreError> {
        self.with_counters(|counters| counters.get(label).copied().unwrap_or(0))
    }

    async fn set_count(&self, label: &str, value: i64) -> Result<(), StoreError> {
        self.with_counters(|counters| {
            counters.insert(label.to_string(), value);
        })
    }

    async fn increment_count(&self, label: &str, delta: i64) -> Result<i64, StoreError> {
        self.with_counters(|counters| {
            let count = counters.entry(label.to_string()).or_insert(0);
            *count += delta;
            *count
        })
    }
}
