//! Session store with per-session locking
//!
//! The id → entry map sits behind one `RwLock` that is only held for lookup,
//! insertion and eviction. Each entry carries its own `RwLock<Session>`:
//! mutations hold the write half across read → compute → commit, so two
//! mutations on one session are serialized while different sessions never
//! wait on each other. Lock waits are bounded by the configured timeout.
//!
//! Table work in [`SessionStore::mutate`] and [`SessionStore::query`] runs on
//! tokio's blocking pool, so a large table never stalls the async workers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Session, SessionSnapshot};
use crate::dataset::Dataset;
use crate::error::{ApiError, ApiResult};
use crate::pipeline::Mutation;

struct SessionEntry {
    session: Arc<RwLock<Session>>,
    /// Milliseconds since the store epoch at last access
    last_access_ms: AtomicU64,
}

/// Result of [`SessionStore::mutate`]
#[derive(Debug)]
pub struct Committed<R> {
    pub output: R,
    /// Human-readable outcome (the action entry, or the no-op reason)
    pub message: String,
    /// Entry appended to the action log, `None` when nothing changed
    pub action: Option<String>,
    /// Current table after the call
    pub current: Arc<Dataset>,
}

/// Shared session store, cloned into every handler
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<SessionEntry>>>>,
    lock_timeout: Duration,
    epoch: Instant,
}

impl SessionStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lock_timeout,
            epoch: Instant::now(),
        }
    }

    /// Register a freshly uploaded table and return its id
    pub async fn create(&self, dataset: Dataset, filename: impl Into<String>) -> Uuid {
        let filename = filename.into();
        let shape = dataset.shape();

        let mut sessions = self.sessions.write().await;
        let mut id = Uuid::new_v4();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4();
        }

        let entry = SessionEntry {
            session: Arc::new(RwLock::new(Session::new(id, dataset, filename.clone()))),
            last_access_ms: AtomicU64::new(self.now_ms()),
        };
        sessions.insert(id, Arc::new(entry));

        info!(
            session_id = %id,
            filename = %filename,
            rows = shape[0],
            columns = shape[1],
            "Created session"
        );
        id
    }

    /// Consistent copy of a session
    pub async fn get(&self, id: Uuid) -> ApiResult<SessionSnapshot> {
        let entry = self.entry(id).await?;
        let session = self.bounded(id, entry.session.read()).await?;
        Ok(session.snapshot())
    }

    /// Swap the current table
    pub async fn replace_current(&self, id: Uuid, dataset: Dataset) -> ApiResult<()> {
        let entry = self.entry(id).await?;
        let mut session = self.bounded(id, entry.session.write()).await?;
        session.current = Arc::new(dataset);
        Ok(())
    }

    /// Append one entry to the action log
    pub async fn append_action(&self, id: Uuid, description: impl Into<String>) -> ApiResult<()> {
        let entry = self.entry(id).await?;
        let mut session = self.bounded(id, entry.session.write()).await?;
        session.actions.push(description.into());
        Ok(())
    }

    /// Run a pipeline operation against the current table and commit it
    ///
    /// The session write lock is held from reading `current` until the new
    /// table and action entry are both stored, including while `op` runs on
    /// the blocking pool. Errors and [`Mutation::Unchanged`] leave the
    /// session untouched.
    pub async fn mutate<R, F>(&self, id: Uuid, op: F) -> ApiResult<Committed<R>>
    where
        F: FnOnce(&Dataset) -> ApiResult<Mutation<R>> + Send + 'static,
        R: Send + 'static,
    {
        let entry = self.entry(id).await?;
        let mut session = self.bounded(id, entry.session.write()).await?;

        let input = Arc::clone(&session.current);
        let outcome = off_runtime(move || op(input.as_ref())).await?;

        match outcome {
            Mutation::Applied {
                dataset,
                action,
                output,
            } => {
                let current = Arc::new(dataset);
                session.current = Arc::clone(&current);
                session.actions.push(action.clone());

                info!(
                    session_id = %id,
                    action = %action,
                    rows = current.height(),
                    columns = current.width(),
                    "Committed mutation"
                );
                Ok(Committed {
                    output,
                    message: action.clone(),
                    action: Some(action),
                    current,
                })
            }
            Mutation::Unchanged { message, output } => {
                debug!(session_id = %id, %message, "Mutation was a no-op");
                Ok(Committed {
                    output,
                    message,
                    action: None,
                    current: Arc::clone(&session.current),
                })
            }
        }
    }

    /// Read-only access under the session's shared lock
    ///
    /// The read guard moves to the blocking pool with `op` and is released
    /// when `op` returns.
    pub async fn query<R, F>(&self, id: Uuid, op: F) -> ApiResult<R>
    where
        F: FnOnce(&Session) -> ApiResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let entry = self.entry(id).await?;
        let session = self
            .bounded(id, Arc::clone(&entry.session).read_owned())
            .await?;
        off_runtime(move || op(&session)).await
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions not accessed for at least `ttl`
    ///
    /// Sessions whose lock is currently held are skipped and retried on the
    /// next sweep.
    pub async fn evict_idle(&self, ttl: Duration) -> Vec<Uuid> {
        let now = self.now_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        let mut sessions = self.sessions.write().await;
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| {
                let idle = now.saturating_sub(entry.last_access_ms.load(Ordering::Relaxed));
                idle >= ttl_ms && entry.session.try_write().is_ok()
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            sessions.remove(id);
            info!(session_id = %id, ttl_secs = ttl.as_secs(), "Evicted idle session");
        }
        expired
    }

    async fn entry(&self, id: Uuid) -> ApiResult<Arc<SessionEntry>> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ApiError::NotFound(id))?;
        entry.last_access_ms.store(self.now_ms(), Ordering::Relaxed);
        Ok(entry)
    }

    /// Await a lock guard, giving up after the configured timeout
    async fn bounded<G>(&self, id: Uuid, acquire: impl Future<Output = G>) -> ApiResult<G> {
        timeout(self.lock_timeout, acquire)
            .await
            .map_err(|_| ApiError::Busy(id))
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Run table work on the blocking pool
async fn off_runtime<R, F>(work: F) -> ApiResult<R>
where
    F: FnOnce() -> ApiResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Table task failed: {}", e)))?
}
