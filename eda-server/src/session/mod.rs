//! In-memory dataset sessions
//!
//! One [`Session`] per successful upload, addressed by a random UUID.
//! Sessions live until process shutdown, or until idle eviction when a TTL
//! is configured.

pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dataset::Dataset;

pub use store::{Committed, SessionStore};

/// Server-side record of one uploaded dataset
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    /// Table as parsed at upload, never replaced
    pub original: Arc<Dataset>,
    /// Live table, replaced wholesale by each committed mutation
    pub current: Arc<Dataset>,
    /// One entry per committed mutation, in order
    pub actions: Vec<String>,
}

impl Session {
    pub fn new(id: Uuid, dataset: Dataset, filename: impl Into<String>) -> Self {
        let original = Arc::new(dataset);
        Self {
            id,
            filename: filename.into(),
            created_at: Utc::now(),
            current: Arc::clone(&original),
            original,
            actions: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            filename: self.filename.clone(),
            created_at: self.created_at,
            original: Arc::clone(&self.original),
            current: Arc::clone(&self.current),
            actions: self.actions.clone(),
        }
    }
}

/// Consistent point-in-time copy of a session
///
/// Tables are shared, not cloned: a later mutation swaps the session's
/// `current` pointer and leaves this snapshot's table intact.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub original: Arc<Dataset>,
    pub current: Arc<Dataset>,
    pub actions: Vec<String>,
}
