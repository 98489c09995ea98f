//! Per-browser session state for the web app.
//!
//! Every session owns its own records; nothing is shared between sessions
//! and nothing is written to disk. Idle sessions are dropped on access.

use crate::ingest::{FieldAliases, Ingestor};
use crate::models::{Dataset, IngestReport, PendingFix, PendingRecord, PendingResolution};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub type SessionId = Uuid;

/// One user's uploaded data.
#[derive(Debug)]
pub struct Session {
    ingestor: Ingestor,
    dataset: Dataset,
    last_upload: Option<IngestReport>,
    last_access: Instant,
}

impl Session {
    fn new(aliases: Arc<FieldAliases>) -> Self {
        Self {
            ingestor: Ingestor::new(aliases),
            dataset: Dataset::default(),
            last_upload: None,
            last_access: Instant::now(),
        }
    }

    /// Ingest uploaded files into this session.
    pub fn ingest(&mut self, files: Vec<(String, Vec<u8>)>) -> IngestReport {
        let report = self.ingestor.ingest_batch(files, &mut self.dataset);
        self.last_upload = Some(report.clone());
        report
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Outcome of the most recent upload; the page shows it once.
    pub fn take_last_upload(&mut self) -> Option<IngestReport> {
        self.last_upload.take()
    }

    /// Apply `fix` to the pending entry at `index`. A now-complete entry moves
    /// into the records; otherwise it is updated in place. `None` when there
    /// is no such entry.
    pub fn resolve_pending(&mut self, index: usize, fix: &PendingFix) -> Option<PendingResolution> {
        let entry = self.dataset.pending.get(index)?;

        let resolution = match self.ingestor.resolve(entry, fix) {
            Ok(record) => {
                self.dataset.pending.remove(index);
                self.dataset.records.push(record.clone());
                PendingResolution::Resolved { record }
            }
            Err(pending) => {
                self.dataset.pending[index] = pending.clone();
                PendingResolution::Pending { pending }
            }
        };
        Some(resolution)
    }

    /// Discard the pending entry at `index`.
    pub fn delete_pending(&mut self, index: usize) -> Option<PendingRecord> {
        (index < self.dataset.pending.len()).then(|| self.dataset.pending.remove(index))
    }

    /// Drop all records, pending entries and remembered uploads.
    pub fn clear(&mut self) {
        self.dataset.clear();
        self.ingestor.reset();
        self.last_upload = None;
    }
}

/// All live sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    aliases: Arc<FieldAliases>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(aliases: FieldAliases, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            aliases: Arc::new(aliases),
            ttl,
        }
    }

    /// Run `f` against the session `id`, creating it if needed.
    pub async fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.write().await;
        self.prune(&mut sessions);

        let session = sessions.entry(id).or_insert_with(|| {
            debug!("New session {}", id);
            Session::new(self.aliases.clone())
        });
        session.last_access = Instant::now();

        f(session)
    }

    /// Forget a session entirely.
    pub async fn remove(&self, id: SessionId) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn prune(&self, sessions: &mut HashMap<SessionId, Session>) {
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, s| s.last_access.elapsed() < ttl);

        let dropped = before - sessions.len();
        if dropped > 0 {
            info!("Expired {} idle session(s)", dropped);
        }
    }
}
