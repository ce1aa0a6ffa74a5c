//! Durable generation job queue with exclusive-claim semantics.
//!
//! The queue is one ordered JSON document, rewritten atomically (write to a
//! temp file, then rename) on every mutation. Every load-mutate-store cycle
//! runs inside a single critical section, so no two callers can claim the
//! same entry. The design assumes one process owns the queue file; an
//! advisory exclusive lock taken at open makes that assumption an error
//! instead of silent corruption.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors from the job queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue entry not found: {0}")]
    NotFound(String),

    #[error("queue file is corrupt: {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("queue file is owned by another process: {0}")]
    Locked(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Lifecycle state of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed
    Pending,

    /// Claimed by a worker
    Processing,

    /// Terminal failure, retained for manual action
    Failed,
}

/// One persisted queue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique job identifier
    pub item_id: String,

    /// When the job was enqueued
    pub queued_at: DateTime<Utc>,

    /// Current lifecycle state
    pub status: JobStatus,

    /// When the job was claimed (if it has been)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,

    /// When the job failed (if it did)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    /// Why the job failed (if it did)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Aggregate queue counts plus the current in-flight entry
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub failed: usize,
    pub in_flight: Option<QueueEntry>,
}

/// Durable FIFO of generation jobs.
///
/// All operations serialize through one mutex; the read and the write of
/// each mutation happen inside the same critical section.
pub struct JobQueue {
    path: PathBuf,
    mutex: Mutex<()>,

    // Held for the queue's lifetime; dropping it releases the lock.
    _lock_file: std::fs::File,
}

impl JobQueue {
    /// Open (or create) the queue at the given path, taking an advisory
    /// exclusive lock on a sibling lock file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| QueueError::Locked(lock_path))?;

        Ok(Self {
            path,
            mutex: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Path of the queue file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a job. Idempotent: if the item is already present in any state,
    /// its existing 1-based position is returned and nothing changes.
    pub async fn enqueue(&self, item_id: &str) -> Result<usize, QueueError> {
        let _guard = self.mutex.lock().await;
        let mut entries = self.load().await?;

        if let Some(position) = entries.iter().position(|e| e.item_id == item_id) {
            debug!(item_id, position = position + 1, "already queued");
            return Ok(position + 1);
        }

        entries.push(QueueEntry {
            item_id: item_id.to_string(),
            queued_at: Utc::now(),
            status: JobStatus::Pending,
            processing_started_at: None,
            failed_at: None,
            failure_reason: None,
        });
        self.persist(&entries).await?;

        info!(item_id, position = entries.len(), "enqueued");
        Ok(entries.len())
    }

    /// Claim the oldest pending entry, flipping it to `processing` within
    /// the same critical section that read it. Returns `None` when nothing
    /// is pending.
    pub async fn claim_next(&self) -> Result<Option<QueueEntry>, QueueError> {
        let _guard = self.mutex.lock().await;
        let mut entries = self.load().await?;

        // min_by_key keeps the first entry on ties, preserving insertion order
        let next = entries
            .iter_mut()
            .filter(|e| e.status == JobStatus::Pending)
            .min_by_key(|e| e.queued_at);

        let Some(entry) = next else {
            return Ok(None);
        };

        entry.status = JobStatus::Processing;
        entry.processing_started_at = Some(Utc::now());
        let claimed = entry.clone();

        self.persist(&entries).await?;

        info!(item_id = %claimed.item_id, "claimed");
        Ok(Some(claimed))
    }

    /// Remove a successfully processed entry outright. No history is kept.
    pub async fn complete(&self, item_id: &str) -> Result<(), QueueError> {
        let _guard = self.mutex.lock().await;
        let mut entries = self.load().await?;

        let position = entries
            .iter()
            .position(|e| e.item_id == item_id)
            .ok_or_else(|| QueueError::NotFound(item_id.to_string()))?;

        entries.remove(position);
        self.persist(&entries).await?;

        info!(item_id, "completed");
        Ok(())
    }

    /// Mark an entry as failed. The entry is retained for manual
    /// inspection or re-enqueue; there is no automatic retry.
    pub async fn fail(&self, item_id: &str, reason: &str) -> Result<(), QueueError> {
        let _guard = self.mutex.lock().await;
        let mut entries = self.load().await?;

        let entry = entries
            .iter_mut()
            .find(|e| e.item_id == item_id)
            .ok_or_else(|| QueueError::NotFound(item_id.to_string()))?;

        entry.status = JobStatus::Failed;
        entry.failed_at = Some(Utc::now());
        entry.failure_reason = Some(reason.to_string());
        self.persist(&entries).await?;

        info!(item_id, reason, "failed");
        Ok(())
    }

    /// Delete an entry regardless of state (externally cancelled work).
    /// Returns whether anything was removed.
    pub async fn remove(&self, item_id: &str) -> Result<bool, QueueError> {
        let _guard = self.mutex.lock().await;
        let mut entries = self.load().await?;

        let Some(position) = entries.iter().position(|e| e.item_id == item_id) else {
            return Ok(false);
        };

        entries.remove(position);
        self.persist(&entries).await?;

        info!(item_id, "removed");
        Ok(true)
    }

    /// Aggregate counts plus the current in-flight entry, if any
    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let _guard = self.mutex.lock().await;
        let entries = self.load().await?;

        let mut status = QueueStatus::default();
        for entry in &entries {
            match entry.status {
                JobStatus::Pending => status.pending += 1,
                JobStatus::Processing => status.processing += 1,
                JobStatus::Failed => status.failed += 1,
            }
        }
        status.in_flight = entries
            .iter()
            .find(|e| e.status == JobStatus::Processing)
            .cloned();

        Ok(status)
    }

    /// All entries in queue order
    pub async fn entries(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let _guard = self.mutex.lock().await;
        self.load().await
    }

    async fn load(&self) -> Result<Vec<QueueEntry>, QueueError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|source| QueueError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn persist(&self, entries: &[QueueEntry]) -> Result<(), QueueError> {
        let json = serde_json::to_string_pretty(entries)?;

        // Full rewrite via temp file + rename: a crash mid-write leaves the
        // previous complete version in place.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}
