//! Durable JSON collections with atomic whole-file rewrites.
//!
//! Two collections back the orchestration core: the creations index and
//! the posting records. Both are single JSON documents rewritten in full
//! on every mutation (temp file + rename), so a crash mid-write leaves
//! either the previous or the new complete version, never a partial file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::{CreationRecord, PlatformPost, PostingRecord, ReviewStatus};

/// Errors from the durable stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store file is corrupt: {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("platform '{platform}' already posted for creation {creation_id}")]
    DuplicatePost {
        creation_id: String,
        platform: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Write `contents` to `path` atomically via a sibling temp file
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;

    Ok(())
}

async fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path).await?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

async fn persist_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(items)?;
    write_atomic(path, &json).await
}

/// Index of creations that made it through the generation pipeline
pub struct CreationStore {
    path: PathBuf,
    mutex: Mutex<()>,
}

impl CreationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mutex: Mutex::new(()),
        }
    }

    /// All indexed creations in insertion order
    pub async fn load(&self) -> Result<Vec<CreationRecord>, StoreError> {
        load_collection(&self.path).await
    }

    /// Creations cleared for distribution
    pub async fn approved(&self) -> Result<Vec<CreationRecord>, StoreError> {
        let records = self.load().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.review == ReviewStatus::Approved)
            .collect())
    }

    /// Look up a creation by id
    pub async fn get(&self, id: &str) -> Result<Option<CreationRecord>, StoreError> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    /// Append a new creation to the index
    pub async fn append(&self, record: CreationRecord) -> Result<(), StoreError> {
        let _guard = self.mutex.lock().await;
        let mut records = load_collection::<CreationRecord>(&self.path).await?;

        records.push(record);
        persist_collection(&self.path, &records).await
    }

    /// Flip the review status of one creation
    pub async fn update_status(&self, id: &str, status: ReviewStatus) -> Result<(), StoreError> {
        let _guard = self.mutex.lock().await;
        let mut records = load_collection::<CreationRecord>(&self.path).await?;

        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.review = status;

        persist_collection(&self.path, &records).await?;
        info!(id, %status, "review status updated");
        Ok(())
    }
}

/// Per-creation distribution records
pub struct PostingStore {
    path: PathBuf,
    mutex: Mutex<()>,
}

impl PostingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mutex: Mutex::new(()),
        }
    }

    /// All posting records
    pub async fn load(&self) -> Result<Vec<PostingRecord>, StoreError> {
        load_collection(&self.path).await
    }

    /// Posting record for one creation, if it has ever been posted
    pub async fn get(&self, creation_id: &str) -> Result<Option<PostingRecord>, StoreError> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.creation_id == creation_id))
    }

    /// Record a successful post. Atomic update-by-id: the record is created
    /// on first post, and a second post to the same platform is refused to
    /// preserve the one-entry-per-platform invariant.
    pub async fn record_post(
        &self,
        creation_id: &str,
        platform: &str,
        post_id: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _guard = self.mutex.lock().await;
        let mut records = load_collection::<PostingRecord>(&self.path).await?;

        let position = match records.iter().position(|r| r.creation_id == creation_id) {
            Some(position) => position,
            None => {
                records.push(PostingRecord::new(creation_id));
                records.len() - 1
            }
        };
        let record = &mut records[position];

        if record.platforms.contains_key(platform) {
            return Err(StoreError::DuplicatePost {
                creation_id: creation_id.to_string(),
                platform: platform.to_string(),
            });
        }

        record.platforms.insert(
            platform.to_string(),
            PlatformPost {
                post_id: post_id.to_string(),
                posted_at,
            },
        );

        persist_collection(&self.path, &records).await?;
        info!(creation_id, platform, post_id, "post recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn sample_record(id: &str, review: ReviewStatus) -> CreationRecord {
        CreationRecord {
            id: id.to_string(),
            cycle_id: Uuid::new_v4(),
            proposal_id: format!("prop-{id}"),
            seed: 7,
            subject: "city at dusk".to_string(),
            style: "analog film".to_string(),
            caption: "dusk, but make it grain".to_string(),
            image_path: PathBuf::from("/assets/img.png"),
            video_path: PathBuf::from("/assets/clip.mp4"),
            final_path: PathBuf::from("/assets/final.mp4"),
            duration_secs: 9.0,
            created_at: Utc::now(),
            review,
        }
    }

    #[tokio::test]
    async fn test_append_and_filter_approved() {
        let temp = TempDir::new().unwrap();
        let store = CreationStore::new(temp.path().join("creations.json"));

        store
            .append(sample_record("a", ReviewStatus::Approved))
            .await
            .unwrap();
        store
            .append(sample_record("b", ReviewStatus::PendingReview))
            .await
            .unwrap();

        assert_eq!(store.load().await.unwrap().len(), 2);
        let approved = store.approved().await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, "a");
    }

    #[tokio::test]
    async fn test_update_status() {
        let temp = TempDir::new().unwrap();
        let store = CreationStore::new(temp.path().join("creations.json"));

        store
            .append(sample_record("a", ReviewStatus::PendingReview))
            .await
            .unwrap();
        store
            .update_status("a", ReviewStatus::Approved)
            .await
            .unwrap();

        assert_eq!(store.approved().await.unwrap().len(), 1);

        let err = store
            .update_status("ghost", ReviewStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_record_post_refuses_duplicates() {
        let temp = TempDir::new().unwrap();
        let store = PostingStore::new(temp.path().join("posting.json"));

        store
            .record_post("c1", "instagram", "ig-1", Utc::now())
            .await
            .unwrap();

        let err = store
            .record_post("c1", "instagram", "ig-2", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePost { .. }));

        let record = store.get("c1").await.unwrap().unwrap();
        assert_eq!(record.platforms.len(), 1);
        assert_eq!(record.platforms["instagram"].post_id, "ig-1");
    }

    #[tokio::test]
    async fn test_record_post_accumulates_platforms() {
        let temp = TempDir::new().unwrap();
        let store = PostingStore::new(temp.path().join("posting.json"));

        store
            .record_post("c1", "instagram", "ig-1", Utc::now())
            .await
            .unwrap();
        store
            .record_post("c1", "tiktok", "tt-1", Utc::now())
            .await
            .unwrap();

        let record = store.get("c1").await.unwrap().unwrap();
        assert_eq!(record.platforms.len(), 2);
    }
}
