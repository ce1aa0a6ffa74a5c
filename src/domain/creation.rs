//! Indexed creations and their review lifecycle.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review state of an indexed creation.
///
/// Creations are indexed as `pending_review` (or `approved` directly when
/// auto-approval is configured) and only `approved` creations are ever
/// picked up by the posting scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Waiting for a human decision
    PendingReview,

    /// Cleared for distribution
    Approved,

    /// Will never be distributed
    Rejected,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Metadata record for one creation that made it through the full
/// generation pipeline. This is the unit the posting scheduler distributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationRecord {
    /// Unique identifier for this creation
    pub id: String,

    /// Generation cycle that produced it
    pub cycle_id: Uuid,

    /// Proposal this creation was generated from
    pub proposal_id: String,

    /// Seed forwarded to the generation vendors
    pub seed: u64,

    /// Subject prompt field, kept for auditing
    pub subject: String,

    /// Style prompt field, kept for auditing
    pub style: String,

    /// Caption used at publish time
    pub caption: String,

    /// Source still image
    pub image_path: PathBuf,

    /// Raw generated clip
    pub video_path: PathBuf,

    /// Final muxed cut ready for distribution
    pub final_path: PathBuf,

    /// Duration of the final cut in seconds
    pub duration_secs: f64,

    /// When the record was indexed
    pub created_at: DateTime<Utc>,

    /// Current review state
    pub review: ReviewStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_status_serialization() {
        let json = serde_json::to_string(&ReviewStatus::PendingReview).unwrap();
        assert_eq!(json, "\"pending_review\"");

        let parsed: ReviewStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(parsed, ReviewStatus::Approved);
    }
}
