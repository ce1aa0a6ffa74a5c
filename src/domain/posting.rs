//! Per-creation distribution state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A successful post to one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformPost {
    /// Identifier returned by the platform
    pub post_id: String,

    /// When the post was made
    pub posted_at: DateTime<Utc>,
}

/// Distribution state for one creation: which platforms it has been posted
/// to, and when. At most one entry per platform; absence means "not yet
/// posted there".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingRecord {
    /// The creation this record belongs to
    pub creation_id: String,

    /// Platform name to post, one entry per platform
    pub platforms: BTreeMap<String, PlatformPost>,
}

impl PostingRecord {
    /// Create an empty record for a creation
    pub fn new(creation_id: impl Into<String>) -> Self {
        Self {
            creation_id: creation_id.into(),
            platforms: BTreeMap::new(),
        }
    }

    /// Latest posted_at across all platforms, if anything has been posted
    pub fn latest_post_at(&self) -> Option<DateTime<Utc>> {
        self.platforms.values().map(|p| p.posted_at).max()
    }
}

/// What a single posting cycle actually did. Never cumulative.
#[derive(Debug, Clone, Default)]
pub struct PostingSummary {
    /// The run completed without a cross-cutting failure
    pub ok: bool,

    /// Number of posts made in this run
    pub posted: usize,

    /// Platforms posted to in this run, in posting order
    pub platforms: Vec<String>,

    /// The run was skipped because a previous run was still in progress
    pub coalesced: bool,
}

impl PostingSummary {
    /// Summary for a run that did its work (possibly posting nothing)
    pub fn empty() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    /// Summary for a run skipped due to an overlapping execution
    pub fn coalesced() -> Self {
        Self {
            ok: true,
            coalesced: true,
            ..Default::default()
        }
    }
}
