//! Data structures shared across the orchestration core.

pub mod creation;
pub mod posting;
pub mod proposal;

pub use creation::{CreationRecord, ReviewStatus};
pub use posting::{PlatformPost, PostingRecord, PostingSummary};
pub use proposal::Proposal;
