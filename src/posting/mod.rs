//! Multi-platform posting.

pub mod scheduler;

pub use scheduler::{PlatformRule, PostingConfig, PostingScheduler, PostingWindow};
