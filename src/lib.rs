//! reelcast - generation and distribution orchestrator
//!
//! Drives a multi-stage content-generation pipeline over rate-limited,
//! metered, unreliable external AI services, then publishes approved
//! creations to social platforms under timing and idempotency constraints.
//!
//! # Architecture
//!
//! The core is a handful of injectable services owned by the application:
//! - Every paid vendor call is admitted by the budget ledger and a
//!   per-vendor concurrency gate before it is made
//! - Generation jobs flow through a durable FIFO with exclusive claims
//! - Each proposal's pipeline failures are isolated to that proposal
//! - Posting is idempotent and resumable: repeated runs converge to
//!   "posted once per platform, respecting delays"
//!
//! # Modules
//!
//! - `adapters`: vendor client seams (generation, QA, publishing)
//! - `core`: budget, vendor pool, job queue, cycle orchestrator
//! - `domain`: data structures (Proposal, CreationRecord, PostingRecord)
//! - `posting`: the multi-platform posting scheduler
//! - `storage`: durable JSON collections with atomic rewrites
//! - `cli`: command-line ops surface

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod posting;
pub mod storage;

// Re-export main types at crate root for convenience
pub use core::{
    BudgetError, BudgetGovernor, CycleOrchestrator, GenClients, JobQueue, JobStatus,
    PipelineError, QueueEntry, QueueError, Stage, Vendor, VendorCapacities, VendorPool,
};
pub use domain::{CreationRecord, PlatformPost, PostingRecord, PostingSummary, Proposal, ReviewStatus};
pub use posting::{PlatformRule, PostingConfig, PostingScheduler, PostingWindow};
pub use storage::{CreationStore, PostingStore, StoreError};
