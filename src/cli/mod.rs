//! Command-line interface for reelcast.
//!
//! Ops surface over the durable state: queue management, review
//! decisions, and posting introspection. Generation cycles and the
//! posting timer are driven by the embedding service, not from here.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use crate::config;
use crate::core::{JobQueue, VendorPool};
use crate::domain::ReviewStatus;
use crate::posting::PostingScheduler;
use crate::storage::{CreationStore, PostingStore};

/// reelcast - generation and distribution orchestrator
#[derive(Parser, Debug)]
#[command(name = "reelcast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the generation job queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Review indexed creations
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },

    /// Inspect and adjust posting state
    Posting {
        #[command(subcommand)]
        command: PostingCommands,
    },

    /// Show queue, index, and posting state in one view
    Status,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Enqueue a generation job (idempotent)
    Add {
        /// Job identifier
        item_id: String,
    },

    /// Claim the oldest pending job
    Claim,

    /// Remove a successfully processed job
    Complete {
        item_id: String,
    },

    /// Mark a job as failed
    Fail {
        item_id: String,

        /// Failure reason recorded on the entry
        #[arg(short, long)]
        reason: String,
    },

    /// Delete a job regardless of state
    Remove {
        item_id: String,
    },

    /// Show queue counts and the in-flight entry
    Status,
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// List indexed creations
    List {
        /// Only show creations with this review status
        #[arg(short, long, value_enum)]
        status: Option<ReviewFilter>,
    },

    /// Clear a creation for distribution
    Approve {
        id: String,
    },

    /// Reject a creation
    Reject {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PostingCommands {
    /// Show (creation, platform) pairs eligible right now
    Preview,

    /// Record an out-of-band manual post so the scheduler never repeats it
    Mark {
        creation_id: String,
        platform: String,
        post_id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReviewFilter {
    Pending,
    Approved,
    Rejected,
}

impl From<ReviewFilter> for ReviewStatus {
    fn from(filter: ReviewFilter) -> Self {
        match filter {
            ReviewFilter::Pending => ReviewStatus::PendingReview,
            ReviewFilter::Approved => ReviewStatus::Approved,
            ReviewFilter::Rejected => ReviewStatus::Rejected,
        }
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Queue { command } => execute_queue(command).await,
            Commands::Review { command } => execute_review(command).await,
            Commands::Posting { command } => execute_posting(command).await,
            Commands::Status => execute_status().await,
        }
    }
}

fn open_queue() -> Result<JobQueue> {
    let cfg = config::config()?;
    JobQueue::open(cfg.queue_path()).context("Failed to open job queue")
}

fn open_creations() -> Result<CreationStore> {
    Ok(CreationStore::new(config::config()?.creations_path()))
}

fn open_posting() -> Result<PostingStore> {
    Ok(PostingStore::new(config::config()?.posting_path()))
}

async fn execute_queue(command: QueueCommands) -> Result<()> {
    let queue = open_queue()?;

    match command {
        QueueCommands::Add { item_id } => {
            let position = queue.enqueue(&item_id).await?;
            println!("queued '{}' at position {}", item_id, position);
        }
        QueueCommands::Claim => match queue.claim_next().await? {
            Some(entry) => {
                println!("claimed '{}' (queued {})", entry.item_id, entry.queued_at);
            }
            None => println!("nothing pending"),
        },
        QueueCommands::Complete { item_id } => {
            queue.complete(&item_id).await?;
            println!("completed '{}'", item_id);
        }
        QueueCommands::Fail { item_id, reason } => {
            queue.fail(&item_id, &reason).await?;
            println!("failed '{}': {}", item_id, reason);
        }
        QueueCommands::Remove { item_id } => {
            if queue.remove(&item_id).await? {
                println!("removed '{}'", item_id);
            } else {
                println!("'{}' was not queued", item_id);
            }
        }
        QueueCommands::Status => {
            let status = queue.status().await?;
            println!(
                "pending: {}  processing: {}  failed: {}",
                status.pending, status.processing, status.failed
            );
            if let Some(entry) = status.in_flight {
                let started = entry
                    .processing_started_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("in flight: '{}' since {}", entry.item_id, started);
            }
            for entry in queue.entries().await? {
                if let Some(reason) = &entry.failure_reason {
                    println!("failed '{}': {}", entry.item_id, reason);
                }
            }
        }
    }

    Ok(())
}

async fn execute_review(command: ReviewCommands) -> Result<()> {
    let store = open_creations()?;

    match command {
        ReviewCommands::List { status } => {
            let filter: Option<ReviewStatus> = status.map(Into::into);
            let mut shown = 0;
            for record in store.load().await? {
                if let Some(wanted) = filter {
                    if record.review != wanted {
                        continue;
                    }
                }
                println!(
                    "{}  [{}]  {}  ({})",
                    record.id, record.review, record.subject, record.created_at
                );
                shown += 1;
            }
            if shown == 0 {
                println!("no creations");
            }
        }
        ReviewCommands::Approve { id } => {
            store.update_status(&id, ReviewStatus::Approved).await?;
            println!("approved {}", id);
        }
        ReviewCommands::Reject { id } => {
            store.update_status(&id, ReviewStatus::Rejected).await?;
            println!("rejected {}", id);
        }
    }

    Ok(())
}

async fn execute_posting(command: PostingCommands) -> Result<()> {
    match command {
        PostingCommands::Preview => {
            let cfg = config::config()?;
            let scheduler = PostingScheduler::new(
                Arc::new(open_creations()?),
                Arc::new(open_posting()?),
                Vec::new(),
                cfg.posting.clone(),
            );

            let eligible = scheduler.preview().await?;
            if eligible.is_empty() {
                println!("nothing eligible");
            }
            for (creation_id, platform) in eligible {
                println!("{}  ->  {}", creation_id, platform);
            }
        }
        PostingCommands::Mark {
            creation_id,
            platform,
            post_id,
        } => {
            open_posting()?
                .record_post(&creation_id, &platform, &post_id, Utc::now())
                .await?;
            println!("marked {} as posted to {} ({})", creation_id, platform, post_id);
        }
    }

    Ok(())
}

async fn execute_status() -> Result<()> {
    let cfg = config::config()?;

    let queue_status = open_queue()?.status().await?;
    println!(
        "queue     pending: {}  processing: {}  failed: {}",
        queue_status.pending, queue_status.processing, queue_status.failed
    );

    let creations = open_creations()?.load().await?;
    let pending = creations
        .iter()
        .filter(|r| r.review == ReviewStatus::PendingReview)
        .count();
    let approved = creations
        .iter()
        .filter(|r| r.review == ReviewStatus::Approved)
        .count();
    let rejected = creations
        .iter()
        .filter(|r| r.review == ReviewStatus::Rejected)
        .count();
    println!(
        "index     pending: {}  approved: {}  rejected: {}",
        pending, approved, rejected
    );

    let posting = open_posting()?.load().await?;
    let posts: usize = posting.iter().map(|r| r.platforms.len()).sum();
    println!("posting   records: {}  posts: {}", posting.len(), posts);

    let pool = VendorPool::new(cfg.vendors.clone());
    for stats in pool.stats() {
        println!(
            "vendor    {:<8} capacity: {}",
            stats.vendor.as_str(),
            stats.capacity
        );
    }

    Ok(())
}
