//! Idempotent, delay-aware multi-platform posting scheduler.
//!
//! Each run loads the approved creations and posts whatever has become
//! eligible: platforms are walked in configured priority order, platforms
//! already present in the posting record are skipped, and a platform whose
//! minimum delay since the latest prior post has not elapsed is simply
//! reconsidered on a later run. Repeated invocation at any frequency,
//! across restarts, converges to "every approved creation posted once per
//! configured platform".

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::Publisher;
use crate::domain::{PlatformPost, PostingRecord, PostingSummary};
use crate::storage::{CreationStore, PostingStore};

/// Daily posting window in UTC hours.
///
/// `start == end` means always open; `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PostingWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl PostingWindow {
    /// A window that never closes
    pub fn all_day() -> Self {
        Self {
            start_hour: 0,
            end_hour: 0,
        }
    }

    /// Whether the given instant falls inside the window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if self.start_hour == self.end_hour {
            return true;
        }

        let hour = at.hour();
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl Default for PostingWindow {
    fn default() -> Self {
        Self::all_day()
    }
}

/// One platform's place in the posting order, with its minimum delay
/// since the latest post on any other platform for the same creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRule {
    pub name: String,

    #[serde(default)]
    pub min_delay_minutes: i64,
}

/// Scheduler configuration: window, platform priority order, cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingConfig {
    #[serde(default)]
    pub window: PostingWindow,

    pub platforms: Vec<PlatformRule>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    900
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            window: PostingWindow::all_day(),
            platforms: vec![
                PlatformRule {
                    name: "instagram".to_string(),
                    min_delay_minutes: 0,
                },
                PlatformRule {
                    name: "tiktok".to_string(),
                    min_delay_minutes: 90,
                },
            ],
            interval_secs: default_interval_secs(),
        }
    }
}

/// Periodic, idempotent, resumable publisher of approved creations
pub struct PostingScheduler {
    creations: Arc<CreationStore>,
    posting: Arc<PostingStore>,
    publishers: Vec<Arc<dyn Publisher>>,
    config: PostingConfig,

    // Coalesces overlapping runs: a run that finds the gate held is skipped.
    run_gate: Mutex<()>,
}

impl PostingScheduler {
    pub fn new(
        creations: Arc<CreationStore>,
        posting: Arc<PostingStore>,
        publishers: Vec<Arc<dyn Publisher>>,
        config: PostingConfig,
    ) -> Self {
        Self {
            creations,
            posting,
            publishers,
            config,
            run_gate: Mutex::new(()),
        }
    }

    /// Run posting cycles on the configured interval until the task is
    /// dropped. A failing run is logged and the timer keeps going.
    pub async fn run_periodic(&self) {
        let interval = StdDuration::from_secs(self.config.interval_secs);
        info!(interval_secs = self.config.interval_secs, "posting scheduler started");

        loop {
            tokio::time::sleep(interval).await;

            match self.run_posting_cycle().await {
                Ok(summary) if summary.posted > 0 => {
                    info!(posted = summary.posted, platforms = ?summary.platforms, "posting cycle done");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "posting cycle failed");
                }
            }
        }
    }

    /// One posting pass. Describes only what this run did, never
    /// cumulative totals, and never fails just because nothing was
    /// eligible.
    #[instrument(skip(self))]
    pub async fn run_posting_cycle(&self) -> Result<PostingSummary> {
        let _gate = match self.run_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                info!("previous posting run still in progress, skipping");
                return Ok(PostingSummary::coalesced());
            }
        };

        let now = Utc::now();
        let mut summary = PostingSummary::empty();

        if !self.config.window.contains(now) {
            debug!("outside posting window");
            return Ok(summary);
        }

        let approved = self.creations.approved().await?;
        for record in approved {
            let mut posted = self
                .posting
                .get(&record.id)
                .await?
                .unwrap_or_else(|| PostingRecord::new(&record.id));

            for rule in &self.config.platforms {
                if posted.platforms.contains_key(&rule.name) {
                    continue;
                }
                if !delay_elapsed(rule, &posted, now) {
                    debug!(creation = %record.id, platform = %rule.name, "delay not yet elapsed");
                    continue;
                }
                let Some(publisher) = self.publisher_for(&rule.name) else {
                    debug!(platform = %rule.name, "no publisher configured");
                    continue;
                };

                match publisher.publish(&record).await {
                    Ok(post_id) => {
                        self.posting
                            .record_post(&record.id, &rule.name, &post_id, now)
                            .await?;
                        // Keep the in-memory view current so later platforms
                        // in this same run see this post's timestamp.
                        posted.platforms.insert(
                            rule.name.clone(),
                            PlatformPost {
                                post_id: post_id.clone(),
                                posted_at: now,
                            },
                        );
                        summary.posted += 1;
                        summary.platforms.push(rule.name.clone());
                        info!(creation = %record.id, platform = %rule.name, %post_id, "posted");
                    }
                    Err(e) => {
                        // No record is written on failure, so the platform is
                        // retried on a later cycle.
                        warn!(creation = %record.id, platform = %rule.name, error = %e, "platform post failed");
                    }
                }
            }
        }

        Ok(summary)
    }

    /// The (creation, platform) pairs that would be attempted right now.
    /// Read-only; does not simulate intra-run posts.
    pub async fn preview(&self) -> Result<Vec<(String, String)>> {
        let now = Utc::now();
        let mut eligible = Vec::new();

        if !self.config.window.contains(now) {
            return Ok(eligible);
        }

        for record in self.creations.approved().await? {
            let posted = self
                .posting
                .get(&record.id)
                .await?
                .unwrap_or_else(|| PostingRecord::new(&record.id));

            for rule in &self.config.platforms {
                if posted.platforms.contains_key(&rule.name) {
                    continue;
                }
                if delay_elapsed(rule, &posted, now) {
                    eligible.push((record.id.clone(), rule.name.clone()));
                }
            }
        }

        Ok(eligible)
    }

    fn publisher_for(&self, platform: &str) -> Option<&Arc<dyn Publisher>> {
        self.publishers.iter().find(|p| p.platform() == platform)
    }
}

/// A platform's minimum delay is measured from the latest post already
/// made for this creation on any platform; with no prior posts there is
/// nothing to wait for.
fn delay_elapsed(rule: &PlatformRule, posted: &PostingRecord, now: DateTime<Utc>) -> bool {
    if rule.min_delay_minutes <= 0 {
        return true;
    }

    match posted.latest_post_at() {
        None => true,
        Some(latest) => now >= latest + Duration::minutes(rule.min_delay_minutes),
    }
}
