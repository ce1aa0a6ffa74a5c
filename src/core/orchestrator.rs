//! Generation cycle orchestration.
//!
//! Drives each proposal strictly sequentially through
//! image → video → edit → style QA → safety QA → index, with every paid
//! vendor call admitted by the budget ledger and the vendor pool first.
//! A failure at any stage aborts only that proposal; the cycle carries on
//! with the next one.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{
    AudioGenerator, ImageGenerator, Muxer, ProposalSource, SafetyReviewer, StyleReviewer,
    VideoGenerator,
};
use crate::config::CostTable;
use crate::core::budget::{BudgetError, BudgetGovernor};
use crate::core::pool::{Vendor, VendorPool};
use crate::domain::{CreationRecord, Proposal, ReviewStatus};
use crate::storage::CreationStore;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Propose,
    Image,
    Video,
    Edit,
    StyleReview,
    SafetyReview,
    Index,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Propose => "propose",
            Stage::Image => "image",
            Stage::Video => "video",
            Stage::Edit => "edit",
            Stage::StyleReview => "style_review",
            Stage::SafetyReview => "safety_review",
            Stage::Index => "index",
        };
        f.write_str(s)
    }
}

/// Tagged outcome of one proposal's trip through the pipeline. Callers
/// pattern-match on the variant instead of inspecting error strings.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} denied by budget: {source}")]
    BudgetDenied {
        stage: Stage,
        #[source]
        source: BudgetError,
    },

    #[error("{stage} rejected the candidate: {notes}")]
    Rejected { stage: Stage, notes: String },

    #[error("{stage} failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

/// The set of vendor clients the pipeline runs against
pub struct GenClients {
    pub proposals: Arc<dyn ProposalSource>,
    pub image: Arc<dyn ImageGenerator>,
    pub video: Arc<dyn VideoGenerator>,
    pub audio: Arc<dyn AudioGenerator>,
    pub muxer: Arc<dyn Muxer>,
    pub style: Arc<dyn StyleReviewer>,
    pub safety: Arc<dyn SafetyReviewer>,
}

/// Runs generation cycles against injected services
pub struct CycleOrchestrator {
    budget: Arc<BudgetGovernor>,
    pool: Arc<VendorPool>,
    clients: GenClients,
    index: Arc<CreationStore>,
    costs: CostTable,
    auto_approve: bool,
}

impl CycleOrchestrator {
    pub fn new(
        budget: Arc<BudgetGovernor>,
        pool: Arc<VendorPool>,
        clients: GenClients,
        index: Arc<CreationStore>,
        costs: CostTable,
        auto_approve: bool,
    ) -> Self {
        Self {
            budget,
            pool,
            clients,
            index,
            costs,
            auto_approve,
        }
    }

    /// Run one generation cycle for `count` proposals.
    ///
    /// Returns the records that reached the index stage; the implicit
    /// failure count is `count - len(result)`. A hard failure of proposal
    /// generation itself aborts the whole cycle.
    #[instrument(skip(self), fields(requested = count))]
    pub async fn run_cycle(&self, count: usize) -> Result<Vec<CreationRecord>> {
        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, "starting generation cycle");

        self.budget.reset_cycle();

        let proposals = self.propose(count).await?;

        let mut records = Vec::new();
        for proposal in &proposals {
            match self.process_proposal(cycle_id, proposal).await {
                Ok(record) => records.push(record),
                Err(PipelineError::BudgetDenied { stage, source }) => {
                    warn!(proposal = %proposal.id, %stage, %source, "proposal dropped, budget denied");
                }
                Err(PipelineError::Rejected { stage, notes }) => {
                    warn!(proposal = %proposal.id, %stage, %notes, "proposal rejected by review");
                }
                Err(e @ PipelineError::StageFailed { .. }) => {
                    error!(proposal = %proposal.id, error = %e, "proposal aborted");
                }
            }
        }

        info!(
            %cycle_id,
            produced = records.len(),
            requested = count,
            spent_usd = self.budget.current_cost(),
            "generation cycle finished"
        );
        Ok(records)
    }

    /// Request proposals from the upstream generator. This is the one step
    /// whose failure aborts the whole cycle: with no proposals there is
    /// nothing to iterate.
    async fn propose(&self, count: usize) -> Result<Vec<Proposal>> {
        self.budget
            .add_cost(self.costs.proposal_batch, "propose")
            .context("proposal batch denied by budget")?;

        let _permit = self.pool.acquire(Vendor::Prompt).await?;
        self.clients
            .proposals
            .propose(count)
            .await
            .context("proposal generation failed")
    }

    async fn process_proposal(
        &self,
        cycle_id: Uuid,
        proposal: &Proposal,
    ) -> Result<CreationRecord, PipelineError> {
        let image = self
            .metered(
                Stage::Image,
                Vendor::Image,
                self.costs.image,
                &format!("image:{}", proposal.id),
                self.clients.image.generate_image(proposal),
            )
            .await?;

        let clip = self
            .metered(
                Stage::Video,
                Vendor::Video,
                self.costs.video,
                &format!("video:{}", proposal.id),
                self.clients.video.image_to_video(proposal, &image),
            )
            .await?;

        let audio = self
            .metered(
                Stage::Edit,
                Vendor::Audio,
                self.costs.audio,
                &format!("audio:{}", proposal.id),
                self.clients.audio.generate_audio(proposal),
            )
            .await?;

        // Muxing is local and deterministic, no admission needed
        let cut = self
            .clients
            .muxer
            .mux(&clip, &audio)
            .await
            .map_err(|source| PipelineError::StageFailed {
                stage: Stage::Edit,
                source,
            })?;

        let style = self
            .metered(
                Stage::StyleReview,
                Vendor::Prompt,
                self.costs.review,
                &format!("style:{}", proposal.id),
                self.clients.style.validate_style(proposal, &cut),
            )
            .await?;
        if !style.approved {
            return Err(PipelineError::Rejected {
                stage: Stage::StyleReview,
                notes: style.notes,
            });
        }

        let safety = self
            .metered(
                Stage::SafetyReview,
                Vendor::Prompt,
                self.costs.review,
                &format!("safety:{}", proposal.id),
                self.clients.safety.validate_safety(proposal, &cut),
            )
            .await?;
        if !safety.approved {
            return Err(PipelineError::Rejected {
                stage: Stage::SafetyReview,
                notes: safety.notes,
            });
        }

        let record = CreationRecord {
            id: Uuid::new_v4().to_string(),
            cycle_id,
            proposal_id: proposal.id.clone(),
            seed: proposal.seed,
            subject: proposal.subject.clone(),
            style: proposal.style.clone(),
            caption: proposal.caption.clone(),
            image_path: image.path,
            video_path: clip.path,
            final_path: cut.path,
            duration_secs: cut.duration_secs,
            created_at: Utc::now(),
            review: if self.auto_approve {
                ReviewStatus::Approved
            } else {
                ReviewStatus::PendingReview
            },
        };

        self.index
            .append(record.clone())
            .await
            .map_err(|source| PipelineError::StageFailed {
                stage: Stage::Index,
                source: source.into(),
            })?;

        info!(proposal = %proposal.id, record = %record.id, "proposal indexed");
        Ok(record)
    }

    /// Budget admission, then a vendor slot, then the call itself. The
    /// slot is released as soon as the call returns.
    async fn metered<T, F>(
        &self,
        stage: Stage,
        vendor: Vendor,
        cost: f64,
        label: &str,
        op: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T>>,
    {
        self.budget
            .add_cost(cost, label)
            .map_err(|source| PipelineError::BudgetDenied { stage, source })?;

        let _permit = self
            .pool
            .acquire(vendor)
            .await
            .map_err(|source| PipelineError::StageFailed { stage, source })?;

        op.await
            .map_err(|source| PipelineError::StageFailed { stage, source })
    }
}
