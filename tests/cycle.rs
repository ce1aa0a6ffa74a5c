//! Generation Cycle Integration Tests
//!
//! Per-proposal failure isolation, budget denial handling, and hard
//! aborts when proposal generation itself fails.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use reelcast::adapters::{
    AudioGenerator, FinalCut, GeneratedAudio, GeneratedClip, GeneratedImage, ImageGenerator,
    Muxer, ProposalSource, Review, SafetyReviewer, StyleReviewer, VideoGenerator,
};
use reelcast::config::CostTable;
use reelcast::{
    BudgetGovernor, CreationStore, CycleOrchestrator, GenClients, Proposal, ReviewStatus,
    VendorCapacities, VendorPool,
};

struct StubProposals;

#[async_trait]
impl ProposalSource for StubProposals {
    async fn propose(&self, count: usize) -> Result<Vec<Proposal>> {
        Ok((1..=count)
            .map(|i| {
                Proposal::new(
                    format!("p{i}"),
                    i as u64,
                    format!("subject {i}"),
                    "analog film",
                    format!("caption {i}"),
                )
            })
            .collect())
    }
}

struct FailingProposals;

#[async_trait]
impl ProposalSource for FailingProposals {
    async fn propose(&self, _count: usize) -> Result<Vec<Proposal>> {
        bail!("prompt vendor is down")
    }
}

struct StubImage {
    fail_for: Vec<String>,
}

#[async_trait]
impl ImageGenerator for StubImage {
    async fn generate_image(&self, proposal: &Proposal) -> Result<GeneratedImage> {
        if self.fail_for.contains(&proposal.id) {
            bail!("image vendor rejected request");
        }
        Ok(GeneratedImage {
            path: PathBuf::from(format!("/assets/{}.png", proposal.id)),
        })
    }
}

struct StubVideo;

#[async_trait]
impl VideoGenerator for StubVideo {
    async fn image_to_video(
        &self,
        proposal: &Proposal,
        _image: &GeneratedImage,
    ) -> Result<GeneratedClip> {
        Ok(GeneratedClip {
            path: PathBuf::from(format!("/assets/{}.mp4", proposal.id)),
            duration_secs: 8.0,
        })
    }
}

struct StubAudio;

#[async_trait]
impl AudioGenerator for StubAudio {
    async fn generate_audio(&self, proposal: &Proposal) -> Result<GeneratedAudio> {
        Ok(GeneratedAudio {
            path: PathBuf::from(format!("/assets/{}.m4a", proposal.id)),
        })
    }
}

struct StubMuxer;

#[async_trait]
impl Muxer for StubMuxer {
    async fn mux(&self, clip: &GeneratedClip, _audio: &GeneratedAudio) -> Result<FinalCut> {
        Ok(FinalCut {
            path: clip.path.with_extension("final.mp4"),
            duration_secs: clip.duration_secs,
        })
    }
}

struct Approving;

#[async_trait]
impl StyleReviewer for Approving {
    async fn validate_style(&self, _proposal: &Proposal, _cut: &FinalCut) -> Result<Review> {
        Ok(Review::pass())
    }
}

#[async_trait]
impl SafetyReviewer for Approving {
    async fn validate_safety(&self, _proposal: &Proposal, _cut: &FinalCut) -> Result<Review> {
        Ok(Review::pass())
    }
}

struct RejectingStyle {
    reject: Vec<String>,
}

#[async_trait]
impl StyleReviewer for RejectingStyle {
    async fn validate_style(&self, proposal: &Proposal, _cut: &FinalCut) -> Result<Review> {
        if self.reject.contains(&proposal.id) {
            Ok(Review::reject("off-style"))
        } else {
            Ok(Review::pass())
        }
    }
}

fn clients(
    proposals: Arc<dyn ProposalSource>,
    image: Arc<dyn ImageGenerator>,
    style: Arc<dyn StyleReviewer>,
) -> GenClients {
    GenClients {
        proposals,
        image,
        video: Arc::new(StubVideo),
        audio: Arc::new(StubAudio),
        muxer: Arc::new(StubMuxer),
        style,
        safety: Arc::new(Approving),
    }
}

fn free_costs() -> CostTable {
    CostTable {
        proposal_batch: 0.0,
        image: 0.0,
        video: 0.0,
        audio: 0.0,
        review: 0.0,
    }
}

fn orchestrator(
    budget: Arc<BudgetGovernor>,
    clients: GenClients,
    index: Arc<CreationStore>,
    costs: CostTable,
    auto_approve: bool,
) -> CycleOrchestrator {
    let pool = Arc::new(VendorPool::new(VendorCapacities::default()));
    CycleOrchestrator::new(budget, pool, clients, index, costs, auto_approve)
}

#[tokio::test]
async fn test_failed_stage_aborts_only_that_proposal() {
    let temp = TempDir::new().unwrap();
    let index = Arc::new(CreationStore::new(temp.path().join("creations.json")));
    let budget = Arc::new(BudgetGovernor::new(10.0));

    let clients = clients(
        Arc::new(StubProposals),
        Arc::new(StubImage {
            fail_for: vec!["p2".to_string()],
        }),
        Arc::new(Approving),
    );
    let orchestrator = orchestrator(budget, clients, index.clone(), free_costs(), false);

    let records = orchestrator.run_cycle(3).await.unwrap();

    assert_eq!(records.len(), 2);
    let ids: Vec<_> = records.iter().map(|r| r.proposal_id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p3"]);

    // Only surviving proposals reached the index
    assert_eq!(index.load().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_proposal_generation_failure_aborts_cycle() {
    let temp = TempDir::new().unwrap();
    let index = Arc::new(CreationStore::new(temp.path().join("creations.json")));
    let budget = Arc::new(BudgetGovernor::new(10.0));

    let clients = clients(
        Arc::new(FailingProposals),
        Arc::new(StubImage { fail_for: vec![] }),
        Arc::new(Approving),
    );
    let orchestrator = orchestrator(budget, clients, index.clone(), free_costs(), false);

    assert!(orchestrator.run_cycle(3).await.is_err());
    assert!(index.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_budget_denial_drops_proposal_but_cycle_continues() {
    let temp = TempDir::new().unwrap();
    let index = Arc::new(CreationStore::new(temp.path().join("creations.json")));
    let budget = Arc::new(BudgetGovernor::new(1.0));

    let costs = CostTable {
        image: 0.6,
        ..free_costs()
    };
    let clients = clients(
        Arc::new(StubProposals),
        Arc::new(StubImage { fail_for: vec![] }),
        Arc::new(Approving),
    );
    let orchestrator = orchestrator(budget.clone(), clients, index.clone(), costs, false);

    // Only the first proposal fits in the budget; the denial is isolated
    let records = orchestrator.run_cycle(3).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].proposal_id, "p1");
    assert_eq!(budget.current_cost(), 0.6);
}

#[tokio::test]
async fn test_budget_resets_between_cycles() {
    let temp = TempDir::new().unwrap();
    let index = Arc::new(CreationStore::new(temp.path().join("creations.json")));
    let budget = Arc::new(BudgetGovernor::new(1.0));

    let costs = CostTable {
        image: 0.6,
        ..free_costs()
    };
    let clients = clients(
        Arc::new(StubProposals),
        Arc::new(StubImage { fail_for: vec![] }),
        Arc::new(Approving),
    );
    let orchestrator = orchestrator(budget.clone(), clients, index, costs, false);

    assert_eq!(orchestrator.run_cycle(1).await.unwrap().len(), 1);
    // Without the per-cycle reset the second cycle would be denied
    assert_eq!(orchestrator.run_cycle(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_review_rejection_is_not_indexed() {
    let temp = TempDir::new().unwrap();
    let index = Arc::new(CreationStore::new(temp.path().join("creations.json")));
    let budget = Arc::new(BudgetGovernor::new(10.0));

    let clients = clients(
        Arc::new(StubProposals),
        Arc::new(StubImage { fail_for: vec![] }),
        Arc::new(RejectingStyle {
            reject: vec!["p1".to_string()],
        }),
    );
    let orchestrator = orchestrator(budget, clients, index.clone(), free_costs(), false);

    let records = orchestrator.run_cycle(2).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].proposal_id, "p2");
    assert_eq!(index.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_auto_approve_controls_review_status() {
    let temp = TempDir::new().unwrap();
    let budget = Arc::new(BudgetGovernor::new(10.0));

    let index = Arc::new(CreationStore::new(temp.path().join("manual.json")));
    let manual = orchestrator(
        budget.clone(),
        clients(
            Arc::new(StubProposals),
            Arc::new(StubImage { fail_for: vec![] }),
            Arc::new(Approving),
        ),
        index,
        free_costs(),
        false,
    );
    let records = manual.run_cycle(1).await.unwrap();
    assert_eq!(records[0].review, ReviewStatus::PendingReview);

    let index = Arc::new(CreationStore::new(temp.path().join("auto.json")));
    let auto = orchestrator(
        budget,
        clients(
            Arc::new(StubProposals),
            Arc::new(StubImage { fail_for: vec![] }),
            Arc::new(Approving),
        ),
        index,
        free_costs(),
        true,
    );
    let records = auto.run_cycle(1).await.unwrap();
    assert_eq!(records[0].review, ReviewStatus::Approved);
}
