//! Vendor client seams for generation and distribution.
//!
//! Each external AI service is consumed through one narrow trait with a
//! single blocking call, treated by the orchestrator as opaque and
//! possibly failing. Wire formats and request shaping live behind these
//! traits, outside the orchestration core.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{CreationRecord, Proposal};

/// A generated still image on local disk
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub path: PathBuf,
}

/// A generated video clip on local disk
#[derive(Debug, Clone)]
pub struct GeneratedClip {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// A generated audio track on local disk
#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    pub path: PathBuf,
}

/// The final muxed cut ready for QA and distribution
#[derive(Debug, Clone)]
pub struct FinalCut {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Verdict from a QA reviewer
#[derive(Debug, Clone)]
pub struct Review {
    pub approved: bool,
    pub notes: String,
}

impl Review {
    /// A passing review
    pub fn pass() -> Self {
        Self {
            approved: true,
            notes: String::new(),
        }
    }

    /// A rejection with reviewer notes
    pub fn reject(notes: impl Into<String>) -> Self {
        Self {
            approved: false,
            notes: notes.into(),
        }
    }
}

/// Upstream proposal generator
#[async_trait]
pub trait ProposalSource: Send + Sync {
    async fn propose(&self, count: usize) -> Result<Vec<Proposal>>;
}

/// Still image generation vendor
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, proposal: &Proposal) -> Result<GeneratedImage>;
}

/// Image-to-video generation vendor
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn image_to_video(
        &self,
        proposal: &Proposal,
        image: &GeneratedImage,
    ) -> Result<GeneratedClip>;
}

/// Audio generation vendor
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    async fn generate_audio(&self, proposal: &Proposal) -> Result<GeneratedAudio>;
}

/// Local edit/mux step combining clip and audio into the final cut
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(&self, clip: &GeneratedClip, audio: &GeneratedAudio) -> Result<FinalCut>;
}

/// Style QA reviewer
#[async_trait]
pub trait StyleReviewer: Send + Sync {
    async fn validate_style(&self, proposal: &Proposal, cut: &FinalCut) -> Result<Review>;
}

/// Safety QA reviewer
#[async_trait]
pub trait SafetyReviewer: Send + Sync {
    async fn validate_safety(&self, proposal: &Proposal, cut: &FinalCut) -> Result<Review>;
}

/// One social platform's publishing client. Returns the platform post id.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Platform name this publisher posts to (e.g. "instagram")
    fn platform(&self) -> &str;

    async fn publish(&self, record: &CreationRecord) -> Result<String>;
}
