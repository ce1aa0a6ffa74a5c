//! Creative proposals awaiting generation.

use serde::{Deserialize, Serialize};

/// One creative content specification produced by the upstream proposal
/// generator. Proposals are ephemeral work items; nothing is persisted for a
/// proposal until it reaches the index stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique identifier assigned by the proposal generator
    pub id: String,

    /// Deterministic seed forwarded to the generation vendors
    pub seed: u64,

    /// What the content is about
    pub subject: String,

    /// Visual style directive
    pub style: String,

    /// Caption used at publish time
    pub caption: String,
}

impl Proposal {
    /// Create a proposal with the given identity and prompt fields
    pub fn new(
        id: impl Into<String>,
        seed: u64,
        subject: impl Into<String>,
        style: impl Into<String>,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            seed,
            subject: subject.into(),
            style: style.into(),
            caption: caption.into(),
        }
    }
}
