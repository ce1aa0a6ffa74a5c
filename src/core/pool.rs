//! Per-vendor concurrency admission control.
//!
//! One counting semaphore per external vendor, sized to that vendor's
//! concurrency ceiling. Callers block until a slot frees up, which gives
//! natural backpressure instead of overload errors, and the RAII permit
//! releases the slot on every exit path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// External vendors with metered, rate-limited APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// LLM prompting (proposals, QA reviews)
    Prompt,

    /// Still image generation
    Image,

    /// Image-to-video generation
    Video,

    /// Audio generation
    Audio,
}

impl Vendor {
    pub const ALL: [Vendor; 4] = [Vendor::Prompt, Vendor::Image, Vendor::Video, Vendor::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Prompt => "prompt",
            Vendor::Image => "image",
            Vendor::Video => "video",
            Vendor::Audio => "audio",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot counts per vendor, matching each vendor's external ceiling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorCapacities {
    #[serde(default = "default_prompt_slots")]
    pub prompt: usize,

    #[serde(default = "default_image_slots")]
    pub image: usize,

    #[serde(default = "default_video_slots")]
    pub video: usize,

    #[serde(default = "default_audio_slots")]
    pub audio: usize,
}

fn default_prompt_slots() -> usize {
    3
}
fn default_image_slots() -> usize {
    2
}
fn default_video_slots() -> usize {
    1
}
fn default_audio_slots() -> usize {
    2
}

impl Default for VendorCapacities {
    fn default() -> Self {
        Self {
            prompt: default_prompt_slots(),
            image: default_image_slots(),
            video: default_video_slots(),
            audio: default_audio_slots(),
        }
    }
}

impl VendorCapacities {
    fn capacity(&self, vendor: Vendor) -> usize {
        match vendor {
            Vendor::Prompt => self.prompt,
            Vendor::Image => self.image,
            Vendor::Video => self.video,
            Vendor::Audio => self.audio,
        }
    }
}

/// Point-in-time snapshot of one vendor's slot usage
#[derive(Debug, Clone, Serialize)]
pub struct VendorStats {
    pub vendor: Vendor,
    pub capacity: usize,
    pub available: usize,
    pub in_use: usize,
}

struct Gate {
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

/// Fixed-capacity admission gates, one per vendor
pub struct VendorPool {
    gates: BTreeMap<Vendor, Gate>,
}

impl VendorPool {
    /// Build a pool with the given per-vendor capacities
    pub fn new(capacities: VendorCapacities) -> Self {
        let gates = Vendor::ALL
            .into_iter()
            .map(|vendor| {
                let capacity = capacities.capacity(vendor);
                let gate = Gate {
                    capacity,
                    semaphore: Arc::new(Semaphore::new(capacity)),
                };
                (vendor, gate)
            })
            .collect();

        Self { gates }
    }

    /// Block until a slot for the vendor is free. The returned permit
    /// releases the slot when dropped.
    pub async fn acquire(&self, vendor: Vendor) -> Result<OwnedSemaphorePermit> {
        let gate = self
            .gates
            .get(&vendor)
            .with_context(|| format!("no admission gate for vendor '{vendor}'"))?;

        debug!(%vendor, available = gate.semaphore.available_permits(), "waiting for vendor slot");
        let permit = gate
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .with_context(|| format!("admission gate for vendor '{vendor}' closed"))?;

        Ok(permit)
    }

    /// Per-vendor slot usage snapshot
    pub fn stats(&self) -> Vec<VendorStats> {
        self.gates
            .iter()
            .map(|(vendor, gate)| {
                let available = gate.semaphore.available_permits();
                VendorStats {
                    vendor: *vendor,
                    capacity: gate.capacity,
                    available,
                    in_use: gate.capacity - available,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn single_slot_pool() -> VendorPool {
        VendorPool::new(VendorCapacities {
            prompt: 1,
            image: 1,
            video: 1,
            audio: 1,
        })
    }

    #[tokio::test]
    async fn test_stats_track_held_permits() {
        let pool = VendorPool::new(VendorCapacities::default());

        let permit = pool.acquire(Vendor::Image).await.unwrap();

        let stats = pool.stats();
        let image = stats.iter().find(|s| s.vendor == Vendor::Image).unwrap();
        assert_eq!(image.capacity, 2);
        assert_eq!(image.in_use, 1);
        assert_eq!(image.available, 1);

        drop(permit);
        let stats = pool.stats();
        let image = stats.iter().find(|s| s.vendor == Vendor::Image).unwrap();
        assert_eq!(image.in_use, 0);
    }

    #[tokio::test]
    async fn test_acquire_blocks_at_capacity() {
        let pool = single_slot_pool();

        let held = pool.acquire(Vendor::Video).await.unwrap();

        // Second acquire must block while the slot is held
        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire(Vendor::Video)).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired =
            tokio::time::timeout(Duration::from_millis(50), pool.acquire(Vendor::Video)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_vendors_do_not_contend() {
        let pool = single_slot_pool();

        let _video = pool.acquire(Vendor::Video).await.unwrap();
        let audio =
            tokio::time::timeout(Duration::from_millis(50), pool.acquire(Vendor::Audio)).await;
        assert!(audio.is_ok());
    }
}
