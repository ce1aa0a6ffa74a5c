//! Configuration for reelcast paths and orchestration settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (REELCAST_HOME)
//! 2. Config file (.reelcast/config.yaml)
//! 3. Defaults (~/.reelcast)
//!
//! Config file discovery searches the current directory and its parents
//! for .reelcast/config.yaml.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::pool::VendorCapacities;
use crate::posting::scheduler::PostingConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub vendors: Option<VendorCapacities>,
    #[serde(default)]
    pub costs: Option<CostTable>,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub posting: Option<PostingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to the .reelcast directory)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    /// Maximum metered spend per generation cycle in USD
    #[serde(default = "default_max_usd_per_cycle")]
    pub max_usd_per_cycle: f64,
}

fn default_max_usd_per_cycle() -> f64 {
    5.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_usd_per_cycle: default_max_usd_per_cycle(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewConfig {
    /// Index creations as approved without a human pass
    #[serde(default)]
    pub auto_approve: bool,
}

/// Estimated per-call USD costs used for pre-flight budget admission
#[derive(Debug, Clone, Deserialize)]
pub struct CostTable {
    #[serde(default = "default_proposal_batch_cost")]
    pub proposal_batch: f64,

    #[serde(default = "default_image_cost")]
    pub image: f64,

    #[serde(default = "default_video_cost")]
    pub video: f64,

    #[serde(default = "default_audio_cost")]
    pub audio: f64,

    #[serde(default = "default_review_cost")]
    pub review: f64,
}

fn default_proposal_batch_cost() -> f64 {
    0.02
}
fn default_image_cost() -> f64 {
    0.08
}
fn default_video_cost() -> f64 {
    0.50
}
fn default_audio_cost() -> f64 {
    0.05
}
fn default_review_cost() -> f64 {
    0.01
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            proposal_batch: default_proposal_batch_cost(),
            image: default_image_cost(),
            video: default_video_cost(),
            audio: default_audio_cost(),
            review: default_review_cost(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to reelcast home (durable state)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub budget: BudgetConfig,
    pub vendors: VendorCapacities,
    pub costs: CostTable,
    pub auto_approve: bool,
    pub posting: PostingConfig,
}

impl ResolvedConfig {
    /// Durable job queue file
    pub fn queue_path(&self) -> PathBuf {
        self.home.join("queue.json")
    }

    /// Creations index file
    pub fn creations_path(&self) -> PathBuf {
        self.home.join("creations.json")
    }

    /// Posting records file
    pub fn posting_path(&self) -> PathBuf {
        self.home.join("posting.json")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".reelcast").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".reelcast");

    let config_file = find_config_file();

    let parsed = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    let home = if let Ok(env_home) = std::env::var("REELCAST_HOME") {
        PathBuf::from(env_home)
    } else if let Some(home_path) = parsed.as_ref().and_then(|c| c.paths.home.as_ref()) {
        let base = config_file
            .as_ref()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));
        resolve_path(base, home_path)
    } else {
        default_home
    };

    let (budget, vendors, costs, auto_approve, posting) = match parsed {
        Some(config) => (
            config.budget,
            config.vendors.unwrap_or_default(),
            config.costs.unwrap_or_default(),
            config.review.auto_approve,
            config.posting.unwrap_or_default(),
        ),
        None => (
            BudgetConfig::default(),
            VendorCapacities::default(),
            CostTable::default(),
            false,
            PostingConfig::default(),
        ),
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        budget,
        vendors,
        costs,
        auto_approve,
        posting,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let reelcast_dir = temp.path().join(".reelcast");
        std::fs::create_dir_all(&reelcast_dir).unwrap();

        let config_path = reelcast_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./state
budget:
  max_usd_per_cycle: 12.5
vendors:
  video: 2
costs:
  video: 0.35
posting:
  window:
    start_hour: 9
    end_hour: 21
  platforms:
    - name: instagram
    - name: tiktok
      min_delay_minutes: 90
  interval_secs: 600
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.budget.max_usd_per_cycle, 12.5);

        let vendors = config.vendors.unwrap();
        assert_eq!(vendors.video, 2);
        assert_eq!(vendors.prompt, 3); // default

        let costs = config.costs.unwrap();
        assert_eq!(costs.video, 0.35);
        assert_eq!(costs.image, 0.08); // default

        let posting = config.posting.unwrap();
        assert_eq!(posting.platforms.len(), 2);
        assert_eq!(posting.platforms[0].name, "instagram");
        assert_eq!(posting.platforms[0].min_delay_minutes, 0);
        assert_eq!(posting.platforms[1].min_delay_minutes, 90);
        assert_eq!(posting.interval_secs, 600);
        assert_eq!(posting.window.start_hour, 9);
    }

    #[test]
    fn test_default_cost_table() {
        let costs = CostTable::default();
        assert_eq!(costs.proposal_batch, 0.02);
        assert_eq!(costs.video, 0.50);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.reelcast");

        assert_eq!(
            resolve_path(&base, "/absolute/state"),
            PathBuf::from("/absolute/state")
        );
        assert_eq!(
            resolve_path(&base, "./state"),
            PathBuf::from("/home/user/project/.reelcast/state")
        );
    }
}
