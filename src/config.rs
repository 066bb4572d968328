// src/config.rs
//! TOML application config with an env-var override for the path:
//! 1) $AGGREGATOR_CONFIG_PATH
//! 2) config/aggregator.toml
//! 3) built-in defaults
//!
//! Every section and field is optional; a missing file is not an error.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "AGGREGATOR_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/aggregator.toml";

const ENV_APIFY_TOKEN: &str = "APIFY_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub schedule: ScheduleConfig,
    pub store: StoreConfig,
    pub snapshots: SnapshotConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between scheduled cycles.
    pub interval_secs: u64,
    /// Per-source extraction deadline, seconds.
    pub extract_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 21_600, // every 6 hours
            extract_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/opportunities.sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("data/snapshots"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub devpost: DevpostConfig,
    pub lablab: LablabConfig,
    pub coursera: CourseraConfig,
    pub udemy: UdemyConfig,
    pub apify: ApifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DevpostConfig {
    pub enabled: bool,
    pub base_url: String,
    pub max_pages: u32,
}

impl Default for DevpostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://devpost.com".to_string(),
            max_pages: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LablabConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for LablabConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://lablab.ai".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CourseraConfig {
    pub enabled: bool,
    pub query: String,
    pub max_courses: u32,
}

impl Default for CourseraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            query: "free".to_string(),
            max_courses: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdemyConfig {
    pub enabled: bool,
    pub base_url: String,
    pub query: String,
    pub page_size: u32,
    pub free_only: bool,
}

impl Default for UdemyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.udemy.com".to_string(),
            query: "programming".to_string(),
            page_size: 20,
            free_only: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApifyConfig {
    pub enabled: bool,
    pub dataset_id: String,
    /// "ENV" means: read from APIFY_TOKEN at startup.
    pub token: String,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dataset_id: "Nv22CcCkUeJsMA4Kr".to_string(),
            token: "ENV".to_string(),
        }
    }
}

impl ApifyConfig {
    /// Resolve the dataset token, honoring the "ENV" indirection.
    pub fn resolved_token(&self) -> Result<String> {
        if self.token.trim().eq_ignore_ascii_case("env") {
            env::var(ENV_APIFY_TOKEN).map_err(|_| anyhow!("Missing APIFY_TOKEN env var"))
        } else {
            Ok(self.token.clone())
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_CONFIG_PATH
    /// 2) config/aggregator.toml
    /// 3) defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("AGGREGATOR_CONFIG_PATH points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }
}
