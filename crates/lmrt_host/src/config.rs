//! Host session configuration, loadable from JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lmrt_stream::StreamConfig;
use lmrt_verify::TestScene;

use crate::sim::SimConfig;

/// How the poll loop waits when a pass finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BackoffConfig {
    Spin,
    Sleep { micros: u64 },
    Exponential { min_micros: u64, max_micros: u64 },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Exponential {
            min_micros: 1,
            max_micros: 1000,
        }
    }
}

/// Shape of the synthetic scene sent to the accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub triangles: usize,
    pub rays: usize,
    /// Index of the first ray aimed at the triangles; earlier rays miss
    pub first_hit: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            triangles: 16,
            rays: 16,
            first_hit: 11,
        }
    }
}

impl SceneConfig {
    pub fn build(&self) -> TestScene {
        TestScene::stacked(self.triangles, self.rays, self.first_hit)
    }
}

/// Everything one host session needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub results: StreamConfig,
    pub status: StreamConfig,
    /// Where in accelerator memory the triangles go, in bursts
    pub offset_in_bursts: usize,
    pub backoff: BackoffConfig,
    pub scene: SceneConfig,
    pub sim: SimConfig,
    /// Write the verification report here as JSON
    pub report_path: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            results: StreamConfig::results(),
            status: StreamConfig::status(),
            offset_in_bursts: 0,
            backoff: BackoffConfig::default(),
            scene: SceneConfig::default(),
            sim: SimConfig::default(),
            report_path: None,
        }
    }
}

impl HostConfig {
    /// Load a config file; fields it leaves out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Config from the first command line argument, or defaults without one.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self> {
        match args.nth(1) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
