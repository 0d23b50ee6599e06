//! Pipeline configuration
//!
//! Every option has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! confidence_threshold_scalar = 0.6
//! poll_interval_ms = 50
//!
//! [preprocess]
//! block_radius = 7
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::vision::config::{ExtractConfig, OcrConfig, PreprocessConfig};
use crate::{Error, Result};

/// Configuration of the whole capture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum confidence for position, pot, stack and action updates
    #[serde(default = "default_scalar_threshold")]
    pub confidence_threshold_scalar: f64,
    /// Minimum confidence for card-list updates
    #[serde(default = "default_cards_threshold")]
    pub confidence_threshold_cards: f64,
    /// Fused snapshots kept for correction and change detection
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Raw frames kept for re-analysis
    #[serde(default = "default_frame_buffer_size")]
    pub frame_buffer_size: usize,
    /// Worker sleep when the queue is empty
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Inbound queue bound; the oldest frame is dropped when full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long `stop` waits for the worker
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
    /// Pot delta that counts as a change (strictly greater)
    #[serde(default = "default_change_delta")]
    pub pot_change_delta: f64,
    /// Stack delta that counts as a change (strictly greater)
    #[serde(default = "default_change_delta")]
    pub stack_change_delta: f64,
    /// Skip analysis of frames nearly identical to the previous one
    #[serde(default)]
    pub skip_unchanged_frames: bool,
    /// Similarity in [0, 1] above which a frame counts as unchanged
    #[serde(default = "default_frame_similarity")]
    pub frame_similarity: f64,
    /// Templates smaller than this on either side are rejected
    #[serde(default = "default_min_template_dimension")]
    pub min_template_dimension: u32,
    /// Minimum normalised correlation for a template-match anchor
    #[serde(default = "default_template_match_threshold")]
    pub template_match_threshold: f64,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

fn default_scalar_threshold() -> f64 {
    0.5
}

fn default_cards_threshold() -> f64 {
    0.3
}

fn default_history_size() -> usize {
    10
}

fn default_frame_buffer_size() -> usize {
    5
}

fn default_poll_interval() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    32
}

fn default_stop_timeout() -> u64 {
    1000
}

fn default_change_delta() -> f64 {
    0.1
}

fn default_frame_similarity() -> f64 {
    0.95
}

fn default_min_template_dimension() -> u32 {
    16
}

fn default_template_match_threshold() -> f64 {
    0.8
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold_scalar: default_scalar_threshold(),
            confidence_threshold_cards: default_cards_threshold(),
            history_size: default_history_size(),
            frame_buffer_size: default_frame_buffer_size(),
            poll_interval_ms: default_poll_interval(),
            queue_capacity: default_queue_capacity(),
            stop_timeout_ms: default_stop_timeout(),
            pot_change_delta: default_change_delta(),
            stack_change_delta: default_change_delta(),
            skip_unchanged_frames: false,
            frame_similarity: default_frame_similarity(),
            min_template_dimension: default_min_template_dimension(),
            template_match_threshold: default_template_match_threshold(),
            preprocess: PreprocessConfig::default(),
            extract: ExtractConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("confidence_threshold_scalar", self.confidence_threshold_scalar),
            ("confidence_threshold_cards", self.confidence_threshold_cards),
            ("frame_similarity", self.frame_similarity),
            ("template_match_threshold", self.template_match_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be in [0, 1], got {}", name, value)));
            }
        }

        let sizes = [
            ("history_size", self.history_size),
            ("frame_buffer_size", self.frame_buffer_size),
            ("queue_capacity", self.queue_capacity),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::Config(format!("{} must be positive", name)));
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.pot_change_delta < 0.0 || self.stack_change_delta < 0.0 {
            return Err(Error::Config("change deltas must not be negative".to_string()));
        }
        if self.min_template_dimension == 0 {
            return Err(Error::Config("min_template_dimension must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
