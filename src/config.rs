use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub inference: InferenceConfig,
    pub sampling: SamplingConfig,
    pub aggregation: AggregationConfig,
    pub video: VideoConfig,
    pub firebase: FirebaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub detector_path: String,
    pub classifier_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub num_threads: usize,
    pub cuda_device_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Every Nth decoded frame is a sampling point. The deployed
    /// configurations used 10 or 30.
    pub cadence: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Maximum |median - mean| of positive positions still counted as a
    /// clustered (genuine) violation.
    pub divergence_threshold: f64,
    /// Treat a lone positive sample as a false positive. The earlier
    /// script variant ran without this suppression.
    pub single_positive_is_noise: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub bucket: String,
    /// May be left empty and supplied via FIREBASE_API_KEY instead.
    #[serde(default)]
    pub api_key: String,
    /// Offset of the reporting timezone from UTC, in hours.
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        if let Ok(key) = std::env::var("FIREBASE_API_KEY") {
            config.firebase.api_key = key;
        }

        Ok(config)
    }
}
