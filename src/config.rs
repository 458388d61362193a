//! Pipeline configuration: defaults, TOML loading and validation
//!
//! Every stage receives its section by reference. Nothing here is mutated
//! after `main` has applied the command-line overrides.

use crate::error::EngineError;
use serde::Deserialize;
use std::path::Path;

/// Complete configuration for one pipeline run
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub clustering: ClusterConfig,
    pub recommendation: RecommendConfig,
}

impl PipelineConfig {
    /// Load a configuration file. Missing sections and keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        let config: PipelineConfig = toml::from_str(raw)?;
        config.clustering.validate()?;
        config.recommendation.validate()?;
        Ok(config)
    }
}

/// Input/output locations and the valid customer id bounds
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Purchase log CSV
    pub input: String,
    /// Where `apply_kmeans` writes the labelled customers
    pub segments_output: String,
    /// Directory receiving PNG charts
    pub plot_dir: String,
    pub customer_id_min: i64,
    pub customer_id_max: i64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input: "purchases.csv".to_string(),
            segments_output: "customer_segments_kmeans.csv".to_string(),
            plot_dir: ".".to_string(),
            customer_id_min: 1,
            customer_id_max: 500,
        }
    }
}

impl DataConfig {
    /// Reject a customer id outside the declared bounds before any work starts
    pub fn check_customer_id(&self, customer_id: i64) -> Result<(), EngineError> {
        if customer_id < self.customer_id_min || customer_id > self.customer_id_max {
            return Err(EngineError::InvalidRange {
                customer_id,
                min: self.customer_id_min,
                max: self.customer_id_max,
            });
        }
        Ok(())
    }
}

/// How cluster indices are turned into segment names
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Labeling {
    /// Rank clusters by their centroid's raw spend and frequency
    #[default]
    Centroid,
    /// Map cluster index straight onto the fixed label table
    Positional,
}

/// K-Means settings for customer segmentation
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of clusters
    pub k: usize,
    /// Largest k evaluated by the elbow diagnostic
    pub max_k: usize,
    /// Multipliers for [total_spent, purchase_frequency, unique_categories]
    /// applied after z-score scaling
    pub weights: [f64; 3],
    /// Restarts; the run with the lowest inertia wins
    pub n_runs: usize,
    pub seed: u64,
    pub max_iterations: u64,
    pub tolerance: f64,
    pub labeling: Labeling,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_k: 10,
            weights: [1.5, 0.8, 1.0],
            n_runs: 10,
            seed: 42,
            max_iterations: 300,
            tolerance: 1e-4,
            labeling: Labeling::Centroid,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::InvalidWeights(format!(
                "feature weights must be finite and non-negative, got {:?}",
                self.weights
            )));
        }
        if self.n_runs == 0 {
            return Err(EngineError::InvalidWeights(
                "n_runs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hybrid recommendation settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecommendConfig {
    pub cf_weight: f64,
    pub cb_weight: f64,
    /// Maximum number of products returned
    pub top_n: usize,
    /// Nearest customers consulted by collaborative filtering
    pub neighbors: usize,
    pub cf_enabled: bool,
    pub cb_enabled: bool,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            cf_weight: 0.7,
            cb_weight: 0.3,
            top_n: 5,
            neighbors: 10,
            cf_enabled: true,
            cb_enabled: true,
        }
    }
}

impl RecommendConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, weight) in [("cf_weight", self.cf_weight), ("cb_weight", self.cb_weight)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(EngineError::InvalidWeights(format!(
                    "{} must be finite and non-negative, got {}",
                    name, weight
                )));
            }
        }
        Ok(())
    }
}
