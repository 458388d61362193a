//! Command-line interface definitions and argument parsing

use crate::config::PipelineConfig;
use clap::Parser;
use std::path::PathBuf;

/// Customer segmentation and product recommendation over a purchase log
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the purchase log CSV
    #[arg(short, long)]
    pub input: Option<String>,

    /// Write a synthetic purchase log to the input path before running
    #[arg(long)]
    pub generate: bool,

    /// Print top products, top categories and average spend
    #[arg(long, alias = "data_analysis")]
    pub data_analysis: bool,

    /// Plot customer spend against purchase frequency
    #[arg(long)]
    pub plot: bool,

    /// Compute WCSS for k = 1..max_k and draw the elbow chart
    #[arg(long, alias = "compute_wcss")]
    pub compute_wcss: bool,

    /// Segment customers with K-Means and write the segment CSV
    #[arg(long, alias = "apply_kmeans")]
    pub apply_kmeans: bool,

    /// Recommend products for one customer
    #[arg(long)]
    pub recommendation: bool,

    /// Run every stage
    #[arg(long)]
    pub all: bool,

    /// Customer to recommend for (defaults to 1)
    #[arg(long, alias = "customer_id")]
    pub customer_id: Option<i64>,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Largest k evaluated by the elbow method
    #[arg(long)]
    pub max_k: Option<usize>,

    /// Feature weights as "spent,frequency,categories", e.g. "1.5,0.8,1.0"
    #[arg(long)]
    pub weights: Option<String>,

    /// Random seed for K-Means initialisation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output path for the segment CSV
    #[arg(short, long)]
    pub output: Option<String>,

    /// Directory for generated charts
    #[arg(long)]
    pub plot_dir: Option<String>,

    /// Weight of the collaborative filtering score
    #[arg(long)]
    pub cf_weight: Option<f64>,

    /// Weight of the content-based score
    #[arg(long)]
    pub cb_weight: Option<f64>,

    /// Number of products to recommend
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Similar customers consulted by collaborative filtering
    #[arg(long)]
    pub neighbors: Option<usize>,

    /// Disable collaborative filtering
    #[arg(long)]
    pub no_cf: bool,

    /// Disable content-based filtering
    #[arg(long)]
    pub no_cb: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse feature weights from the weights string
    /// Expected format: "spent,frequency,categories"
    pub fn parse_weights(&self) -> crate::Result<Option<[f64; 3]>> {
        if let Some(ref weights_str) = self.weights {
            let parts: Vec<&str> = weights_str.split(',').collect();
            if parts.len() != 3 {
                anyhow::bail!("Weights must be in format 'spent,frequency,categories'");
            }

            let mut weights = [0.0; 3];
            for (slot, part) in weights.iter_mut().zip(parts) {
                *slot = part
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid weight value: {}", part))?;
            }
            Ok(Some(weights))
        } else {
            Ok(None)
        }
    }

    pub fn customer_id(&self) -> i64 {
        self.customer_id.unwrap_or(1)
    }

    pub fn runs_data_analysis(&self) -> bool {
        self.data_analysis || self.all
    }

    pub fn runs_plot(&self) -> bool {
        self.plot || self.all
    }

    pub fn runs_compute_wcss(&self) -> bool {
        self.compute_wcss || self.all
    }

    pub fn runs_apply_kmeans(&self) -> bool {
        self.apply_kmeans || self.all
    }

    pub fn runs_recommendation(&self) -> bool {
        self.recommendation || self.all
    }

    /// Whether any pipeline stage was requested
    pub fn any_stage(&self) -> bool {
        self.runs_data_analysis()
            || self.runs_plot()
            || self.runs_compute_wcss()
            || self.runs_apply_kmeans()
            || self.runs_recommendation()
    }

    /// Load the configuration file (if any) and apply flag overrides
    pub fn resolve_config(&self) -> crate::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(input) = &self.input {
            config.data.input = input.clone();
        }
        if let Some(output) = &self.output {
            config.data.segments_output = output.clone();
        }
        if let Some(plot_dir) = &self.plot_dir {
            config.data.plot_dir = plot_dir.clone();
        }

        if let Some(k) = self.clusters {
            config.clustering.k = k;
        }
        if let Some(max_k) = self.max_k {
            config.clustering.max_k = max_k;
        }
        if let Some(weights) = self.parse_weights()? {
            config.clustering.weights = weights;
        }
        if let Some(seed) = self.seed {
            config.clustering.seed = seed;
        }

        let recommendation = &mut config.recommendation;
        if let Some(cf_weight) = self.cf_weight {
            recommendation.cf_weight = cf_weight;
        }
        if let Some(cb_weight) = self.cb_weight {
            recommendation.cb_weight = cb_weight;
        }
        if let Some(top_n) = self.top_n {
            recommendation.top_n = top_n;
        }
        if let Some(neighbors) = self.neighbors {
            recommendation.neighbors = neighbors;
        }
        if self.no_cf {
            recommendation.cf_enabled = false;
        }
        if self.no_cb {
            recommendation.cb_enabled = false;
        }

        config.clustering.validate()?;
        config.recommendation.validate()?;
        Ok(config)
    }
}
