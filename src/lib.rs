//! BasketForge: customer segmentation and hybrid product recommendation
//!
//! Works on a purchase log of (customer, product, category, amount, date)
//! records. Customers are segmented with weighted K-Means over their spend,
//! purchase count and category breadth; products are recommended by blending
//! user-based collaborative filtering with category-based content filtering.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod matrix;
pub mod model;
pub mod recommend;
pub mod similarity;
pub mod synth;
pub mod viz;

use std::collections::BTreeMap;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ClusterConfig, DataConfig, Labeling, PipelineConfig, RecommendConfig};
pub use data::{load_purchases, CustomerAggregate, PurchaseDataset, PurchaseRecord};
pub use error::EngineError;
pub use matrix::UtilityMatrix;
pub use model::{compute_wcss, segment_customers, ClusterAssignments, CustomerFeatures};
pub use recommend::{Recommender, ScoredProduct};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

/// Segment every customer of `dataset` into `k` clusters.
///
/// `weights` scale the standardised [total_spent, purchase_frequency,
/// unique_categories] features before clustering.
pub fn cluster(
    dataset: &PurchaseDataset,
    k: usize,
    weights: [f64; 3],
) -> Result<BTreeMap<i64, String>> {
    let config = ClusterConfig {
        k,
        weights,
        ..ClusterConfig::default()
    };
    Ok(segment_customers(dataset, &config)?.segments())
}

/// Recommend up to `top_n` products `customer_id` has not bought yet
pub fn recommend(
    dataset: &PurchaseDataset,
    customer_id: i64,
    cf_weight: f64,
    cb_weight: f64,
    top_n: usize,
    cf_enabled: bool,
    cb_enabled: bool,
) -> std::result::Result<Vec<i64>, EngineError> {
    let config = RecommendConfig {
        cf_weight,
        cb_weight,
        top_n,
        cf_enabled,
        cb_enabled,
        ..RecommendConfig::default()
    };
    Recommender::new(dataset).recommend(customer_id, &config)
}
