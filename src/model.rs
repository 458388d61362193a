//! Customer segmentation: weighted K-Means over behavioural aggregates

use crate::config::{ClusterConfig, Labeling};
use crate::data::{aggregate_customers, CustomerAggregate, PurchaseDataset};
use crate::error::EngineError;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::{CsvWriter, SerWriter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use tracing::{debug, info, warn};

pub const FREQUENT_MEDIUM_SPENDERS: &str = "Frequent Shoppers and Medium Spenders";
pub const HIGH_SPENDERS: &str = "High Spenders";
pub const LOW_INFREQUENT_SPENDERS: &str = "Low Spenders and Less Frequent Shoppers";

/// Segment names by cluster index for positional labelling
pub const SEGMENT_LABELS: [&str; 3] = [
    FREQUENT_MEDIUM_SPENDERS,
    HIGH_SPENDERS,
    LOW_INFREQUENT_SPENDERS,
];

/// Z-score parameters fitted once over the whole customer population
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScaler {
    pub mean: Array1<f64>,
    /// Population standard deviation, 1.0 for constant features
    pub scale: Array1<f64>,
}

impl FeatureScaler {
    pub fn fit(raw: &Array2<f64>) -> Self {
        let n_features = raw.ncols();
        let mean = raw
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = raw
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, raw: &Array2<f64>) -> Array2<f64> {
        (raw - &self.mean) / &self.scale
    }
}

/// Aggregated, scaled features for every customer, row-aligned with `aggregates`
#[derive(Debug, Clone)]
pub struct CustomerFeatures {
    pub aggregates: Vec<CustomerAggregate>,
    /// [total_spent, purchase_frequency, unique_categories] per customer
    pub raw: Array2<f64>,
    pub scaled: Array2<f64>,
}

impl CustomerFeatures {
    pub fn from_dataset(dataset: &PurchaseDataset) -> crate::Result<Self> {
        let aggregates = aggregate_customers(dataset);
        let raw_data: Vec<f64> = aggregates.iter().flat_map(|a| a.features()).collect();
        let raw = Array2::from_shape_vec((aggregates.len(), 3), raw_data)?;
        let scaled = FeatureScaler::fit(&raw).transform(&raw);

        debug!(customers = aggregates.len(), "customer features scaled");
        Ok(Self {
            aggregates,
            raw,
            scaled,
        })
    }

    pub fn n_customers(&self) -> usize {
        self.aggregates.len()
    }

    /// Scaled features multiplied column-wise by `weights`
    pub fn weighted(&self, weights: &[f64; 3]) -> Array2<f64> {
        &self.scaled * &Array1::from(weights.to_vec())
    }
}

/// K-Means model wrapper with fitted parameters
#[derive(Debug)]
pub struct KMeansModel {
    /// Number of clusters that received at least one customer
    pub n_clusters: usize,
    /// Cluster assignments for training data, numbered 0..n_clusters
    pub labels: Array1<usize>,
    /// Cluster centroids in the (weighted) feature space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

impl KMeansModel {
    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Mean of `raw` rows per cluster
    pub fn cluster_means(&self, raw: &Array2<f64>) -> Array2<f64> {
        let mut sums = Array2::<f64>::zeros((self.n_clusters, raw.ncols()));
        for (row, &label) in raw.outer_iter().zip(self.labels.iter()) {
            let mut target = sums.row_mut(label);
            target += &row;
        }
        for (mut row, size) in sums.outer_iter_mut().zip(self.cluster_sizes()) {
            if size > 0 {
                row /= size as f64;
            }
        }
        sums
    }
}

/// Number of distinct rows in a feature matrix
pub fn count_distinct_rows(features: &Array2<f64>) -> usize {
    features
        .outer_iter()
        // +0.0 folds -0.0 into 0.0
        .map(|row| row.iter().map(|v| (v + 0.0).to_bits()).collect::<Vec<u64>>())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Renumber `labels` so only clusters that own a point remain, keeping their order.
///
/// Returns the new labels and the original index of each kept cluster.
pub fn compact_labels(labels: &Array1<usize>, k: usize) -> (Array1<usize>, Vec<usize>) {
    let mut used = vec![false; k];
    for &label in labels.iter() {
        if label < k {
            used[label] = true;
        }
    }
    let kept: Vec<usize> = (0..k).filter(|&c| used[c]).collect();
    let mut remap = vec![0; k];
    for (new, &old) in kept.iter().enumerate() {
        remap[old] = new;
    }
    (labels.mapv(|label| remap[label.min(k - 1)]), kept)
}

/// Fit K-Means with `k` clusters.
///
/// Uses k-means++ seeding from a fixed seed and keeps the best of
/// `config.n_runs` restarts.
///
/// # Arguments
/// * `features` - One row per customer, already scaled and weighted
/// * `k` - Number of clusters, at most the number of distinct rows
/// * `config` - Seed, restart count, iteration cap and tolerance
///
/// # Returns
/// * Fitted `KMeansModel` with labels, centroids and inertia
/// * `EngineError::InvalidClusterCount` when `k` is zero or exceeds the
///   number of distinct rows
pub fn fit_kmeans(
    features: &Array2<f64>,
    k: usize,
    config: &ClusterConfig,
) -> crate::Result<KMeansModel> {
    let n_samples = features.nrows();
    let distinct = count_distinct_rows(features);
    if k == 0 || distinct < k {
        return Err(EngineError::InvalidClusterCount {
            k,
            customers: distinct,
        }
        .into());
    }

    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(features.clone(), targets);

    let model = KMeans::params_with(k, StdRng::seed_from_u64(config.seed), L2Dist)
        .n_runs(config.n_runs)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .fit(&dataset)?;

    let predicted: Array1<usize> = model.predict(&dataset);
    let (labels, kept) = compact_labels(&predicted, k);
    if kept.len() < k {
        warn!(requested = k, used = kept.len(), "k-means left clusters empty");
    }
    let centroids = model.centroids().select(Axis(0), &kept);
    let inertia = compute_inertia(features, &labels, &centroids);

    Ok(KMeansModel {
        n_clusters: kept.len(),
        labels,
        centroids,
        inertia,
    })
}

/// Elbow diagnostic: inertia of the unweighted scaled features for each k.
///
/// # Arguments
/// * `features` - Prepared customer features
/// * `config` - `max_k` plus the K-Means fitting parameters
///
/// # Returns
/// * `(k, inertia)` pairs for k = 1..=max_k, with k capped at the number of
///   distinct customer rows
pub fn compute_wcss(
    features: &CustomerFeatures,
    config: &ClusterConfig,
) -> crate::Result<Vec<(usize, f64)>> {
    let max_k = config.max_k.min(count_distinct_rows(&features.scaled));
    let mut wcss = Vec::with_capacity(max_k);
    for k in 1..=max_k {
        let model = fit_kmeans(&features.scaled, k, config)?;
        debug!(k, inertia = model.inertia, "elbow point");
        wcss.push((k, model.inertia));
    }
    Ok(wcss)
}

/// Segment name for a cluster index under positional labelling
pub fn positional_label(cluster: usize) -> String {
    SEGMENT_LABELS
        .get(cluster)
        .map(|label| label.to_string())
        .unwrap_or_else(|| format!("Segment {}", cluster))
}

/// Name each cluster.
///
/// `raw_means` holds per-cluster means of [total_spent, purchase_frequency,
/// unique_categories]. Centroid labelling only applies to three clusters:
/// highest spend is "High Spenders", the more frequent of the other two is
/// "Frequent Shoppers and Medium Spenders".
pub fn label_clusters(raw_means: &Array2<f64>, labeling: Labeling) -> Vec<String> {
    let k = raw_means.nrows();
    if labeling == Labeling::Positional || k != SEGMENT_LABELS.len() {
        return (0..k).map(positional_label).collect();
    }

    let mut by_spend: Vec<usize> = (0..k).collect();
    by_spend.sort_by(|&a, &b| raw_means[[b, 0]].total_cmp(&raw_means[[a, 0]]).then(a.cmp(&b)));
    let high = by_spend[0];
    let (first, second) = (by_spend[1], by_spend[2]);
    let (frequent, infrequent) = if raw_means[[second, 1]] > raw_means[[first, 1]] {
        (second, first)
    } else {
        (first, second)
    };

    let mut labels = vec![String::new(); k];
    labels[high] = HIGH_SPENDERS.to_string();
    labels[frequent] = FREQUENT_MEDIUM_SPENDERS.to_string();
    labels[infrequent] = LOW_INFREQUENT_SPENDERS.to_string();
    labels
}

/// One labelled customer
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub aggregate: CustomerAggregate,
    pub cluster: usize,
    pub segment: String,
}

/// Cluster assignment of every customer in a dataset
#[derive(Debug, Clone)]
pub struct ClusterAssignments {
    rows: Vec<SegmentRow>,
    by_customer: BTreeMap<i64, usize>,
    n_clusters: usize,
    inertia: f64,
}

impl ClusterAssignments {
    /// Rows in ascending customer id order
    pub fn rows(&self) -> &[SegmentRow] {
        &self.rows
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn segment_of(&self, customer_id: i64) -> Result<&SegmentRow, EngineError> {
        self.by_customer
            .get(&customer_id)
            .map(|&i| &self.rows[i])
            .ok_or(EngineError::InvalidCustomer { customer_id })
    }

    /// customer_id -> segment name
    pub fn segments(&self) -> BTreeMap<i64, String> {
        self.rows
            .iter()
            .map(|row| (row.aggregate.customer_id, row.segment.clone()))
            .collect()
    }

    /// Number of customers per segment name
    pub fn segment_sizes(&self) -> BTreeMap<String, usize> {
        let mut sizes = BTreeMap::new();
        for row in &self.rows {
            *sizes.entry(row.segment.clone()).or_insert(0) += 1;
        }
        sizes
    }

    /// Write customer aggregates with their cluster and segment as CSV
    pub fn write_csv(&self, file_path: &str) -> crate::Result<()> {
        let mut df = polars::df!(
            "customer_id" => self.rows.iter().map(|r| r.aggregate.customer_id).collect::<Vec<_>>(),
            "total_spent" => self.rows.iter().map(|r| r.aggregate.total_spent).collect::<Vec<_>>(),
            "purchase_frequency" => self.rows.iter().map(|r| r.aggregate.purchase_frequency as i64).collect::<Vec<_>>(),
            "unique_categories" => self.rows.iter().map(|r| r.aggregate.unique_categories as i64).collect::<Vec<_>>(),
            "cluster" => self.rows.iter().map(|r| r.cluster as i64).collect::<Vec<_>>(),
            "segment" => self.rows.iter().map(|r| r.segment.clone()).collect::<Vec<_>>()
        )?;
        let mut file = File::create(file_path)
            .map_err(|e| anyhow::anyhow!("failed to create {}: {}", file_path, e))?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        info!(path = file_path, customers = self.rows.len(), "customer segments written");
        Ok(())
    }
}

/// Aggregate, scale, weight and cluster the customers of a dataset
pub fn segment_customers(
    dataset: &PurchaseDataset,
    config: &ClusterConfig,
) -> crate::Result<ClusterAssignments> {
    config.validate()?;
    let features = CustomerFeatures::from_dataset(dataset)?;
    segment_features(&features, config)
}

/// Cluster already prepared features
pub fn segment_features(
    features: &CustomerFeatures,
    config: &ClusterConfig,
) -> crate::Result<ClusterAssignments> {
    if config.labeling == Labeling::Centroid && config.k != SEGMENT_LABELS.len() {
        warn!(k = config.k, "named segments need k = 3, falling back to numbered segments");
    }

    let weighted = features.weighted(&config.weights);
    let model = fit_kmeans(&weighted, config.k, config)?;
    let names = label_clusters(&model.cluster_means(&features.raw), config.labeling);

    let rows: Vec<SegmentRow> = features
        .aggregates
        .iter()
        .zip(model.labels.iter())
        .map(|(aggregate, &cluster)| SegmentRow {
            aggregate: aggregate.clone(),
            cluster,
            segment: names[cluster].clone(),
        })
        .collect();
    let by_customer = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (row.aggregate.customer_id, i))
        .collect();

    info!(
        customers = rows.len(),
        clusters = model.n_clusters,
        inertia = model.inertia,
        "k-means segmentation complete"
    );
    Ok(ClusterAssignments {
        rows,
        by_customer,
        n_clusters: model.n_clusters,
        inertia: model.inertia,
    })
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            let distance_sq = point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
            inertia += distance_sq;
        }
    }

    inertia
}
