//! Hybrid product recommendation: collaborative filtering blended with
//! category-based content filtering
//!
//! Both scorers read from one [`Recommender`], which builds the utility matrix,
//! the category index and the customer similarity matrix once per dataset.

use crate::config::RecommendConfig;
use crate::data::{CategoryIndex, PurchaseDataset};
use crate::error::EngineError;
use crate::matrix::UtilityMatrix;
use crate::similarity::similarity_matrix;
use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Candidate product with its component and blended scores
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProduct {
    pub product_id: i64,
    /// Summed raw spend of the nearest customers on this product
    pub cf_score: f64,
    /// Number of the customer's categories that contain this product
    pub cb_score: f64,
    /// `cf_weight * cf_score + cb_weight * cb_score`
    pub score: f64,
}

/// Read-only recommendation state derived from one purchase dataset
#[derive(Debug, Clone)]
pub struct Recommender {
    matrix: UtilityMatrix,
    categories: CategoryIndex,
    similarity: Array2<f64>,
}

impl Recommender {
    pub fn new(dataset: &PurchaseDataset) -> Self {
        let matrix = UtilityMatrix::build(dataset);
        let categories = CategoryIndex::build(dataset);
        let similarity = similarity_matrix(&matrix.mean_centered());
        debug!(customers = matrix.n_customers(), "customer similarity computed");

        Self {
            matrix,
            categories,
            similarity,
        }
    }

    pub fn matrix(&self) -> &UtilityMatrix {
        &self.matrix
    }

    /// The `k` customers most similar to `customer_id`, most similar first.
    ///
    /// Equal similarities keep ascending customer id order. The customer
    /// itself is never included.
    pub fn nearest_customers(
        &self,
        customer_id: i64,
        k: usize,
    ) -> Result<Vec<(i64, f64)>, EngineError> {
        let target = self.matrix.row_of(customer_id)?;

        let mut neighbors: Vec<(usize, f64)> = self
            .similarity
            .row(target)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(row, _)| row != target)
            .collect();
        neighbors.sort_by(|a, b| b.1.total_cmp(&a.1));
        neighbors.truncate(k);

        Ok(neighbors
            .into_iter()
            .map(|(row, sim)| (self.matrix.customer_ids()[row], sim))
            .collect())
    }

    /// Collaborative filtering candidates.
    ///
    /// Every product any of the `neighbors` nearest customers has spent on,
    /// scored by their summed raw spend on it.
    pub fn collaborative_scores(
        &self,
        customer_id: i64,
        neighbors: usize,
    ) -> Result<BTreeMap<i64, f64>, EngineError> {
        let mut scores: BTreeMap<i64, f64> = BTreeMap::new();
        for (neighbor_id, _) in self.nearest_customers(customer_id, neighbors)? {
            let row = self.matrix.row_of(neighbor_id)?;
            for product_id in self.matrix.purchased_in_row(row) {
                *scores.entry(product_id).or_insert(0.0) += self.matrix.spend(row, product_id);
            }
        }
        Ok(scores)
    }

    /// Content-based candidates.
    ///
    /// Every product sold in a category the customer has bought from, scored
    /// by how many of those categories contain it.
    pub fn content_scores(&self, customer_id: i64) -> Result<BTreeMap<i64, f64>, EngineError> {
        let mut scores: BTreeMap<i64, f64> = BTreeMap::new();
        for category in self.categories.categories_of(customer_id)? {
            for &product_id in self.categories.products_in(category).into_iter().flatten() {
                *scores.entry(product_id).or_insert(0.0) += 1.0;
            }
        }
        Ok(scores)
    }

    /// Ranked candidates not yet owned by the customer, at most `top_n`.
    ///
    /// Ordered by descending blended score, then ascending product id.
    /// With both scorers disabled the result is empty.
    pub fn recommend_scored(
        &self,
        customer_id: i64,
        config: &RecommendConfig,
    ) -> Result<Vec<ScoredProduct>, EngineError> {
        config.validate()?;
        if !config.cf_enabled && !config.cb_enabled {
            return Ok(Vec::new());
        }

        let owned = self.matrix.purchased_by(customer_id)?;
        let cf = if config.cf_enabled {
            self.collaborative_scores(customer_id, config.neighbors)?
        } else {
            BTreeMap::new()
        };
        let cb = if config.cb_enabled {
            self.content_scores(customer_id)?
        } else {
            BTreeMap::new()
        };

        let pool: BTreeSet<i64> = cf
            .keys()
            .chain(cb.keys())
            .copied()
            .filter(|product_id| !owned.contains(product_id))
            .collect();

        let mut ranked: Vec<ScoredProduct> = pool
            .into_iter()
            .map(|product_id| {
                let cf_score = cf.get(&product_id).copied().unwrap_or(0.0);
                let cb_score = cb.get(&product_id).copied().unwrap_or(0.0);
                ScoredProduct {
                    product_id,
                    cf_score,
                    cb_score,
                    score: config.cf_weight * cf_score + config.cb_weight * cb_score,
                }
            })
            .collect();
        ranked.sort_by(rank_order);
        ranked.truncate(config.top_n);

        debug!(
            customer_id,
            owned = owned.len(),
            cf_candidates = cf.len(),
            cb_candidates = cb.len(),
            returned = ranked.len(),
            "hybrid ranking complete"
        );
        Ok(ranked)
    }

    /// Product ids recommended for `customer_id`, best first
    pub fn recommend(
        &self,
        customer_id: i64,
        config: &RecommendConfig,
    ) -> Result<Vec<i64>, EngineError> {
        let ranked = self.recommend_scored(customer_id, config)?;
        info!(customer_id, count = ranked.len(), "recommendations produced");
        Ok(ranked.into_iter().map(|p| p.product_id).collect())
    }
}

fn rank_order(a: &ScoredProduct, b: &ScoredProduct) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.product_id.cmp(&b.product_id))
}
