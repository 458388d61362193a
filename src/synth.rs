//! Seeded synthetic purchase log generator

use crate::data::{PurchaseDataset, PurchaseRecord};
use crate::error::EngineError;
use chrono::{Duration, Local, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

pub const CATEGORIES: [&str; 6] = [
    "Electronics",
    "Fashion",
    "Home Goods",
    "Stationary",
    "Confectionary",
    "Groceries",
];

/// Shape of the generated log
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub records: usize,
    pub customers: i64,
    pub products: i64,
    pub seed: u64,
    /// Purchases fall within `days` days before this date
    pub reference_date: NaiveDate,
    pub days: i64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            records: 5000,
            customers: 500,
            products: 50,
            seed: 0,
            reference_date: Local::now().date_naive(),
            days: 365,
        }
    }
}

/// Generate a purchase log.
///
/// The leading rows walk a shuffled list of every customer id and every
/// product id so each appears at least once when `records` allows it.
pub fn generate_purchases(config: &SynthConfig) -> Result<PurchaseDataset, EngineError> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut customer_ids: Vec<i64> = (1..=config.customers).collect();
    customer_ids.shuffle(&mut rng);
    let mut product_ids: Vec<i64> = (1..=config.products).collect();
    product_ids.shuffle(&mut rng);

    let mut records = Vec::with_capacity(config.records);
    for i in 0..config.records {
        let customer_id = match customer_ids.get(i) {
            Some(&id) => id,
            None => rng.gen_range(1..=config.customers),
        };
        let product_id = match product_ids.get(i) {
            Some(&id) => id,
            None => rng.gen_range(1..=config.products),
        };
        let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        let amount = (rng.gen_range(10.0..1000.0_f64) * 100.0).round() / 100.0;
        let days_ago = rng.gen_range(0..config.days.max(1));

        records.push(PurchaseRecord {
            customer_id,
            product_id,
            product_category: category.to_string(),
            purchase_amount: amount,
            purchase_date: config.reference_date - Duration::days(days_ago),
        });
    }

    info!(records = records.len(), seed = config.seed, "synthetic purchases generated");
    PurchaseDataset::new(records)
}
