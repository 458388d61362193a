//! Customer x product utility matrix of aggregated spend

use crate::data::PurchaseDataset;
use crate::error::EngineError;
use ndarray::{Array1, Array2, Axis};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Total spend per (customer, product) pair.
///
/// Rows follow ascending customer id and columns ascending product id. Pairs
/// without a purchase hold zero.
#[derive(Debug, Clone)]
pub struct UtilityMatrix {
    values: Array2<f64>,
    customer_ids: Vec<i64>,
    product_ids: Vec<i64>,
    customer_rows: BTreeMap<i64, usize>,
    product_cols: BTreeMap<i64, usize>,
}

impl UtilityMatrix {
    pub fn build(dataset: &PurchaseDataset) -> Self {
        let customer_ids: Vec<i64> = dataset.customer_ids().into_iter().collect();
        let product_ids: Vec<i64> = dataset
            .records()
            .iter()
            .map(|r| r.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let customer_rows: BTreeMap<i64, usize> =
            customer_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let product_cols: BTreeMap<i64, usize> =
            product_ids.iter().enumerate().map(|(j, &id)| (id, j)).collect();

        let mut values = Array2::<f64>::zeros((customer_ids.len(), product_ids.len()));
        for record in dataset.records() {
            let row = customer_rows[&record.customer_id];
            let col = product_cols[&record.product_id];
            values[[row, col]] += record.purchase_amount;
        }

        debug!(
            customers = customer_ids.len(),
            products = product_ids.len(),
            "utility matrix built"
        );

        Self {
            values,
            customer_ids,
            product_ids,
            customer_rows,
            product_cols,
        }
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn customer_ids(&self) -> &[i64] {
        &self.customer_ids
    }

    pub fn product_ids(&self) -> &[i64] {
        &self.product_ids
    }

    pub fn n_customers(&self) -> usize {
        self.customer_ids.len()
    }

    /// Row index of a customer
    pub fn row_of(&self, customer_id: i64) -> Result<usize, EngineError> {
        self.customer_rows
            .get(&customer_id)
            .copied()
            .ok_or(EngineError::InvalidCustomer { customer_id })
    }

    /// Raw spend of a customer row on a product; zero for unknown products
    pub fn spend(&self, row: usize, product_id: i64) -> f64 {
        self.product_cols
            .get(&product_id)
            .map_or(0.0, |&col| self.values[[row, col]])
    }

    /// Products with non-zero spend in the given row, ascending
    pub fn purchased_in_row(&self, row: usize) -> impl Iterator<Item = i64> + '_ {
        self.values
            .row(row)
            .into_iter()
            .zip(self.product_ids.iter())
            .filter(|(spend, _)| **spend > 0.0)
            .map(|(_, &product_id)| product_id)
    }

    /// Products the customer has already bought
    pub fn purchased_by(&self, customer_id: i64) -> Result<BTreeSet<i64>, EngineError> {
        let row = self.row_of(customer_id)?;
        Ok(self.purchased_in_row(row).collect())
    }

    /// Sum of every cell
    pub fn total(&self) -> f64 {
        self.values.sum()
    }

    /// Subtract each row's mean from every cell of that row, zeros included
    pub fn mean_centered(&self) -> Array2<f64> {
        let means: Array1<f64> = self
            .values
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(self.values.nrows()));
        &self.values - &means.insert_axis(Axis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PurchaseRecord;
    use chrono::NaiveDate;

    fn dataset(rows: &[(i64, i64, f64)]) -> PurchaseDataset {
        PurchaseDataset::new(
            rows.iter()
                .map(|&(customer_id, product_id, amount)| PurchaseRecord {
                    customer_id,
                    product_id,
                    product_category: "Fashion".to_string(),
                    purchase_amount: amount,
                    purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_sums_repeat_purchases() {
        let matrix = UtilityMatrix::build(&dataset(&[
            (2, 5, 10.0),
            (1, 3, 4.0),
            (2, 5, 2.5),
            (1, 5, 1.0),
        ]));

        assert_eq!(matrix.customer_ids(), &[1, 2]);
        assert_eq!(matrix.product_ids(), &[3, 5]);
        assert_eq!(matrix.values()[[1, 1]], 12.5);
        assert_eq!(matrix.values()[[1, 0]], 0.0);
        assert_eq!(matrix.spend(0, 3), 4.0);
        assert_eq!(matrix.spend(0, 99), 0.0);
        assert!((matrix.total() - 17.5).abs() < 1e-12);
    }

    #[test]
    fn test_purchased_by() {
        let matrix = UtilityMatrix::build(&dataset(&[(1, 3, 4.0), (1, 7, 1.0), (2, 5, 2.0)]));

        let owned: Vec<_> = matrix.purchased_by(1).unwrap().into_iter().collect();
        assert_eq!(owned, vec![3, 7]);
        assert_eq!(
            matrix.purchased_by(9999).unwrap_err(),
            EngineError::InvalidCustomer { customer_id: 9999 }
        );
    }

    #[test]
    fn test_mean_centering_shifts_zero_cells() {
        let matrix = UtilityMatrix::build(&dataset(&[(1, 1, 6.0), (2, 2, 3.0), (2, 3, 3.0)]));
        let centered = matrix.mean_centered();

        // customer 1 row: [6, 0, 0], mean 2
        assert_eq!(centered.row(0).to_vec(), vec![4.0, -2.0, -2.0]);
        // customer 2 row: [0, 3, 3], mean 2
        assert_eq!(centered.row(1).to_vec(), vec![-2.0, 1.0, 1.0]);
        for row in centered.outer_iter() {
            assert!(row.sum().abs() < 1e-12);
        }
    }
}
