//! Purchase log loading, validation and per-customer aggregation using Polars

use crate::error::EngineError;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use tracing::{debug, info};

/// Date layout used by the purchase log
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column names of the purchase log, in file order
pub const COLUMNS: [&str; 5] = [
    "customer_id",
    "product_id",
    "product_category",
    "purchase_amount",
    "purchase_date",
];

/// A single purchase, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRecord {
    pub customer_id: i64,
    pub product_id: i64,
    pub product_category: String,
    pub purchase_amount: f64,
    pub purchase_date: NaiveDate,
}

impl PurchaseRecord {
    fn validate(&self, row: usize) -> Result<(), EngineError> {
        let reason = if self.customer_id < 1 {
            format!("customer_id must be >= 1, got {}", self.customer_id)
        } else if self.product_id < 1 {
            format!("product_id must be >= 1, got {}", self.product_id)
        } else if self.product_category.trim().is_empty() {
            "product_category is empty".to_string()
        } else if !self.purchase_amount.is_finite() || self.purchase_amount <= 0.0 {
            format!(
                "purchase_amount must be positive, got {}",
                self.purchase_amount
            )
        } else {
            return Ok(());
        };
        Err(EngineError::InvalidRecord { row, reason })
    }
}

/// Validated, non-empty collection of purchase records
#[derive(Debug, Clone)]
pub struct PurchaseDataset {
    records: Vec<PurchaseRecord>,
}

impl PurchaseDataset {
    /// Build a dataset, rejecting empty input and records that break the data model
    pub fn new(records: Vec<PurchaseRecord>) -> Result<Self, EngineError> {
        if records.is_empty() {
            return Err(EngineError::EmptyDataset);
        }
        for (row, record) in records.iter().enumerate() {
            record.validate(row)?;
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[PurchaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of every purchase amount
    pub fn total_amount(&self) -> f64 {
        self.records.iter().map(|r| r.purchase_amount).sum()
    }

    /// Distinct customer ids in ascending order
    pub fn customer_ids(&self) -> BTreeSet<i64> {
        self.records.iter().map(|r| r.customer_id).collect()
    }

    /// Convert a Polars frame with the five log columns into a dataset
    pub fn from_frame(df: &DataFrame) -> crate::Result<Self> {
        let customer = df.column("customer_id")?.cast(&DataType::Int64)?;
        let product = df.column("product_id")?.cast(&DataType::Int64)?;
        let category = df.column("product_category")?.cast(&DataType::String)?;
        let amount = df.column("purchase_amount")?.cast(&DataType::Float64)?;
        let date = df.column("purchase_date")?.cast(&DataType::String)?;

        let columns = customer
            .i64()?
            .into_iter()
            .zip(product.i64()?.into_iter())
            .zip(category.str()?.into_iter())
            .zip(amount.f64()?.into_iter())
            .zip(date.str()?.into_iter());

        let mut records = Vec::with_capacity(df.height());
        for (row, ((((customer_id, product_id), category), amount), date)) in columns.enumerate() {
            let missing = |field: &str| EngineError::InvalidRecord {
                row,
                reason: format!("{} is missing", field),
            };
            let date = date.ok_or_else(|| missing("purchase_date"))?;
            let purchase_date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|e| {
                EngineError::InvalidRecord {
                    row,
                    reason: format!("purchase_date '{}' is not a calendar date: {}", date, e),
                }
            })?;

            records.push(PurchaseRecord {
                customer_id: customer_id.ok_or_else(|| missing("customer_id"))?,
                product_id: product_id.ok_or_else(|| missing("product_id"))?,
                product_category: category
                    .ok_or_else(|| missing("product_category"))?
                    .to_string(),
                purchase_amount: amount.ok_or_else(|| missing("purchase_amount"))?,
                purchase_date,
            });
        }

        Ok(Self::new(records)?)
    }

    /// Polars view of the dataset with the dates rendered as `YYYY-MM-DD`
    pub fn to_frame(&self) -> crate::Result<DataFrame> {
        let df = df!(
            COLUMNS[0] => self.records.iter().map(|r| r.customer_id).collect::<Vec<_>>(),
            COLUMNS[1] => self.records.iter().map(|r| r.product_id).collect::<Vec<_>>(),
            COLUMNS[2] => self.records.iter().map(|r| r.product_category.clone()).collect::<Vec<_>>(),
            COLUMNS[3] => self.records.iter().map(|r| r.purchase_amount).collect::<Vec<_>>(),
            COLUMNS[4] => self
                .records
                .iter()
                .map(|r| r.purchase_date.format(DATE_FORMAT).to_string())
                .collect::<Vec<_>>()
        )?;
        Ok(df)
    }

    /// Write the dataset as a CSV purchase log
    pub fn write_csv(&self, file_path: &str) -> crate::Result<()> {
        let mut df = self.to_frame()?;
        let mut file = File::create(file_path)
            .map_err(|e| anyhow::anyhow!("failed to create {}: {}", file_path, e))?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }
}

/// Read the raw purchase log into a Polars frame
pub fn load_purchase_frame(file_path: &str) -> crate::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.into()))?
        .finish()?;

    for name in COLUMNS {
        if df.column(name).is_err() {
            anyhow::bail!("input {} is missing column '{}'", file_path, name);
        }
    }
    debug!(rows = df.height(), path = file_path, "purchase log read");
    Ok(df)
}

/// Load and validate a purchase log CSV
pub fn load_purchases(file_path: &str) -> crate::Result<PurchaseDataset> {
    let df = load_purchase_frame(file_path)?;
    let dataset = PurchaseDataset::from_frame(&df)?;
    info!(
        records = dataset.len(),
        customers = dataset.customer_ids().len(),
        "purchase dataset loaded"
    );
    Ok(dataset)
}

/// Behavioural features of one customer used for segmentation
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerAggregate {
    pub customer_id: i64,
    pub total_spent: f64,
    /// Number of purchases
    pub purchase_frequency: usize,
    /// Number of distinct categories bought from
    pub unique_categories: usize,
}

impl CustomerAggregate {
    /// Feature vector in the order [total_spent, purchase_frequency, unique_categories]
    pub fn features(&self) -> [f64; 3] {
        [
            self.total_spent,
            self.purchase_frequency as f64,
            self.unique_categories as f64,
        ]
    }
}

/// Aggregate purchases per customer, ordered by ascending customer id
pub fn aggregate_customers(dataset: &PurchaseDataset) -> Vec<CustomerAggregate> {
    let mut grouped: BTreeMap<i64, (f64, usize, BTreeSet<&str>)> = BTreeMap::new();
    for record in dataset.records() {
        let entry = grouped
            .entry(record.customer_id)
            .or_insert_with(|| (0.0, 0, BTreeSet::new()));
        entry.0 += record.purchase_amount;
        entry.1 += 1;
        entry.2.insert(record.product_category.as_str());
    }

    grouped
        .into_iter()
        .map(|(customer_id, (total_spent, purchase_frequency, categories))| CustomerAggregate {
            customer_id,
            total_spent,
            purchase_frequency,
            unique_categories: categories.len(),
        })
        .collect()
}

/// Category lookups used by content-based filtering
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    products_by_category: BTreeMap<String, BTreeSet<i64>>,
    categories_by_customer: BTreeMap<i64, BTreeSet<String>>,
}

impl CategoryIndex {
    pub fn build(dataset: &PurchaseDataset) -> Self {
        let mut index = Self::default();
        for record in dataset.records() {
            index
                .products_by_category
                .entry(record.product_category.clone())
                .or_default()
                .insert(record.product_id);
            index
                .categories_by_customer
                .entry(record.customer_id)
                .or_default()
                .insert(record.product_category.clone());
        }
        index
    }

    /// Categories the customer has bought from
    pub fn categories_of(&self, customer_id: i64) -> Result<&BTreeSet<String>, EngineError> {
        self.categories_by_customer
            .get(&customer_id)
            .ok_or(EngineError::InvalidCustomer { customer_id })
    }

    /// Every product ever sold under `category`
    pub fn products_in(&self, category: &str) -> Option<&BTreeSet<i64>> {
        self.products_by_category.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.products_by_category.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(customer_id: i64, product_id: i64, category: &str, amount: f64) -> PurchaseRecord {
        PurchaseRecord {
            customer_id,
            product_id,
            product_category: category.to_string(),
            purchase_amount: amount,
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customer_id,product_id,product_category,purchase_amount,purchase_date").unwrap();
        writeln!(file, "1,10,Electronics,120.50,2024-01-05").unwrap();
        writeln!(file, "1,11,Fashion,35.00,2024-02-11").unwrap();
        writeln!(file, "2,10,Electronics,99.99,2024-02-12").unwrap();
        writeln!(file, "1,10,Electronics,20.00,2024-03-01").unwrap();
        file
    }

    #[test]
    fn test_load_purchases() {
        let file = create_test_csv();
        let dataset = load_purchases(file.path().to_str().unwrap()).unwrap();

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.customer_ids().into_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(dataset.records()[1].product_category, "Fashion");
        assert_eq!(
            dataset.records()[2].purchase_date,
            NaiveDate::from_ymd_opt(2024, 2, 12).unwrap()
        );
        assert!((dataset.total_amount() - 275.49).abs() < 1e-9);
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customer_id,product_id,product_category,purchase_amount,purchase_date").unwrap();
        writeln!(file, "1,10,Electronics,120.50,yesterday").unwrap();

        let err = load_purchases(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::InvalidRecord { row: 0, .. })
        ));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customer_id,product_id,purchase_amount").unwrap();
        writeln!(file, "1,10,120.50").unwrap();

        assert!(load_purchases(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_dataset_validation() {
        assert_eq!(PurchaseDataset::new(vec![]).unwrap_err(), EngineError::EmptyDataset);

        let result = PurchaseDataset::new(vec![record(1, 1, "Fashion", 10.0), record(2, 1, "Fashion", 0.0)]);
        assert!(matches!(result, Err(EngineError::InvalidRecord { row: 1, .. })));

        let result = PurchaseDataset::new(vec![record(0, 1, "Fashion", 10.0)]);
        assert!(matches!(result, Err(EngineError::InvalidRecord { row: 0, .. })));
    }

    #[test]
    fn test_csv_round_trip_preserves_records() {
        let dataset = PurchaseDataset::new(vec![
            record(3, 7, "Home Goods", 15.25),
            record(4, 8, "Groceries", 42.0),
        ])
        .unwrap();
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        dataset.write_csv(path).unwrap();
        let reloaded = load_purchases(path).unwrap();
        assert_eq!(reloaded.records(), dataset.records());
    }

    #[test]
    fn test_aggregate_customers() {
        let dataset = PurchaseDataset::new(vec![
            record(2, 1, "Fashion", 10.0),
            record(1, 1, "Fashion", 5.0),
            record(2, 2, "Groceries", 20.0),
            record(2, 3, "Fashion", 30.0),
        ])
        .unwrap();

        let aggregates = aggregate_customers(&dataset);
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].customer_id, 1);
        assert_eq!(aggregates[1].customer_id, 2);
        assert_eq!(aggregates[1].purchase_frequency, 3);
        assert_eq!(aggregates[1].unique_categories, 2);
        assert_eq!(aggregates[1].features(), [60.0, 3.0, 2.0]);
    }

    #[test]
    fn test_category_index() {
        let dataset = PurchaseDataset::new(vec![
            record(1, 1, "Electronics", 10.0),
            record(2, 2, "Electronics", 10.0),
            record(2, 3, "Fashion", 10.0),
        ])
        .unwrap();

        let index = CategoryIndex::build(&dataset);
        let categories: Vec<_> = index.categories_of(1).unwrap().iter().cloned().collect();
        assert_eq!(categories, vec!["Electronics".to_string()]);
        assert_eq!(
            index.products_in("Electronics").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(index.categories().count(), 2);
        assert_eq!(
            index.categories_of(42).unwrap_err(),
            EngineError::InvalidCustomer { customer_id: 42 }
        );
    }
}
