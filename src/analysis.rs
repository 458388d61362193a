//! Descriptive sales statistics computed with Polars lazy aggregations

use crate::data::PurchaseDataset;
use polars::prelude::*;

/// Headline numbers for the `data_analysis` stage
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummary {
    /// Up to 10 (product_id, revenue), best selling first
    pub top_products: Vec<(i64, f64)>,
    /// Up to 3 (category, revenue), best selling first
    pub top_categories: Vec<(String, f64)>,
    pub average_spend_per_customer: f64,
}

impl SalesSummary {
    pub fn print(&self) {
        let products: Vec<i64> = self.top_products.iter().map(|(id, _)| *id).collect();
        println!("Top {} selling products' product_id:", products.len());
        println!("{:?}", products);

        let categories: Vec<&str> = self.top_categories.iter().map(|(c, _)| c.as_str()).collect();
        println!("\nTop-selling categories:");
        println!("{:?}", categories);

        println!(
            "\nAverage spending per customer: ${:.2}",
            self.average_spend_per_customer
        );
    }
}

/// Revenue leaders and average spend. Revenue ties rank by ascending key.
pub fn basic_analysis(dataset: &PurchaseDataset) -> crate::Result<SalesSummary> {
    let df = dataset.to_frame()?;

    let top_products = revenue_by(&df, "product_id", 10)?;
    let product_ids = top_products.column("product_id")?.cast(&DataType::Int64)?;
    let revenue = top_products.column("revenue")?;
    let top_products: Vec<(i64, f64)> = product_ids
        .i64()?
        .into_no_null_iter()
        .zip(revenue.f64()?.into_no_null_iter())
        .collect();

    let top_categories = revenue_by(&df, "product_category", 3)?;
    let names = top_categories.column("product_category")?;
    let revenue = top_categories.column("revenue")?;
    let top_categories: Vec<(String, f64)> = names
        .str()?
        .into_no_null_iter()
        .map(str::to_string)
        .zip(revenue.f64()?.into_no_null_iter())
        .collect();

    let per_customer = df
        .lazy()
        .group_by([col("customer_id")])
        .agg([col("purchase_amount")
            .cast(DataType::Float64)
            .sum()
            .alias("spent")])
        .select([col("spent").mean()])
        .collect()?;
    let average_spend_per_customer = per_customer.column("spent")?.f64()?.get(0).unwrap_or(0.0);

    Ok(SalesSummary {
        top_products,
        top_categories,
        average_spend_per_customer,
    })
}

fn revenue_by(df: &DataFrame, key: &str, limit: u32) -> crate::Result<DataFrame> {
    let ranked = df
        .clone()
        .lazy()
        .group_by([col(key)])
        .agg([col("purchase_amount")
            .cast(DataType::Float64)
            .sum()
            .alias("revenue")])
        .sort(
            ["revenue", key],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(limit)
        .collect()?;
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PurchaseRecord;
    use chrono::NaiveDate;

    fn purchase(customer_id: i64, product_id: i64, category: &str, amount: f64) -> PurchaseRecord {
        PurchaseRecord {
            customer_id,
            product_id,
            product_category: category.to_string(),
            purchase_amount: amount,
            purchase_date: NaiveDate::from_ymd_opt(2024, 9, 9).unwrap(),
        }
    }

    #[test]
    fn test_basic_analysis() {
        let dataset = PurchaseDataset::new(vec![
            purchase(1, 4, "Fashion", 50.0),
            purchase(1, 2, "Electronics", 300.0),
            purchase(2, 4, "Fashion", 60.0),
            purchase(2, 3, "Groceries", 10.0),
            purchase(3, 5, "Stationary", 10.0),
            purchase(3, 1, "Home Goods", 70.0),
        ])
        .unwrap();

        let summary = basic_analysis(&dataset).unwrap();
        assert_eq!(
            summary.top_products.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![2, 4, 1, 3, 5]
        );
        assert!((summary.top_products[1].1 - 110.0).abs() < 1e-9);
        assert_eq!(
            summary.top_categories.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(),
            vec!["Electronics", "Fashion", "Home Goods"]
        );
        // (350 + 70 + 80) / 3
        assert!((summary.average_spend_per_customer - 500.0 / 3.0).abs() < 1e-9);
    }
}
