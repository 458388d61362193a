//! Integration tests for BasketForge

use basketforge::model::{HIGH_SPENDERS, LOW_INFREQUENT_SPENDERS, FREQUENT_MEDIUM_SPENDERS};
use basketforge::synth::{generate_purchases, SynthConfig};
use basketforge::{
    cluster, load_purchases, recommend, segment_customers, ClusterConfig, EngineError,
    PipelineConfig, RecommendConfig, Recommender,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a test CSV file with sample data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "customer_id,product_id,product_category,purchase_amount,purchase_date"
    )
    .unwrap();

    // Customer 1 - two fashion items
    writeln!(file, "1,1,Fashion,45.00,2024-03-02").unwrap();
    writeln!(file, "1,2,Fashion,80.00,2024-03-09").unwrap();

    // Customer 2 - same basket plus an electronics item
    writeln!(file, "2,1,Fashion,50.00,2024-04-11").unwrap();
    writeln!(file, "2,2,Fashion,75.00,2024-04-12").unwrap();
    writeln!(file, "2,3,Electronics,640.00,2024-04-12").unwrap();

    // Customer 3 - electronics only
    writeln!(file, "3,3,Electronics,599.99,2024-05-30").unwrap();
    writeln!(file, "3,4,Electronics,120.00,2024-06-01").unwrap();

    // Customer 4 - single grocery purchase
    writeln!(file, "4,5,Groceries,12.40,2024-06-15").unwrap();

    file
}

fn load_test_dataset() -> (NamedTempFile, basketforge::PurchaseDataset) {
    let file = create_test_csv();
    let dataset = load_purchases(file.path().to_str().unwrap()).unwrap();
    (file, dataset)
}

#[test]
fn test_recommendation_pipeline_from_csv() {
    let (_file, dataset) = load_test_dataset();
    assert_eq!(dataset.len(), 8);

    let recs = recommend(&dataset, 1, 0.7, 0.3, 5, true, true).unwrap();
    assert!(!recs.is_empty());
    assert!(recs.len() <= 5);
    assert!(!recs.contains(&1) && !recs.contains(&2));
    // the closest neighbour bought product 3
    assert_eq!(recs[0], 3);
}

#[test]
fn test_content_only_recommendation_for_single_purchase_customer() {
    let (_file, dataset) = load_test_dataset();
    let recommender = Recommender::new(&dataset);
    let config = RecommendConfig {
        cf_enabled: false,
        ..RecommendConfig::default()
    };

    // customer 3 owns both electronics products, nothing left in category
    assert!(recommender.recommend(3, &config).unwrap().is_empty());
    // customer 4 owns the only grocery product
    assert!(recommender.recommend(4, &config).unwrap().is_empty());
    // customer 2 buys Fashion and Electronics; product 4 is the only unowned one
    assert_eq!(recommender.recommend(2, &config).unwrap(), vec![4]);
}

#[test]
fn test_unknown_customer_fails_everywhere() {
    let (_file, dataset) = load_test_dataset();

    let err = recommend(&dataset, 9999, 0.7, 0.3, 5, true, true).unwrap_err();
    assert_eq!(err, EngineError::InvalidCustomer { customer_id: 9999 });

    let assignments = segment_customers(
        &dataset,
        &ClusterConfig {
            k: 2,
            ..ClusterConfig::default()
        },
    )
    .unwrap();
    assert_eq!(
        assignments.segment_of(9999).unwrap_err(),
        EngineError::InvalidCustomer { customer_id: 9999 }
    );
}

#[test]
fn test_out_of_range_customer_is_rejected_before_work() {
    let config = PipelineConfig::default();
    assert_eq!(
        config.data.check_customer_id(501),
        Err(EngineError::InvalidRange {
            customer_id: 501,
            min: 1,
            max: 500
        })
    );
}

#[test]
fn test_segmentation_of_synthetic_log() {
    let dataset = generate_purchases(&SynthConfig {
        records: 1500,
        customers: 150,
        products: 30,
        seed: 3,
        reference_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        days: 365,
    })
    .unwrap();

    let segments = cluster(&dataset, 3, [1.5, 0.8, 1.0]).unwrap();
    assert_eq!(segments.len(), 150);

    let names: BTreeSet<&str> = segments.values().map(String::as_str).collect();
    let expected: BTreeSet<&str> = [HIGH_SPENDERS, FREQUENT_MEDIUM_SPENDERS, LOW_INFREQUENT_SPENDERS]
        .into_iter()
        .collect();
    assert_eq!(names, expected);
}

#[test]
fn test_segment_csv_output() {
    let (_file, dataset) = load_test_dataset();
    let assignments = segment_customers(
        &dataset,
        &ClusterConfig {
            k: 3,
            ..ClusterConfig::default()
        },
    )
    .unwrap();

    let output = NamedTempFile::new().unwrap();
    assignments.write_csv(output.path().to_str().unwrap()).unwrap();

    let written = std::fs::read_to_string(output.path()).unwrap();
    let mut lines = written.lines();
    assert_eq!(
        lines.next().unwrap(),
        "customer_id,total_spent,purchase_frequency,unique_categories,cluster,segment"
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 4);
    let first: Vec<&str> = rows[0].split(',').collect();
    assert_eq!(first[0], "1");
    assert!((first[1].parse::<f64>().unwrap() - 125.0).abs() < 1e-9);
    assert_eq!(&first[2..4], &["2", "1"]);
    assert_eq!(first[5], assignments.segment_of(1).unwrap().segment);

    let last: Vec<&str> = rows[3].split(',').collect();
    assert_eq!(last[0], "4");
    assert!((last[1].parse::<f64>().unwrap() - 12.4).abs() < 1e-9);
}

#[test]
fn test_recommendations_are_reproducible() {
    let dataset = generate_purchases(&SynthConfig {
        records: 800,
        customers: 80,
        products: 25,
        seed: 11,
        reference_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        days: 90,
    })
    .unwrap();

    let first = recommend(&dataset, 17, 0.7, 0.3, 5, true, true).unwrap();
    let second = recommend(&dataset, 17, 0.7, 0.3, 5, true, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
}
