//! Charts for the plot, elbow and segmentation stages using Plotters

use crate::model::{ClusterAssignments, CustomerFeatures};
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 5] = [BLUE, RED, GREEN, MAGENTA, CYAN];

fn cluster_color(cluster: usize) -> RGBColor {
    CLUSTER_COLORS.get(cluster).copied().unwrap_or(BLACK)
}

/// Marker radius encoding a customer's category breadth
pub fn marker_size(unique_categories: usize) -> i32 {
    3 + 2 * unique_categories.min(6) as i32
}

/// Value range of `values` widened by 5% on each side
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad)..(max + pad)
}

/// Scatter of every customer's total spend against purchase count,
/// marker size showing unique categories
pub fn plot_customer_features(features: &CustomerFeatures, output_path: &Path) -> crate::Result<()> {
    let points: Vec<(f64, f64, i32)> = features
        .aggregates
        .iter()
        .map(|a| {
            (
                a.total_spent,
                a.purchase_frequency as f64,
                marker_size(a.unique_categories),
            )
        })
        .collect();

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Data Exploration", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(
            padded_range(points.iter().map(|p| p.0)),
            padded_range(points.iter().map(|p| p.1)),
        )?;

    chart
        .configure_mesh()
        .x_desc("Total Spent")
        .y_desc("Purchase Frequency (marker size: Unique Categories)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|&(x, y, size)| Circle::new((x, y), size, BLUE.mix(0.5).filled())),
    )?;

    root.present()?;
    println!("Customer scatter saved to: {}", output_path.display());
    Ok(())
}

/// Elbow chart of within-cluster sum of squares per k
pub fn plot_elbow(wcss: &[(usize, f64)], output_path: &Path) -> crate::Result<()> {
    let max_k = wcss.iter().map(|(k, _)| *k).max().unwrap_or(1) as f64;

    let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Elbow Method for Optimal k", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.5f64..(max_k + 0.5), padded_range(wcss.iter().map(|p| p.1)))?;

    chart
        .configure_mesh()
        .x_desc("Number of Clusters")
        .y_desc("WCSS")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let points: Vec<(f64, f64)> = wcss.iter().map(|&(k, w)| (k as f64, w)).collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, BLUE.filled())))?;

    root.present()?;
    println!("Elbow chart saved to: {}", output_path.display());
    Ok(())
}

/// Spend vs frequency scatter colored by segment, sized by unique categories
pub fn plot_segments(assignments: &ClusterAssignments, output_path: &Path) -> crate::Result<()> {
    let rows = assignments.rows();

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Segmentation (KMEANS)", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(
            padded_range(rows.iter().map(|r| r.aggregate.total_spent)),
            padded_range(rows.iter().map(|r| r.aggregate.purchase_frequency as f64)),
        )?;

    chart
        .configure_mesh()
        .x_desc("Total Spent")
        .y_desc("Purchase Frequency (marker size: Unique Categories)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for cluster in 0..assignments.n_clusters() {
        let members: Vec<_> = rows.iter().filter(|r| r.cluster == cluster).collect();
        let Some(first) = members.first() else {
            continue;
        };
        let color = cluster_color(cluster);
        chart
            .draw_series(members.iter().map(|r| {
                Circle::new(
                    (r.aggregate.total_spent, r.aggregate.purchase_frequency as f64),
                    marker_size(r.aggregate.unique_categories),
                    color.mix(0.5).filled(),
                )
            }))?
            .label(first.segment.clone())
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    println!("Segment plot saved to: {}", output_path.display());
    Ok(())
}

/// Print segment statistics to console
pub fn print_segment_statistics(assignments: &ClusterAssignments) {
    let total = assignments.rows().len();
    println!("\n=== Segment Statistics ===");
    println!("Number of clusters: {}", assignments.n_clusters());
    println!("Total customers: {}", total);
    println!("Within-cluster sum of squares (Inertia): {:.2}", assignments.inertia());

    println!("\nSegment sizes:");
    for (segment, size) in assignments.segment_sizes() {
        let percentage = (size as f64 / total as f64) * 100.0;
        println!("  {}: {} customers ({:.1}%)", segment, size, percentage);
    }
}
