//! BasketForge: segmentation and recommendation pipeline over a purchase log
//!
//! Orchestrates data loading, the requested analysis stages and their output.

use anyhow::Result;
use basketforge::{
    analysis, model, synth, viz, Args, CustomerFeatures, PipelineConfig, PurchaseDataset,
    Recommender,
};
use clap::Parser;
use std::path::Path;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .compact()
        .init();
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.resolve_config()?;
    let customer_id = args.customer_id();
    config.data.check_customer_id(customer_id)?;

    if args.generate {
        let dataset = synth::generate_purchases(&synth::SynthConfig::default())?;
        dataset.write_csv(&config.data.input)?;
        println!("Synthetic purchase log written to: {}", config.data.input);
    }

    if !args.any_stage() {
        if !args.generate {
            println!("No stage selected. Use --all or one of --data-analysis, --plot, --compute-wcss, --apply-kmeans, --recommendation.");
        }
        return Ok(());
    }

    let start_time = Instant::now();
    let dataset = basketforge::load_purchases(&config.data.input)?;

    if args.runs_data_analysis() {
        println!("\nRunning Data Analysis...");
        analysis::basic_analysis(&dataset)?.print();
    }

    if args.runs_plot() || args.runs_compute_wcss() || args.runs_apply_kmeans() {
        run_segmentation_stages(&args, &config, &dataset)?;
    }

    if args.runs_recommendation() {
        run_recommendation(&args, &config, &dataset, customer_id)?;
    }

    info!(elapsed_s = start_time.elapsed().as_secs_f64(), "pipeline complete");
    Ok(())
}

/// Plot, elbow and K-Means stages, which share the scaled customer features
fn run_segmentation_stages(args: &Args, config: &PipelineConfig, dataset: &PurchaseDataset) -> Result<()> {
    let features = CustomerFeatures::from_dataset(dataset)?;
    let plot_dir = Path::new(&config.data.plot_dir);

    if args.runs_plot() {
        println!("\nRunning Plotting...");
        viz::plot_customer_features(&features, &plot_dir.join("customer_data.png"))?;
    }

    if args.runs_compute_wcss() {
        println!("\nComputing WCSS...");
        let wcss = model::compute_wcss(&features, &config.clustering)?;
        for (k, inertia) in &wcss {
            println!("  k = {:2}: WCSS = {:.2}", k, inertia);
        }
        viz::plot_elbow(&wcss, &plot_dir.join("elbow.png"))?;
    }

    if args.runs_apply_kmeans() {
        println!("\nApplying KMeans...");
        let assignments = model::segment_features(&features, &config.clustering)?;
        assignments.write_csv(&config.data.segments_output)?;
        println!(
            "K-Means clustering completed! Results saved to '{}'.",
            config.data.segments_output
        );
        viz::print_segment_statistics(&assignments);

        println!("\nPlotting Clusters...");
        viz::plot_segments(&assignments, &plot_dir.join("customer_segments.png"))?;
    }

    Ok(())
}

fn run_recommendation(
    args: &Args,
    config: &PipelineConfig,
    dataset: &PurchaseDataset,
    customer_id: i64,
) -> Result<()> {
    println!("\nRunning Recommendation Engine...");
    if args.customer_id.is_some() {
        println!("Running with Customer ID: {}", customer_id);
    } else {
        println!(
            "Running with Customer ID: {} (assuming customer ID = 1 as no customer ID was provided)",
            customer_id
        );
    }

    let settings = &config.recommendation;
    let recommender = Recommender::new(dataset);
    let ranked = recommender.recommend_scored(customer_id, settings)?;

    let method = match (settings.cf_enabled, settings.cb_enabled) {
        (true, true) => "Collaborative and Content Based",
        (true, false) => "Collaborative",
        (false, true) => "Content Based",
        (false, false) => "(no scorer enabled)",
    };
    println!(
        "Top {} {} Recommendations for Customer {}:",
        settings.top_n, method, customer_id
    );
    let product_ids: Vec<i64> = ranked.iter().map(|p| p.product_id).collect();
    println!("{:?}", product_ids);

    if args.verbose {
        for product in &ranked {
            println!(
                "  product {:>4}: score {:>10.2} (cf {:.2}, cb {:.0})",
                product.product_id, product.score, product.cf_score, product.cb_score
            );
        }
    }
    Ok(())
}
