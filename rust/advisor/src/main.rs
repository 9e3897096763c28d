//! Irrigation Recommendation System command-line front end.
//!
//! Runs one pass of the windowed iterator over a data file, logging every
//! minibatch, and optionally saves the cursor and writes a recommendation
//! report.
//!
//! # Usage
//!
//! ```bash
//! # Inspect the minibatches of a single-sensor field file
//! irs-advisor field.csv --depth1 6 --batch-size 4 --window 14
//!
//! # Resume from the last saved cursor and save it again afterwards
//! irs-advisor field.csv --checkpoint-name field --resume
//!
//! # Write a report for a predicted amount
//! irs-advisor field.csv --crop cotton --soil "Sandy Loam" --depth1 6 --depth2 12 --prediction 0.8
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use irrigation_core::{Advisor, IrsConfig, PrefetchingIterator, SensorDepths};

/// Irrigation Recommendation System
#[derive(Parser, Debug)]
#[command(name = "irs-advisor")]
#[command(about = "Windowed minibatch pass and irrigation report for a sensor data file")]
struct Args {
    /// Data file (relative paths resolve against storage.base_path)
    data: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Crop type for the report
    #[arg(long)]
    crop: Option<String>,

    /// Soil type for the report
    #[arg(long)]
    soil: Option<String>,

    /// Depth of sensor 1 in inches
    #[arg(long)]
    depth1: Option<f64>,

    /// Depth of sensor 2 in inches (-1 if not installed)
    #[arg(long, allow_hyphen_values = true)]
    depth2: Option<f64>,

    /// Depth of sensor 3 in inches (-1 if not installed)
    #[arg(long, allow_hyphen_values = true)]
    depth3: Option<f64>,

    /// Numeric columns per row; derived from the sensor depths when omitted
    #[arg(long, allow_hyphen_values = true)]
    columns: Option<i64>,

    /// Examples per minibatch
    #[arg(long, allow_hyphen_values = true)]
    batch_size: Option<i64>,

    /// Records per example
    #[arg(long, allow_hyphen_values = true)]
    window: Option<i64>,

    /// Predicted irrigation amount in inches for the report
    #[arg(long, allow_hyphen_values = true)]
    prediction: Option<f64>,

    /// Save the cursor under this name after the pass
    #[arg(long)]
    checkpoint_name: Option<String>,

    /// Resume from the newest cursor saved under --checkpoint-name
    #[arg(long, requires = "checkpoint_name")]
    resume: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => IrsConfig::from_file(path)?,
        None => IrsConfig::default(),
    }
    .with_env_overrides();

    if let Some(batch_size) = args.batch_size {
        config.iterator.batch_size = batch_size;
    }
    if let Some(window) = args.window {
        config.iterator.window_length = window;
    }

    let depths = match args.depth1 {
        Some(depth1) => Some(SensorDepths::new(depth1, args.depth2, args.depth3)?),
        None => None,
    };

    if let Some(columns) = args.columns {
        config.iterator.columns = columns;
    } else if let Some(depths) = &depths {
        config.iterator.columns = depths.column_count();
    }

    let advisor = Advisor::from_config(config)?;

    tracing::info!("Starting irrigation advisor");
    tracing::info!("  Data file: {}", args.data.display());
    tracing::info!("  Base path: {}", advisor.config().storage.base_path.display());

    let mut iter = advisor.open_dataset(&args.data)?;

    if args.resume {
        if let Some(name) = &args.checkpoint_name {
            if !advisor.resume_cursor(name, &mut iter)? {
                tracing::warn!("No checkpoint named '{}', starting from the beginning", name);
            }
        }
    }

    tracing::info!(
        "  Records: {}, columns: {}, batch size: {}, window: {}, batches: {}",
        iter.file_records(),
        iter.columns(),
        iter.batch(),
        iter.window_length(),
        iter.total_examples()
    );

    let mut prefetch = PrefetchingIterator::new(iter, &advisor.config().prefetch);
    let mut batches = 0u64;
    while let Some(batch) = prefetch.next_batch()? {
        tracing::info!(
            batch_index = batch.batch_index,
            offset = batch.offset,
            input = ?batch.input.shape(),
            labels = ?batch.labels.shape(),
            last_label = ?batch.last_label(),
            "minibatch"
        );
        batches += 1;
    }
    tracing::info!("Pass complete: {} minibatches", batches);

    if let Some(name) = &args.checkpoint_name {
        match prefetch.into_inner() {
            Some(iter) => {
                let path = advisor.save_cursor(name, &iter)?;
                tracing::info!("Cursor saved to {}", path.display());
            }
            None => tracing::error!("Iterator was lost, cursor not saved"),
        }
    }

    match (&args.crop, &args.soil) {
        (Some(crop), Some(soil)) => {
            let Some(depths) = depths else {
                return Err("--depth1 is required to write a report".into());
            };
            let amount = args.prediction.filter(|amount| *amount > 0.0);
            let path = advisor.recommend(crop, soil, depths, amount)?;
            println!("A recommendation report was generated and can be found at {}", path.display());
        }
        (None, None) => {}
        _ => return Err("--crop and --soil must be given together".into()),
    }

    Ok(())
}
