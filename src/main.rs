//! CLI entry point for the transit access rater.
//!
//! Provides subcommands for scoring every road segment of a study area and
//! for exporting the walking isochrones behind those scores.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_access_rater::{
    config::ScoringConfig,
    input::InputPaths,
    network::compute_isochrones,
    output::{print_json, write_isochrones_geojson, write_scores_csv, write_scores_geojson},
    pipeline::{PipelineInputs, prepare_study_area, run_pipeline},
    scoring::apply_presentation,
};

#[derive(Parser)]
#[command(name = "transit_access_rater")]
#[command(about = "Scores road segments by walking access to transit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every road segment of the study area
    Run {
        /// Directory holding the schedule, stops, walk network and road files
        #[arg(short = 'd', long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory to write the score table to
        #[arg(short, long, default_value = "data/output")]
        output_dir: PathBuf,

        /// Feed tag prefixed to stop ids of the facility tables (e.g., "mbta")
        #[arg(short, long)]
        tag: Option<String>,

        /// Optional: JSON file overriding scoring constants
        #[arg(short, long)]
        config: Option<String>,

        /// Add the rescaled Transit_score column
        #[arg(long, default_value_t = false)]
        normalize: bool,
    },
    /// Compute the walking isochrones and write them as GeoJSON
    Isochrones {
        /// Directory holding the schedule, stops, walk network and road files
        #[arg(short = 'd', long, default_value = "data")]
        data_dir: PathBuf,

        /// GeoJSON file to write
        #[arg(short, long, default_value = "data/output/isochrones.geojson")]
        output: PathBuf,

        /// Optional: JSON file overriding scoring constants
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/transit_access_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_access_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data_dir,
            output_dir,
            tag,
            config,
            normalize,
        } => {
            let config = load_config(config.as_deref())?;
            let inputs = PipelineInputs::load(&InputPaths::under(&data_dir), tag.as_deref())?;
            let mut output = run_pipeline(&inputs, &config)?;

            if normalize {
                apply_presentation(&mut output.rows, &config);
            }

            write_scores_csv(&output_dir.join("bus_rail_score.csv"), &output.rows)?;
            write_scores_geojson(
                &output_dir.join("bus_rail_score.geojson"),
                &output.rows,
                &output.study_area.roads,
                &output.study_area.projection,
            )?;
            print_json(&output.summary)?;
        }
        Commands::Isochrones {
            data_dir,
            output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let inputs = PipelineInputs::load(&InputPaths::under(&data_dir), None)?;
            let study_area = prepare_study_area(&inputs, &config)?;
            let sets = compute_isochrones(&study_area.in_scope, &study_area.graph, &config);

            write_isochrones_geojson(&output, &sets, &study_area.projection)?;
        }
    }

    Ok(())
}

/// Loads scoring constants from `path`, or the defaults when none is given.
fn load_config(path: Option<&str>) -> Result<ScoringConfig> {
    match path {
        Some(path) => {
            let config = ScoringConfig::load(path)?;
            info!(path, "Scoring config loaded");
            Ok(config)
        }
        None => Ok(ScoringConfig::default()),
    }
}
