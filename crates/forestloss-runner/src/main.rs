//! `forestloss`: estimate forest-cover loss within species ranges.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use forestloss_runner::{
    analyse, init_tracing, postprocess, rasterize, run, AssetList, PipelineConfig, PipelineContext,
    PipelineInputs, Result,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "forestloss")]
#[command(author, version, about = "Forest-cover loss within species ranges", long_about = None)]
struct Cli {
    /// Pipeline configuration (YAML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Continue an existing run instead of starting a new one
    #[arg(long, global = true)]
    run_id: Option<String>,

    /// Serve Prometheus metrics on this address
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true)]
    metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run rasterize, analyse and postprocess in order
    Run {
        /// GeoJSON range polygons, grouped by species
        #[arg(long)]
        ranges: PathBuf,
        /// Forest-dependency CSV
        #[arg(long)]
        attributes: PathBuf,
        /// Altitude limits CSV
        #[arg(long)]
        altitude: PathBuf,
        /// Generation lengths CSV
        #[arg(long)]
        generation_lengths: PathBuf,
        /// Combined output CSV
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rasterize and upload range masks
    Rasterize {
        /// GeoJSON range polygons, grouped by species
        #[arg(long)]
        ranges: PathBuf,
        /// Forest-dependency CSV
        #[arg(long)]
        attributes: PathBuf,
        /// First row to process; pass the saved `next_row` to resume an interrupted run
        #[arg(long, default_value = "0")]
        start_row: usize,
        /// Asset list to save after every chunk (defaults to the run's work directory)
        #[arg(long)]
        assets_out: Option<PathBuf>,
    },
    /// Compute areas for uploaded masks
    Analyse {
        /// Asset list saved by `rasterize` (defaults to the run's work directory)
        #[arg(long)]
        assets: Option<PathBuf>,
        /// Altitude limits CSV
        #[arg(long)]
        altitude: PathBuf,
    },
    /// Reconstruct series and write the combined output table
    Postprocess {
        /// Generation lengths CSV
        #[arg(long)]
        generation_lengths: PathBuf,
        /// Combined output CSV
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    #[cfg(feature = "prometheus")]
    if let Some(addr) = cli.metrics_addr {
        forestloss_metrics::install_prometheus(addr)
            .map_err(|e| forestloss_runner::PipelineError::Config(format!("metrics exporter: {e}")))?;
        info!(%addr, "serving metrics");
    }

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    let ctx = match cli.run_id {
        Some(run_id) => PipelineContext::with_run_id(config, run_id)?,
        None => PipelineContext::new(config)?,
    };

    match cli.command {
        Commands::Run {
            ranges,
            attributes,
            altitude,
            generation_lengths,
            output,
        } => {
            let inputs = PipelineInputs {
                ranges,
                attributes,
                altitude,
                generation_lengths,
                output,
            };
            let report = run(&ctx, &inputs)?;
            for failure in &report.failures {
                error!("{failure}");
            }
            for skipped in &report.postprocess.skipped {
                error!(key = %skipped.key, "{}", skipped.reason);
            }
        }
        Commands::Rasterize {
            ranges,
            attributes,
            start_row,
            assets_out,
        } => {
            let assets_out = assets_out.unwrap_or_else(|| ctx.asset_list_path());
            let list = rasterize(&ctx, &ranges, &attributes, start_row, &assets_out)?;
            info!(
                run_id = %ctx.run_id(),
                assets = list.assets.len(),
                next_row = list.next_row,
                path = %assets_out.display(),
                "saved asset list"
            );
        }
        Commands::Analyse { assets, altitude } => {
            let assets = assets.unwrap_or_else(|| ctx.asset_list_path());
            let list = AssetList::from_path(&assets)?;
            let summary = analyse(&ctx, &list.assets, &altitude)?;
            info!(
                run_id = %ctx.run_id(),
                completed = summary.completed().count(),
                failed = summary.failures().len(),
                "analyse finished"
            );
        }
        Commands::Postprocess {
            generation_lengths,
            output,
        } => {
            let summary = postprocess(&ctx, &generation_lengths, &output, None)?;
            for skipped in &summary.skipped {
                error!(key = %skipped.key, "{}", skipped.reason);
            }
        }
    }
    Ok(())
}
