use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bo_data::{AnalysisConfig, ProcessedStorage};
use bo_preprocess::{PreprocessConfig, Preprocessor};
use bo_stats::{
    load_statistics, render_summary, summarize, ConvergenceTable, HighestFidelity, Quantity,
};
use bo_types::Measure;

#[derive(Parser)]
#[command(name = "bo-analyze")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Preprocess and analyze Bayesian-optimization experiment runs")]
struct Cli {
    /// Analysis config file (JSON); falls back to $BO_ANALYSIS_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess a directory of raw results files into the processed store
    Preprocess {
        /// Directory of raw results files
        input: PathBuf,

        /// Experiment name the runs are stored under
        #[arg(short, long)]
        experiment: String,

        /// Also compute convergence of the best acquisition
        #[arg(long)]
        best_acq: bool,
    },

    /// Describe convergence per setup and strategy for an experiment group
    Summary {
        /// Experiment group from the config
        group: String,

        /// Tolerance level to evaluate
        #[arg(short, long)]
        tolerance: f64,

        /// Highest fidelity of the runs to include (uhf, hf)
        #[arg(long, default_value = "uhf")]
        highest_fidelity: HighestFidelity,

        /// Write the convergence table to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Fit convergence against secondary initial data, per experiment
    Trend {
        group: String,

        #[arg(short, long)]
        tolerance: f64,
    },

    /// List runs that did not converge
    NonConverged {
        group: String,

        #[arg(short, long)]
        tolerance: f64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AnalysisConfig::resolve(cli.config.as_deref()).context("Failed to load analysis config")?;

    match cli.command {
        Commands::Preprocess {
            input,
            experiment,
            best_acq,
        } => preprocess(&config, input, &experiment, best_acq),
        Commands::Summary {
            group,
            tolerance,
            highest_fidelity,
            csv,
        } => summary(&config, &group, tolerance, highest_fidelity, csv),
        Commands::Trend { group, tolerance } => trend(&config, &group, tolerance),
        Commands::NonConverged { group, tolerance } => non_converged(&config, &group, tolerance),
    }
}

fn preprocess(config: &AnalysisConfig, input: PathBuf, experiment: &str, best_acq: bool) -> anyhow::Result<()> {
    let mut preprocess_config = PreprocessConfig::new(config.tolerances.clone());
    if let Some(cost) = config.init_cost_for(experiment) {
        preprocess_config = preprocess_config.with_init_data_cost(cost.to_vec());
    }
    if best_acq {
        preprocess_config = preprocess_config.with_measures(vec![Measure::Gmp, Measure::BestAcq]);
    }

    let preprocessor = Preprocessor::new(preprocess_config)?;
    let storage = ProcessedStorage::new(config.processed_root())?;
    let report = preprocessor
        .preprocess_directory(&input, &storage, experiment)
        .with_context(|| format!("Failed to preprocess {}", input.display()))?;

    println!("Stored {} runs under {}", report.stored.len(), experiment);
    for name in &report.indeterminate {
        println!("  indeterminate: {name}");
    }
    for (path, error) in &report.failed {
        println!("  failed: {} ({error})", path.display());
    }
    if !report.is_clean() {
        bail!("{} results files could not be preprocessed", report.failed.len());
    }
    Ok(())
}

fn group_table(config: &AnalysisConfig, group: &str, tolerance: f64) -> anyhow::Result<ConvergenceTable> {
    let (experiments, baselines) = config.group_dirs(group)?;
    let runs = load_statistics(&baselines, &experiments, config.num_experiments)
        .with_context(|| format!("Failed to load runs of group {group}"))?;
    Ok(ConvergenceTable::build(&runs, tolerance)?)
}

fn summary(
    config: &AnalysisConfig,
    group: &str,
    tolerance: f64,
    highest_fidelity: HighestFidelity,
    csv: Option<PathBuf>,
) -> anyhow::Result<()> {
    let table = group_table(config, group, tolerance)?.filter_highest_fidelity(highest_fidelity);

    for quantity in [
        Quantity::Iterations,
        Quantity::HighestFidelityIterations,
        Quantity::CpuTimeHours,
        Quantity::Observations,
    ] {
        println!("{}", render_summary(&summarize(&table, quantity), quantity));
    }

    if let Some(path) = csv {
        table
            .write_csv(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn trend(config: &AnalysisConfig, group: &str, tolerance: f64) -> anyhow::Result<()> {
    let root = config.processed_root();

    for (experiment, baselines) in config.group(group)? {
        let baseline_dirs: Vec<PathBuf> = baselines.iter().take(1).map(|b| root.join(b)).collect();
        let runs = load_statistics(&baseline_dirs, &[root.join(experiment)], config.num_experiments)
            .with_context(|| format!("Failed to load runs of {experiment}"))?;
        let table = ConvergenceTable::build(&runs, tolerance)?;

        println!("{experiment}");
        for quantity in [Quantity::Iterations, Quantity::TotalTimeSeconds] {
            let trend = table.trend(quantity);
            match trend.fit {
                Some(fit) => println!(
                    "  {}: slope {:.4}, intercept {:.2}",
                    quantity.label(),
                    fit.slope,
                    fit.intercept
                ),
                None => println!("  {}: not enough distinct initpts for a fit", quantity.label()),
            }
            for mean in &trend.means {
                println!("    initpts {:>4}: {:.2} (n = {})", mean.x, mean.mean, mean.count);
            }
        }
    }
    Ok(())
}

fn non_converged(config: &AnalysisConfig, group: &str, tolerance: f64) -> anyhow::Result<()> {
    let table = group_table(config, group, tolerance)?;
    let rows = table.non_converged();

    println!("{} of {} runs did not converge at tolerance {}", rows.len(), table.rows.len(), tolerance);
    for row in rows {
        println!("  {}", row.name);
    }
    Ok(())
}
