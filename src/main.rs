use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use kolmogorov_flow::{config, generate_trajectory, GeneratedTrajectory, StepRegistry};
use log::{info, warn};
use std::path::PathBuf;

/// Generate one Kolmogorov flow trajectory and report per-output statistics.
#[derive(Parser, Debug)]
#[command(name = "kolmogorov-gen", version, about, long_about = None)]
struct Args {
    /// YAML generator config; defaults are used when omitted or missing.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    outer_steps: Option<usize>,
    #[arg(long)]
    warmup_steps: Option<usize>,
}

fn summarize(trajectory: &GeneratedTrajectory) {
    let Some(last) = trajectory.records.last() else {
        return;
    };
    for key in last.keys() {
        let count = trajectory.stream(*key).count();
        let Some(record) = trajectory.stream(*key).last() else {
            continue;
        };
        let energy = 0.5
            * (record.vx.map(|u| u * u).mean() + record.vy.map(|v| v * v).mean());
        let max_vorticity = record.vorticity.as_ref().map(|w| w.max_abs());
        info!(
            "{key}: {count} records, final energy {energy:.5}, max |vx| {:.4}, max |vy| {:.4}, max |w| {}",
            record.vx.max_abs(),
            record.vy.max_abs(),
            max_vorticity.map_or_else(|| "-".to_string(), |w| format!("{w:.4}"))
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => config::load(path)?,
        None => config::GeneratorConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if let Some(outer_steps) = args.outer_steps {
        cfg.outer_steps = outer_steps;
    }
    if let Some(warmup_steps) = args.warmup_steps {
        cfg.warmup_steps = warmup_steps;
    }

    let request = cfg.to_request()?;
    let registry = StepRegistry::default();
    let trajectory = generate_trajectory(&request, &registry)?;
    info!(
        "{} records in {:.3}s",
        trajectory.len(),
        trajectory.elapsed_seconds()
    );
    if let Err(err) = trajectory.check_finite() {
        warn!("{err}; regenerate with a smaller dt or another seed");
    }
    summarize(&trajectory);
    Ok(())
}
