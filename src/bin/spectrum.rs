//! Broadens stored pole/weight records onto a frequency grid.
//!
//! Every record is broadened on its own and the spectra are averaged with equal
//! weight, which is the seed average of the finite-temperature estimate.
use anyhow::{Context, Result, anyhow, ensure};
use clap::Parser;
use ftlm_spectra::{
    algorithms::{broaden, cumulative_weight, linspace, trapezoid},
    utils::output::{PolesWeightsRecord, write_csv},
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "spectrum",
    about = "Broadens pole/weight records with a Gaussian and averages them."
)]
struct SpectrumArgs {
    /// Pole/weight records written by `poles_weights`.
    #[clap(required = true)]
    records: Vec<PathBuf>,
    #[clap(long, default_value_t = -1.0, allow_negative_numbers = true)]
    omega_min: f64,
    #[clap(long, default_value_t = 5.0, allow_negative_numbers = true)]
    omega_max: f64,
    #[clap(long, default_value_t = 1001)]
    n_omega: usize,
    /// Width of the Gaussian kernel.
    #[clap(long, default_value_t = 0.05)]
    eta: f64,
    /// Output CSV with columns `omega,intensity`.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
    /// Optional CSV with the cumulative weight over the merged, sorted poles.
    #[clap(long, value_name = "PATH")]
    cumulative: Option<PathBuf>,
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct SpectrumRow {
    omega: f64,
    intensity: f64,
}

#[derive(Debug, Serialize)]
struct CumulativeRow {
    pole: f64,
    cumulative_weight: f64,
}

fn main() -> Result<()> {
    let args = SpectrumArgs::parse();
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
    ensure!(args.n_omega > 1, "frequency grid needs at least two points");

    let records = args
        .records
        .iter()
        .map(|path| PolesWeightsRecord::read(path).with_context(|| format!("Failed to read {path:?}")))
        .collect::<Result<Vec<_>>>()?;
    let n_records = records.len() as f64;

    let omegas = linspace(args.omega_min, args.omega_max, args.n_omega);
    let mut intensity = vec![0.0; omegas.len()];
    for record in &records {
        log::debug!(
            "T {} seed {:?}: {} poles, Z {}",
            record.temperature,
            record.seed,
            record.poles.len(),
            record.partition
        );
        let spectrum = broaden(&record.poles, &record.weights, &omegas, args.eta)?;
        for (acc, s) in intensity.iter_mut().zip(spectrum) {
            *acc += s / n_records;
        }
    }

    let area = trapezoid(&omegas, &intensity);
    let total: f64 = records.iter().flat_map(|r| &r.weights).sum::<f64>() / n_records;
    log::info!("spectral weight on grid: {area:.6}, total weight: {total:.6}");

    let rows: Vec<SpectrumRow> = omegas
        .iter()
        .zip(&intensity)
        .map(|(&omega, &intensity)| SpectrumRow { omega, intensity })
        .collect();
    write_csv(&args.output, &rows)?;
    log::info!("wrote {:?}", args.output);

    if let Some(path) = &args.cumulative {
        let mut merged: Vec<(f64, f64)> = records
            .iter()
            .flat_map(|r| r.poles.iter().zip(&r.weights).map(|(&p, &w)| (p, w / n_records)))
            .collect();
        merged.sort_by(|a, b| a.0.total_cmp(&b.0));
        let weights: Vec<f64> = merged.iter().map(|(_, w)| *w).collect();
        let rows: Vec<CumulativeRow> = merged
            .iter()
            .zip(cumulative_weight(&weights))
            .map(|(&(pole, _), cumulative_weight)| CumulativeRow {
                pole,
                cumulative_weight,
            })
            .collect();
        write_csv(path, &rows)?;
        log::info!("wrote {path:?}");
    }
    Ok(())
}
