//! Thermodynamics from the T-recursions: partition function, energy, energy² and
//! specific heat on a temperature grid, averaged over seeds.
mod common;

use anyhow::{Result, ensure};
use clap::{Parser, ValueEnum};
use common::CommonArgs;
use ftlm_spectra::{
    algorithms::{MomentsRow, average_over_seeds, linspace},
    pipeline::ThermodynamicsInput,
    utils::output::{descriptive_filename, write_csv},
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum GridKind {
    Linear,
    Log,
}

#[derive(Parser, Debug)]
#[clap(
    name = "moments",
    about = "Computes thermodynamic moments from per-sector Lanczos data."
)]
struct MomentsArgs {
    #[clap(flatten)]
    common: CommonArgs,
    #[clap(long, default_value_t = 0.01)]
    t_min: f64,
    #[clap(long, default_value_t = 10.0)]
    t_max: f64,
    #[clap(long, default_value_t = 200)]
    n_temperatures: usize,
    #[clap(long, value_enum, default_value_t = GridKind::Log)]
    grid: GridKind,
    /// Also write the moments of every seed separately.
    #[clap(long)]
    per_seed: bool,
}

fn temperature_grid(args: &MomentsArgs) -> Result<Vec<f64>> {
    ensure!(
        args.t_min > 0.0 && args.t_max >= args.t_min,
        "temperature range must satisfy 0 < t_min <= t_max"
    );
    ensure!(args.n_temperatures > 0, "temperature grid is empty");
    Ok(match args.grid {
        GridKind::Linear => linspace(args.t_min, args.t_max, args.n_temperatures),
        GridKind::Log => linspace(args.t_min.ln(), args.t_max.ln(), args.n_temperatures)
            .into_iter()
            .map(f64::exp)
            .collect(),
    })
}

fn main() -> Result<()> {
    let args = MomentsArgs::parse();
    args.common.init_logging()?;
    args.common.prepare_output_dir()?;
    let ensemble = args.common.load_ensemble()?;
    let tags = args.common.tags();
    let temperatures = temperature_grid(&args)?;

    let mut runs = Vec::with_capacity(args.common.seeds.len());
    for &seed in &args.common.seeds {
        log::info!("seed {seed}");
        let source = args.common.source_for_seed(seed);
        let input = ThermodynamicsInput::load(&ensemble, &source, &tags)?;
        let raw = input.moments(&temperatures)?;

        if args.per_seed {
            let rows: Vec<MomentsRow> = raw.iter().map(|m| m.normalized()).collect();
            let name = descriptive_filename("moments", &[("seed", &seed)], "csv");
            write_csv(args.common.output_dir.join(name), &rows)?;
        }
        runs.push(raw);
    }

    let rows: Vec<MomentsRow> = average_over_seeds(&runs)?
        .iter()
        .map(|m| m.normalized())
        .collect();
    let name = descriptive_filename("moments", &[("nseeds", &runs.len())], "csv");
    let path = args.common.output_dir.join(name);
    write_csv(&path, &rows)?;
    log::info!("wrote {path:?}");
    Ok(())
}
