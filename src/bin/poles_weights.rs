//! Computes finite-temperature poles and weights for every combination of seed,
//! recursion length, temperature and cutoff, and stores each set as a JSON record.
mod common;

use anyhow::{Context, Result};
use clap::Parser;
use common::CommonArgs;
use ftlm_spectra::{
    algorithms::AssemblyOptions,
    pipeline::FtlmInput,
    utils::output::{PolesWeightsRecord, descriptive_filename},
};

#[derive(Parser, Debug)]
#[clap(
    name = "poles-weights",
    about = "Assembles finite-temperature poles and spectral weights from per-sector Lanczos data."
)]
struct PolesWeightsArgs {
    #[clap(flatten)]
    common: CommonArgs,

    /// Temperatures to evaluate.
    #[clap(long, value_delimiter = ',', required = true)]
    temperatures: Vec<f64>,

    /// Weights with magnitude at or below a cutoff are dropped.
    #[clap(long, value_delimiter = ',', default_value = "1e-12")]
    cutoffs: Vec<f64>,

    /// Recursion lengths to cut the Lanczos data to. The full recursion if omitted.
    #[clap(long, value_delimiter = ',')]
    niters: Vec<usize>,

    /// Prefix of the output file names.
    #[clap(long, default_value = "poles_weights")]
    prefix: String,
}

fn main() -> Result<()> {
    let args = PolesWeightsArgs::parse();
    args.common.init_logging()?;
    args.common.prepare_output_dir()?;
    let ensemble = args.common.load_ensemble()?;
    let tags = args.common.tags();

    let niters: Vec<Option<usize>> = if args.niters.is_empty() {
        vec![None]
    } else {
        args.niters.iter().copied().map(Some).collect()
    };

    for &seed in &args.common.seeds {
        log::info!("seed {seed}");
        let source = args.common.source_for_seed(seed);
        let full = FtlmInput::load(&ensemble, &source, &tags)
            .with_context(|| format!("Failed to load sector data for seed {seed}"))?;

        for &niter in &niters {
            let input = match niter {
                Some(n) => full.with_recursion_length(n)?,
                None => full.clone(),
            };
            for &temperature in &args.temperatures {
                log::info!("seed {seed}, niter {niter:?}, T {temperature}");
                let untruncated = input.spectral_weights(&AssemblyOptions::at_temperature(temperature))?;

                for &cutoff in &args.cutoffs {
                    let mut spectral = untruncated.clone();
                    spectral.truncate(cutoff);
                    log::info!("npoles ({cutoff:.1e}): {}", spectral.len());

                    let mut record = PolesWeightsRecord::new(temperature, &spectral);
                    record.seed = Some(seed);
                    record.cutoff = Some(cutoff);
                    record.recursion_length = niter;

                    let niter_label = niter.map_or_else(|| "full".to_string(), |n| n.to_string());
                    let name = descriptive_filename(
                        &args.prefix,
                        &[
                            ("T", &temperature),
                            ("cutoff", &cutoff),
                            ("niter", &niter_label),
                            ("seed", &seed),
                        ],
                        "json",
                    );
                    let path = args.common.output_dir.join(name);
                    record
                        .write(&path)
                        .with_context(|| format!("Failed to write {path:?}"))?;
                }
            }
        }
    }

    log::info!("done");
    Ok(())
}
