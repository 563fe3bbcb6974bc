//! Command-line arguments and setup shared by the runners that read sector data.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use ftlm_spectra::{
    Ensemble, EnsembleSpec, pipeline::RecursionTags, utils::data_source::DirectorySource,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct CommonArgs {
    /// Directory with one JSON file per sector. `{seed}` is replaced by the seed.
    #[clap(long, value_name = "PATH")]
    pub data_dir: String,

    /// Sector file name; `{0}`, `{1}`, ... are the parts of the block label and
    /// `{seed}` the seed.
    #[clap(long, default_value = "sector.{0}.{1}.json")]
    pub file_template: String,

    /// JSON file describing the ensemble of blocks.
    #[clap(long, value_name = "PATH")]
    pub ensemble: PathBuf,

    /// Directory the results are written to. Created if missing.
    #[clap(long, value_name = "PATH")]
    pub output_dir: PathBuf,

    /// Seeds of the random starting vectors.
    #[clap(long, value_delimiter = ',', default_value = "1")]
    pub seeds: Vec<u64>,

    /// Ignore the Hilbert-space dimension of the blocks.
    #[clap(long)]
    pub no_dims: bool,

    /// Log per-block details.
    #[clap(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn init_logging(&self) -> Result<()> {
        let level = if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_level(level)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logger: {}", e))
    }

    pub fn load_ensemble(&self) -> Result<Ensemble> {
        let text = std::fs::read_to_string(&self.ensemble)
            .with_context(|| format!("Failed to read ensemble file {:?}", self.ensemble))?;
        let spec: EnsembleSpec = serde_json::from_str(&text)
            .with_context(|| format!("Invalid ensemble description in {:?}", self.ensemble))?;
        let ensemble = spec.build()?;
        log::info!(
            "ensemble: {} blocks, total degeneracy {}",
            ensemble.len(),
            ensemble.total_degeneracy()
        );
        Ok(ensemble)
    }

    pub fn source_for_seed(&self, seed: u64) -> DirectorySource {
        let seed = seed.to_string();
        DirectorySource::new(
            self.data_dir.replace("{seed}", &seed),
            self.file_template.replace("{seed}", &seed),
        )
    }

    pub fn tags(&self) -> RecursionTags {
        let defaults = RecursionTags::default();
        RecursionTags {
            dims: if self.no_dims { None } else { defaults.dims.clone() },
            ..defaults
        }
    }

    pub fn prepare_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))
    }
}
