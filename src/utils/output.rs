//! Persistence of results: pole/weight records as JSON, tables as CSV.

use crate::algorithms::spectral::SpectralWeights;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    fs::File,
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A sorted pole/weight set together with the run parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolesWeightsRecord {
    pub temperature: f64,
    pub seed: Option<u64>,
    pub cutoff: Option<f64>,
    pub recursion_length: Option<usize>,
    pub partition: f64,
    pub e0: f64,
    pub imaginary_residue: f64,
    pub poles: Vec<f64>,
    /// Real parts of the weights.
    pub weights: Vec<f64>,
}

impl PolesWeightsRecord {
    pub fn new(temperature: f64, spectral: &SpectralWeights) -> Self {
        Self {
            temperature,
            seed: None,
            cutoff: None,
            recursion_length: None,
            partition: spectral.partition,
            e0: spectral.e0,
            imaginary_residue: spectral.imaginary_residue(),
            poles: spectral.poles.clone(),
            weights: spectral.real_weights(),
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), OutputError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|source| OutputError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| OutputError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// File name of the form `stem.key1.value1.key2.value2.extension`.
///
/// ```
/// use ftlm_spectra::utils::output::descriptive_filename;
///
/// let name = descriptive_filename("poles_weights", &[("T", &0.5), ("seed", &3)], "json");
/// assert_eq!(name, "poles_weights.T.0.5.seed.3.json");
/// ```
pub fn descriptive_filename(stem: &str, params: &[(&str, &dyn Display)], extension: &str) -> String {
    let mut name = stem.to_string();
    for (key, value) in params {
        name.push_str(&format!(".{key}.{value}"));
    }
    name.push('.');
    name.push_str(extension);
    name
}

/// Writes `rows` as a CSV table with a header derived from the row type.
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<(), OutputError> {
    let path = path.as_ref();
    let csv_err = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}
