//! This module provides access to the per-sector output of the eigensolver runs.
//!
//! The core never looks at files directly. It asks a [`SectorDataSource`] for the
//! array stored under a `(block, tag)` pair, e.g. the diagonal Lanczos coefficients
//! `AlphasT` of block `(8, M.C1.A)`. Two stores are provided:
//!
//! - **[`MemorySource`]**: an in-memory map, used by tests and by callers that
//!   produce the arrays themselves.
//! - **[`DirectorySource`]**: one JSON file per block in a directory. The file name
//!   is derived from a template whose positional placeholders `{0}`, `{1}`, ... are
//!   replaced by the parts of the block label.
//!
//! A sector file maps tags to arrays. Scalars and vectors are stored as plain JSON
//! numbers and arrays; matrices are stored row-major with an optional imaginary part:
//!
//! ```json
//! {
//!   "AlphasT": [0.1, 0.2],
//!   "BetasT": [0.5],
//!   "DimK": 70,
//!   "A": { "rows": 2, "cols": 2, "re": [1.0, 0.0, 0.0, 1.0] }
//! }
//! ```

use crate::ensemble::BlockLabel;
use faer::{Mat, c64};
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::{HashMap, hash_map::Entry},
    fs::File,
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Represents all possible errors that can occur while reading a sector store.
#[derive(Error, Debug)]
pub enum DataSourceError {
    /// Wraps a standard I/O error.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The sector file is not valid JSON or does not follow the sector layout.
    #[error("Parse error in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A stored matrix has a data length that disagrees with its declared shape.
    #[error("Format error: '{tag}' declares a {rows}x{cols} matrix but stores {len} values")]
    MatrixShape {
        tag: String,
        rows: usize,
        cols: usize,
        len: usize,
    },
    /// The file name template refers to a label part the block does not have.
    #[error("Template error: '{template}' has no value for placeholder {{{index}}} in block {block}")]
    Template {
        template: String,
        index: usize,
        block: BlockLabel,
    },
}

/// A numeric array as stored for one `(block, tag)` pair.
///
/// The rank and element type are checked when the array is converted into the
/// typed value a [`crate::BlockArray`] holds.
#[derive(Debug, Clone, PartialEq)]
pub enum SectorArray {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Mat<f64>),
    ComplexMatrix(Mat<c64>),
}

impl SectorArray {
    /// Short description of the rank and element type, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SectorArray::Scalar(_) => "real scalar",
            SectorArray::Vector(_) => "real vector",
            SectorArray::Matrix(_) => "real matrix",
            SectorArray::ComplexMatrix(_) => "complex matrix",
        }
    }
}

/// Capability to look up the persisted arrays of a sector.
pub trait SectorDataSource {
    /// Returns the array stored under `(block, tag)`, or `None` if it is absent.
    fn fetch(&self, block: &BlockLabel, tag: &str) -> Result<Option<SectorArray>, DataSourceError>;
}

/// In-memory sector store.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    arrays: HashMap<(BlockLabel, String), SectorArray>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `array` under `(block, tag)`, replacing any previous entry.
    pub fn insert(&mut self, block: impl Into<BlockLabel>, tag: impl Into<String>, array: SectorArray) {
        self.arrays.insert((block.into(), tag.into()), array);
    }

    /// Builder-style variant of [`MemorySource::insert`].
    pub fn with(mut self, block: impl Into<BlockLabel>, tag: impl Into<String>, array: SectorArray) -> Self {
        self.insert(block, tag, array);
        self
    }
}

impl SectorDataSource for MemorySource {
    fn fetch(&self, block: &BlockLabel, tag: &str) -> Result<Option<SectorArray>, DataSourceError> {
        Ok(self.arrays.get(&(block.clone(), tag.to_string())).cloned())
    }
}

/// Serialized form of a single array inside a sector file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredArray {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix {
        rows: usize,
        cols: usize,
        re: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        im: Option<Vec<f64>>,
    },
}

impl StoredArray {
    fn into_sector_array(self, tag: &str) -> Result<SectorArray, DataSourceError> {
        match self {
            StoredArray::Scalar(x) => Ok(SectorArray::Scalar(x)),
            StoredArray::Vector(v) => Ok(SectorArray::Vector(v)),
            StoredArray::Matrix { rows, cols, re, im } => {
                let check = |len: usize| {
                    if len == rows * cols {
                        Ok(())
                    } else {
                        Err(DataSourceError::MatrixShape {
                            tag: tag.to_string(),
                            rows,
                            cols,
                            len,
                        })
                    }
                };
                check(re.len())?;
                match im {
                    None => Ok(SectorArray::Matrix(Mat::from_fn(rows, cols, |i, j| {
                        re[i * cols + j]
                    }))),
                    Some(im) => {
                        check(im.len())?;
                        Ok(SectorArray::ComplexMatrix(Mat::from_fn(rows, cols, |i, j| {
                            c64::new(re[i * cols + j], im[i * cols + j])
                        })))
                    }
                }
            }
        }
    }

    fn from_sector_array(array: &SectorArray) -> Self {
        match array {
            SectorArray::Scalar(x) => StoredArray::Scalar(*x),
            SectorArray::Vector(v) => StoredArray::Vector(v.clone()),
            SectorArray::Matrix(m) => StoredArray::Matrix {
                rows: m.nrows(),
                cols: m.ncols(),
                re: row_major(m.nrows(), m.ncols(), |i, j| m[(i, j)]),
                im: None,
            },
            SectorArray::ComplexMatrix(m) => StoredArray::Matrix {
                rows: m.nrows(),
                cols: m.ncols(),
                re: row_major(m.nrows(), m.ncols(), |i, j| m[(i, j)].re),
                im: Some(row_major(m.nrows(), m.ncols(), |i, j| m[(i, j)].im)),
            },
        }
    }
}

fn row_major(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Vec<f64> {
    (0..rows)
        .flat_map(|i| (0..cols).map(move |j| (i, j)))
        .map(|(i, j)| f(i, j))
        .collect()
}

type Sector = HashMap<String, StoredArray>;

/// Sector store backed by one JSON file per block.
///
/// Every file is parsed once; later lookups of other tags in the same block are
/// served from memory. Absent files are remembered as absent.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    directory: PathBuf,
    template: String,
    sectors: RefCell<HashMap<PathBuf, Option<Sector>>>,
}

impl DirectorySource {
    /// Creates a store reading `directory/<template>` for every block.
    ///
    /// For the block `("8", "M.C1.A")` the template `outfile.nup.{0}.k.{1}.json`
    /// resolves to `outfile.nup.8.k.M.C1.A.json`.
    pub fn new(directory: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            template: template.into(),
            sectors: RefCell::new(HashMap::new()),
        }
    }

    /// Resolves the path of the sector file of `block`.
    pub fn path_for(&self, block: &BlockLabel) -> Result<PathBuf, DataSourceError> {
        let mut name = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find('{') {
            name.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let placeholder = after
                .find('}')
                .and_then(|end| after[..end].parse::<usize>().ok().map(|index| (index, end)));
            match placeholder {
                Some((index, end)) => {
                    let part = block.parts().get(index).ok_or_else(|| DataSourceError::Template {
                        template: self.template.clone(),
                        index,
                        block: block.clone(),
                    })?;
                    name.push_str(part);
                    rest = &after[end + 1..];
                }
                None => {
                    name.push('{');
                    rest = after;
                }
            }
        }
        name.push_str(rest);
        Ok(self.directory.join(name))
    }

    fn read_sector(path: &Path) -> Result<Option<Sector>, DataSourceError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DataSourceError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|source| DataSourceError::Json {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl SectorDataSource for DirectorySource {
    fn fetch(&self, block: &BlockLabel, tag: &str) -> Result<Option<SectorArray>, DataSourceError> {
        let path = self.path_for(block)?;
        let mut sectors = self.sectors.borrow_mut();
        let sector = match sectors.entry(path) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let sector = Self::read_sector(entry.key())?;
                if sector.is_none() {
                    log::debug!("no sector file {:?} for block {block}", entry.key());
                }
                entry.insert(sector)
            }
        };
        let Some(sector) = sector else {
            return Ok(None);
        };
        sector
            .get(tag)
            .cloned()
            .map(|stored| stored.into_sector_array(tag))
            .transpose()
    }
}

/// Writes the arrays of one sector to `path` in the layout [`DirectorySource`] reads.
pub fn write_sector_file(
    path: impl AsRef<Path>,
    arrays: &[(&str, SectorArray)],
) -> Result<(), DataSourceError> {
    let path = path.as_ref();
    let stored: HashMap<&str, StoredArray> = arrays
        .iter()
        .map(|(tag, array)| (*tag, StoredArray::from_sector_array(array)))
        .collect();
    let file = File::create(path).map_err(|source| DataSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer(BufWriter::new(file), &stored).map_err(|source| DataSourceError::Json {
        path: path.to_path_buf(),
        source,
    })
}
