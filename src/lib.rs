//! Finite-temperature Lanczos (FTLM) post-processing.
//!
//! An exact-diagonalization run decomposes the Hilbert space of a quantum lattice
//! model into symmetry blocks (magnetization, momentum, point-group irrep) and, for
//! every block and every random starting vector, stores the coefficients of two
//! Lanczos recursions plus the matrix of the measured operator between their Krylov
//! bases. This crate turns that per-block data into
//!
//! - poles and spectral weights of finite-temperature dynamical correlators,
//! - broadened spectra on a frequency grid,
//! - thermodynamic moments (partition function, energy, energy², specific heat).
//!
//! ## Building blocks
//!
//! - [`Ensemble`]: the set of blocks with their degeneracies.
//! - [`BlockArray`]: one value per block, with the block-wise linear algebra the
//!   assembler needs.
//! - [`TriDiagonal`]: the Lanczos coefficients of every block and their
//!   eigendecompositions.
//! - [`algorithms`]: the spectral-weight assembler, broadening and moments.
//! - [`pipeline`]: loading everything from a [`utils::data_source::SectorDataSource`].
//!
//! ## Example
//!
//! A single block whose recursions have length one: the starting vector is an
//! eigenstate at energy 1, the operator maps it onto an eigenstate at energy 2, so
//! the correlator has a single pole at 1 carrying weight 2π.
//!
//! ```rust
//! use faer::mat;
//! use ftlm_spectra::{
//!     Ensemble,
//!     algorithms::AssemblyOptions,
//!     pipeline::{FtlmInput, RecursionTags},
//!     utils::data_source::{MemorySource, SectorArray},
//! };
//!
//! let source = MemorySource::new()
//!     .with("k0", "AlphasT", SectorArray::Vector(vec![1.0]))
//!     .with("k0", "BetasT", SectorArray::Vector(vec![]))
//!     .with("k0", "AlphasS", SectorArray::Vector(vec![2.0]))
//!     .with("k0", "BetasS", SectorArray::Vector(vec![]))
//!     .with("k0", "A", SectorArray::Matrix(mat![[1.0]]));
//! let ensemble = Ensemble::from_blocks([("k0", 1)]).unwrap();
//! let tags = RecursionTags { dims: None, ..RecursionTags::default() };
//!
//! let input = FtlmInput::load(&ensemble, &source, &tags).unwrap();
//! let spectral = input.spectral_weights(&AssemblyOptions::at_temperature(0.5)).unwrap();
//!
//! assert_eq!(spectral.poles, vec![1.0]);
//! assert!((spectral.weights[0].re - 2.0 * std::f64::consts::PI).abs() < 1e-12);
//! assert!((spectral.partition - 1.0).abs() < 1e-12);
//! ```

pub mod algorithms;
pub mod block_array;
pub mod ensemble;
pub mod error;
pub mod pipeline;
pub mod tridiagonal;
pub mod utils;

pub use block_array::BlockArray;
pub use ensemble::{BlockLabel, Ensemble, EnsembleSpec};
pub use error::{FtlmError, FtlmErrorKind};
pub use tridiagonal::TriDiagonal;
