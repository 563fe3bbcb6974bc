//! This module defines the custom error types for the library.
//!
//! Every failure of the finite-temperature pipeline is reported through a single
//! public type, [`FtlmError`], which wraps the matchable [`FtlmErrorKind`]. All of
//! them are fatal for the run: the computation is deterministic, so nothing is
//! retried and no partial result is returned.
//!
//! [`faer::linalg::evd::EvdError`] does not implement [`std::error::Error`], so it
//! is kept as a plain field of [`FtlmErrorKind::Evd`] rather than as a source.
use crate::ensemble::BlockLabel;
use thiserror::Error;

/// Represents all possible errors that can occur while assembling spectra.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct FtlmError(#[from] FtlmErrorKind);

impl FtlmError {
    /// Returns the kind of failure, for callers that need to branch on it.
    pub fn kind(&self) -> &FtlmErrorKind {
        &self.0
    }
}

/// The distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub enum FtlmErrorKind {
    /// Invalid ensemble construction: non-positive degeneracy or conflicting labels.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required (block, tag) pair is absent from the sector store.
    #[error("Missing data: no array tagged '{tag}' for block {block}")]
    MissingData { block: BlockLabel, tag: String },

    /// Two block arrays combined in one operation cover different block sets.
    #[error("Block mismatch: operands cover blocks {left:?} and {right:?}")]
    BlockMismatch {
        left: Vec<BlockLabel>,
        right: Vec<BlockLabel>,
    },

    /// Weight and pole tensors of a block disagree in length. Signals a bug.
    #[error(
        "Internal inconsistency in block {block}: {weights} weights but {poles} poles"
    )]
    InternalInconsistency {
        block: BlockLabel,
        weights: usize,
        poles: usize,
    },

    /// A stored array does not have the rank expected for its tag.
    #[error("Type mismatch for '{tag}' in block {block}: expected {expected}, found {found}")]
    TypeMismatch {
        block: BlockLabel,
        tag: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The operator matrix of a block does not fit the two Krylov bases.
    #[error("Shape mismatch in block {block}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        block: BlockLabel,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The Lanczos coefficients of a block do not describe a tridiagonal matrix.
    #[error(
        "Invalid tridiagonal data in block {block}: {diag} diagonal and {offdiag} off-diagonal entries"
    )]
    InvalidTridiagonal {
        block: BlockLabel,
        diag: usize,
        offdiag: usize,
    },

    /// Indicates that an invalid input parameter was provided to a function.
    #[error("Invalid input parameter: {0}")]
    InvalidParameter(String),

    /// Reading or parsing the persisted sector store failed.
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Wraps an error originating from [`faer`]'s eigendecomposition module.
    #[error("A numerical error occurred during the eigendecomposition of block {block}: {cause:?}")]
    Evd {
        block: BlockLabel,
        cause: faer::linalg::evd::EvdError,
    },
}

// Compare through the inner kind.
impl PartialEq for FtlmError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
